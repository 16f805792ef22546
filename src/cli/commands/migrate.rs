use serde_json::json;

use crate::cli::commands::migration_statements;
use crate::cli::utils::output_success;
use crate::cli::{Direction, OutputFormat};
use crate::database::DatabaseManager;

pub async fn handle(
    tables: &[String],
    direction: Direction,
    database: Option<String>,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let statements = migration_statements(tables, direction)?;

    let pool = match &database {
        Some(name) => DatabaseManager::pool(name).await?,
        None => DatabaseManager::main_pool().await?,
    };

    tracing::info!(
        "Applying {:?} audit migration to {} table(s)",
        direction,
        tables.len()
    );
    DatabaseManager::execute_in_transaction(&pool, &statements).await?;
    DatabaseManager::close_all().await;

    let verb = match direction {
        Direction::Up => "Added",
        Direction::Down => "Dropped",
    };
    output_success(
        &output_format,
        &format!("{} audit columns on {}", verb, tables.join(", ")),
        Some(json!({
            "direction": direction,
            "tables": tables,
            "statements": statements.len(),
        })),
    )
}
