use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::database::DatabaseManager;

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let database = DatabaseManager::main_database_name()?;
    DatabaseManager::health_check().await?;
    DatabaseManager::close_all().await;

    output_success(
        &output_format,
        &format!("Database '{}' is reachable", database),
        Some(json!({ "database": database })),
    )
}
