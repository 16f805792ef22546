use serde_json::json;

use crate::cli::commands::migration_statements;
use crate::cli::{Direction, OutputFormat};

pub fn handle(tables: &[String], direction: Direction, output_format: OutputFormat) -> anyhow::Result<()> {
    let statements = migration_statements(tables, direction)?;

    match output_format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "direction": direction,
                    "tables": tables,
                    "statements": statements,
                }))?
            );
        }
        OutputFormat::Text => {
            for statement in &statements {
                println!("{};", statement);
            }
        }
    }

    Ok(())
}
