pub mod ddl;
pub mod health;
pub mod migrate;

use anyhow::bail;

use crate::cli::Direction;
use crate::model::schema::{audit_migration_down, audit_migration_up, is_valid_identifier};

/// Migration statements for every table, in order
pub fn migration_statements(tables: &[String], direction: Direction) -> anyhow::Result<Vec<String>> {
    let mut statements = Vec::new();
    for table in tables {
        if !is_valid_identifier(table) {
            bail!("Invalid table name: {}", table);
        }
        match direction {
            Direction::Up => statements.extend(audit_migration_up(table)),
            Direction::Down => statements.extend(audit_migration_down(table)),
        }
    }
    Ok(statements)
}
