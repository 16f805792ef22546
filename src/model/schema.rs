// Storage shape of entity types and the audit-column migration
use serde::{Deserialize, Serialize};

use crate::model::audit_fields::{INSERT_DATE, IS_REMOVED, REMOVE_DATE, UPDATE_DATE};

/// Postgres column types the audit layer needs to talk about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Timestamptz,
    Boolean,
}

impl ColumnType {
    pub fn sql(&self) -> &'static str {
        match self {
            ColumnType::Timestamptz => "TIMESTAMPTZ",
            ColumnType::Boolean => "BOOLEAN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub column_type: ColumnType,
    pub nullable: bool,
    /// SQL literal used to backfill existing rows
    pub default: Option<&'static str>,
}

impl ColumnSpec {
    fn definition(&self) -> String {
        let mut def = format!("\"{}\" {}", self.name, self.column_type.sql());
        if !self.nullable {
            def.push_str(" NOT NULL");
        }
        if let Some(default) = self.default {
            def.push_str(" DEFAULT ");
            def.push_str(default);
        }
        def
    }
}

/// The four columns added to every auditable entity's table
pub fn audit_columns() -> Vec<ColumnSpec> {
    vec![
        ColumnSpec {
            name: INSERT_DATE,
            column_type: ColumnType::Timestamptz,
            nullable: false,
            default: Some("'0001-01-01 00:00:00+00'"),
        },
        ColumnSpec {
            name: IS_REMOVED,
            column_type: ColumnType::Boolean,
            nullable: false,
            default: Some("false"),
        },
        ColumnSpec {
            name: REMOVE_DATE,
            column_type: ColumnType::Timestamptz,
            nullable: true,
            default: None,
        },
        ColumnSpec {
            name: UPDATE_DATE,
            column_type: ColumnType::Timestamptz,
            nullable: true,
            default: None,
        },
    ]
}

/// Storage shape registered for one entity type at model build time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StorageShape {
    /// Columns added by the model on top of what the entity declares
    pub shadow_columns: Vec<ColumnSpec>,
}

impl StorageShape {
    pub fn with_audit_columns() -> Self {
        Self {
            shadow_columns: audit_columns(),
        }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.shadow_columns.iter().any(|c| c.name == name)
    }
}

/// Validate a SQL identifier used as table or database name
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Quote SQL identifier to prevent injection
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Statements adding the audit columns to `table`
pub fn audit_migration_up(table: &str) -> Vec<String> {
    audit_columns()
        .iter()
        .map(|column| {
            format!(
                "ALTER TABLE {} ADD COLUMN {}",
                quote_identifier(table),
                column.definition()
            )
        })
        .collect()
}

/// Statements dropping the audit columns from `table`
pub fn audit_migration_down(table: &str) -> Vec<String> {
    audit_columns()
        .iter()
        .map(|column| {
            format!(
                "ALTER TABLE {} DROP COLUMN {}",
                quote_identifier(table),
                quote_identifier(column.name)
            )
        })
        .collect()
}
