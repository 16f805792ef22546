// Postgres storage engine: one transaction per commit batch
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, PgConnection};
use sqlx::{PgPool, Postgres};
use tokio_util::sync::CancellationToken;

use crate::config::config;
use crate::database::manager::DatabaseError;
use crate::database::store::{AsyncStore, WriteCommand};
use crate::model::audit_fields::{parse_timestamp, AUDIT_TIMESTAMP_FIELDS};
use crate::model::schema::{is_valid_identifier, quote_identifier};

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn execute_batch(&self, batch: &[WriteCommand]) -> Result<u64, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let mut affected = 0;

        for command in batch {
            affected += execute_command(&mut *tx, command).await?;
        }

        tx.commit().await?;
        Ok(affected)
    }
}

#[async_trait]
impl AsyncStore for PgStore {
    async fn execute(
        &self,
        batch: &[WriteCommand],
        cancel: CancellationToken,
    ) -> Result<u64, DatabaseError> {
        // Dropping the batch future mid-way drops the transaction, which rolls back
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DatabaseError::Cancelled),
            result = self.execute_batch(batch) => result,
        }
    }
}

async fn execute_command(
    conn: &mut PgConnection,
    command: &WriteCommand,
) -> Result<u64, DatabaseError> {
    let table = command.table();
    if !is_valid_identifier(table) {
        return Err(DatabaseError::InvalidName(table.to_string()));
    }

    let (sql, values) = build_statement(command)?;
    if config().database.enable_query_logging {
        tracing::debug!("Executing: {}", sql);
    }

    let mut q = sqlx::query(&sql);
    for (column, value) in &values {
        q = bind_param(q, column, value)?;
    }
    q = q.bind(command.id());

    let result = q.execute(conn).await?;
    if result.rows_affected() == 0 && !matches!(command, WriteCommand::Insert { .. }) {
        return Err(DatabaseError::NotFound(format!("{} {}", table, command.id())));
    }
    Ok(result.rows_affected())
}

/// Build the SQL text and the ordered (column, value) parameters. The record
/// id is always bound last.
fn build_statement(command: &WriteCommand) -> Result<(String, Vec<(String, Value)>), DatabaseError> {
    match command {
        WriteCommand::Insert { table, values, .. } => {
            let params = ordered_params(values)?;
            let mut columns: Vec<String> =
                params.iter().map(|(c, _)| quote_identifier(c)).collect();
            columns.push(quote_identifier("id"));
            let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();

            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_identifier(table),
                columns.join(", "),
                placeholders.join(", ")
            );
            Ok((sql, params))
        }
        WriteCommand::Update { table, values, set_once, .. } => {
            let params = ordered_params(values)?;
            if params.is_empty() {
                // Nothing to write; still confirm the row exists
                let sql = format!(
                    "UPDATE {} SET {} = {} WHERE {} = $1",
                    quote_identifier(table),
                    quote_identifier("id"),
                    quote_identifier("id"),
                    quote_identifier("id")
                );
                return Ok((sql, params));
            }

            let set_clauses: Vec<String> = params
                .iter()
                .enumerate()
                .map(|(i, (c, _))| {
                    let column = quote_identifier(c);
                    if set_once.contains(c) {
                        format!("{} = COALESCE({}, ${})", column, column, i + 1)
                    } else {
                        format!("{} = ${}", column, i + 1)
                    }
                })
                .collect();

            let sql = format!(
                "UPDATE {} SET {} WHERE {} = ${}",
                quote_identifier(table),
                set_clauses.join(", "),
                quote_identifier("id"),
                params.len() + 1
            );
            Ok((sql, params))
        }
        WriteCommand::Delete { table, .. } => {
            let sql = format!(
                "DELETE FROM {} WHERE {} = $1",
                quote_identifier(table),
                quote_identifier("id")
            );
            Ok((sql, Vec::new()))
        }
    }
}

fn ordered_params(values: &Map<String, Value>) -> Result<Vec<(String, Value)>, DatabaseError> {
    let mut params: Vec<(String, Value)> = values
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    params.sort_by(|a, b| a.0.cmp(&b.0));

    if let Some((column, _)) = params.iter().find(|(c, _)| !is_valid_identifier(c)) {
        return Err(DatabaseError::InvalidName(column.clone()));
    }
    Ok(params)
}

/// Bind parameter to SQL query. Audit timestamps are bound as TIMESTAMPTZ.
fn bind_param<'q>(
    q: PgQuery<'q>,
    column: &str,
    v: &Value,
) -> Result<PgQuery<'q>, DatabaseError> {
    if AUDIT_TIMESTAMP_FIELDS.contains(&column) {
        let ts: Option<DateTime<Utc>> = match v {
            Value::Null => None,
            other => Some(parse_timestamp(other).ok_or_else(|| {
                DatabaseError::QueryError(format!("invalid timestamp for '{}': {}", column, other))
            })?),
        };
        return Ok(q.bind(ts));
    }

    let q = match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s.clone()),
        Value::Array(_) | Value::Object(_) => q.bind(v.clone()), // JSONB
    };
    Ok(q)
}
