//! PostgreSQL database client implementation.
//!
//! Provides the `PostgresClient` struct that implements the `DatabaseClient` trait
//! for PostgreSQL databases using a single sqlx connection.

use std::str::FromStr;
use std::time::Instant;

use async_trait::async_trait;
use sqlx::postgres::types::{Oid, PgInterval};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::{Decimal, JsonValue, Uuid};
use sqlx::{Column as SqlxColumn, Connection, Row as SqlxRow, TypeInfo};
use tracing::debug;

use crate::db::{
    build_url, map_connection_error, unsupported_column_type, ColumnInfo, ConnectionSpec,
    DatabaseBackend, DatabaseClient, QueryResult, Row, Value,
};
use crate::error::{BridgeError, Result};
use crate::safety::ValidatedStatement;

/// PostgreSQL database client.
#[derive(Debug)]
pub struct PostgresClient {
    conn: PgConnection,
}

impl PostgresClient {
    /// Opens a single connection. No retries: a failed handshake is reported.
    pub async fn connect(spec: &ConnectionSpec) -> Result<Self> {
        let url = build_url(DatabaseBackend::Postgres, spec)?;
        let options = PgConnectOptions::from_str(url.as_str())
            .map_err(|e| {
                BridgeError::connection(format!("Invalid PostgreSQL connection options: {e}"))
            })?
            .host(spec.host_addr());

        let conn = PgConnection::connect_with(&options)
            .await
            .map_err(|e| map_connection_error(&e.to_string(), spec, DatabaseBackend::Postgres))?;

        debug!("Connected to PostgreSQL at {}", spec.display_string());
        Ok(Self { conn })
    }
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    async fn execute_query(&mut self, statement: &ValidatedStatement) -> Result<QueryResult> {
        let start = Instant::now();

        let result = sqlx::query(statement.as_str())
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| BridgeError::query_execution(format_query_error(e)))?;

        let columns: Vec<ColumnInfo> = result
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                    .collect()
            })
            .unwrap_or_default();

        let rows = result.iter().map(convert_row).collect::<Result<Vec<Row>>>()?;

        Ok(QueryResult::with_data(columns, rows).with_execution_time(start.elapsed()))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let client = *self;
        client
            .conn
            .close()
            .await
            .map_err(|e| {
                BridgeError::connection(format!("Failed to close PostgreSQL connection: {e}"))
            })
    }
}

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Result<Row> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

/// Converts a single column value from a PgRow to our Value type.
///
/// Types with no decoding here fail the query rather than read as NULL, so a
/// real identity value is never forwarded as an empty user name.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Result<Value> {
    let value = match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => row
            .try_get::<Option<bool>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),

        "INT2" | "SMALLINT" => row
            .try_get::<Option<i16>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "INT4" | "INT" | "INTEGER" => row
            .try_get::<Option<i32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "INT8" | "BIGINT" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Int)
            .unwrap_or(Value::Null),

        "FLOAT4" | "REAL" => row
            .try_get::<Option<f32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Float(v as f64))
            .unwrap_or(Value::Null),

        "FLOAT8" | "DOUBLE PRECISION" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Float)
            .unwrap_or(Value::Null),

        "BYTEA" => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null),

        "UUID" => row
            .try_get::<Option<Uuid>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null),

        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null),

        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::String(v.to_rfc3339()))
            .unwrap_or(Value::Null),

        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null),

        "TIME" => row
            .try_get::<Option<NaiveTime>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null),

        // NaN and values past 28 significant digits do not fit a Decimal
        "NUMERIC" => match row.try_get::<Option<Decimal>, _>(index) {
            Ok(v) => v.map(|d| Value::String(d.to_string())).unwrap_or(Value::Null),
            Err(e) => {
                return Err(BridgeError::query_execution(format!(
                    "Failed to decode NUMERIC column {index}: {e}"
                )))
            }
        },

        "JSON" | "JSONB" => row
            .try_get::<Option<JsonValue>, _>(index)
            .ok()
            .flatten()
            .map(json_to_value)
            .unwrap_or(Value::Null),

        "OID" => row
            .try_get::<Option<Oid>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v.0 as i64))
            .unwrap_or(Value::Null),

        "INTERVAL" => row
            .try_get::<Option<PgInterval>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::String(format_interval(&v)))
            .unwrap_or(Value::Null),

        // Text-like types (TEXT, VARCHAR, BPCHAR, NAME, CITEXT, UNKNOWN)
        other => match row.try_get::<Option<String>, _>(index) {
            Ok(v) => v.map(Value::String).unwrap_or(Value::Null),
            Err(e) => {
                debug!("No decoding for PostgreSQL type {}: {}", other, e);
                return Err(unsupported_column_type(other));
            }
        },
    };

    Ok(value)
}

/// JSON strings keep their bare text; anything else is serialized.
fn json_to_value(json: JsonValue) -> Value {
    match json {
        JsonValue::String(s) => Value::String(s),
        other => Value::String(other.to_string()),
    }
}

/// Renders an interval the way `psql` prints one with the default style.
fn format_interval(interval: &PgInterval) -> String {
    let mut parts = Vec::new();
    if interval.months != 0 {
        let (years, months) = (interval.months / 12, interval.months % 12);
        if years != 0 {
            parts.push(plural(years as i64, "year"));
        }
        if months != 0 {
            parts.push(plural(months as i64, "mon"));
        }
    }
    if interval.days != 0 {
        parts.push(plural(interval.days as i64, "day"));
    }

    if interval.microseconds != 0 || parts.is_empty() {
        let sign = if interval.microseconds < 0 { "-" } else { "" };
        let micros = interval.microseconds.unsigned_abs();
        let secs = micros / 1_000_000;
        let mut time = format!(
            "{sign}{:02}:{:02}:{:02}",
            secs / 3600,
            secs / 60 % 60,
            secs % 60
        );
        let frac = micros % 1_000_000;
        if frac != 0 {
            time.push_str(format!(".{frac:06}").trim_end_matches('0'));
        }
        parts.push(time);
    }

    parts.join(" ")
}

fn plural(n: i64, unit: &str) -> String {
    if n.abs() == 1 {
        format!("{n} {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

/// Formats a query error, keeping the server's detail and hint.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = String::from("ERROR: ");
    result.push_str(db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }
        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }
        if let Some(table) = pg_error.table() {
            result.push_str("\n  TABLE: ");
            result.push_str(table);
        }
        if let Some(column) = pg_error.column() {
            result.push_str("\n  COLUMN: ");
            result.push_str(column);
        }
    }

    result
}
