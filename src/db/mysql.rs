//! MySQL / MariaDB database client implementation.

use std::str::FromStr;
use std::time::Instant;

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::JsonValue;
use sqlx::{Column as SqlxColumn, Connection, Row as SqlxRow, TypeInfo};
use tracing::debug;

use crate::db::{
    build_url, map_connection_error, unsupported_column_type, ColumnInfo, ConnectionSpec,
    DatabaseBackend, DatabaseClient, QueryResult, Row, Value,
};
use crate::error::{BridgeError, Result};
use crate::safety::ValidatedStatement;

/// MySQL database client over a single sqlx connection.
#[derive(Debug)]
pub struct MySqlClient {
    conn: MySqlConnection,
}

impl MySqlClient {
    /// Opens a single connection. No retries: a failed handshake is reported.
    pub async fn connect(spec: &ConnectionSpec) -> Result<Self> {
        let url = build_url(DatabaseBackend::MySql, spec)?;
        let options = MySqlConnectOptions::from_str(url.as_str())
            .map_err(|e| BridgeError::connection(format!("Invalid MySQL connection options: {e}")))?
            .host(spec.host_addr());

        let conn = MySqlConnection::connect_with(&options)
            .await
            .map_err(|e| map_connection_error(&e.to_string(), spec, DatabaseBackend::MySql))?;

        debug!("Connected to MySQL at {}", spec.display_string());
        Ok(Self { conn })
    }
}

#[async_trait]
impl DatabaseClient for MySqlClient {
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
            .map_err(|e| BridgeError::connection(format!("Failed to close MySQL connection: {e}")))
    }
}

fn convert_row(row: &MySqlRow) -> Result<Row> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

/// Converts one MySQL cell. Columns with no decoding here are an error.
fn convert_value(row: &MySqlRow, index: usize, type_name: &str) -> Result<Value> {
    let type_name = type_name.to_uppercase();

    if type_name.ends_with("UNSIGNED") {
        return Ok(row
            .try_get::<Option<u64>, _>(index)
            .ok()
            .flatten()
            .map(unsigned_to_value)
            .unwrap_or(Value::Null));
    }

    let value = match type_name.as_str() {
        "BOOLEAN" => row
            .try_get::<Option<bool>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),

        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Int)
            .unwrap_or(Value::Null),

        "FLOAT" => row
            .try_get::<Option<f32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Float(v as f64))
            .unwrap_or(Value::Null),

        "DOUBLE" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Float)
            .unwrap_or(Value::Null),

        // DECIMAL arrives as text on the wire; keep every digit
        "DECIMAL" => row
            .try_get_unchecked::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),

        "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null),

        "DATETIME" => row
            .try_get::<Option<NaiveDateTime>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null),

        "TIMESTAMP" => row
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

        "JSON" => row
            .try_get::<Option<JsonValue>, _>(index)
            .ok()
            .flatten()
            .map(|v| match v {
                JsonValue::String(s) => Value::String(s),
                other => Value::String(other.to_string()),
            })
            .unwrap_or(Value::Null),

        // Servers differ on whether BIT and YEAR carry the UNSIGNED flag
        "BIT" | "YEAR" => row
            .try_get_unchecked::<Option<u64>, _>(index)
            .ok()
            .flatten()
            .map(unsigned_to_value)
            .unwrap_or(Value::Null),

        // CHAR, VARCHAR, TEXT, ENUM
        other => match row.try_get::<Option<String>, _>(index) {
            Ok(v) => v.map(Value::String).unwrap_or(Value::Null),
            Err(e) => {
                debug!("No decoding for MySQL type {}: {}", other, e);
                return Err(unsupported_column_type(other));
            }
        },
    };

    Ok(value)
}

/// BIGINT UNSIGNED can exceed i64; such values keep every digit as text.
fn unsigned_to_value(v: u64) -> Value {
    match i64::try_from(v) {
        Ok(i) => Value::Int(i),
        Err(_) => Value::String(v.to_string()),
    }
}

/// Formats a query error as `ERROR <code>: <message>` when the server sent one.
fn format_query_error(error: sqlx::Error) -> String {
    match error.as_database_error() {
        Some(db_error) => match db_error.code() {
            Some(code) => format!("ERROR {code}: {}", db_error.message()),
            None => format!("ERROR: {}", db_error.message()),
        },
        None => error.to_string(),
    }
}
