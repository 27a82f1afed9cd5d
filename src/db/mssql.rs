//! SQL Server database client implementation using tiberius.
//!
//! tiberius speaks TDS over any futures-io stream, so the tokio socket is
//! wrapped with `tokio_util::compat`. Named instances are resolved through
//! the SQL Browser service (UDP 1434) before the TCP connect.

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use tiberius::{AuthMethod, Client, ColumnData, Config, EncryptionLevel, FromSql, SqlBrowser};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, warn};

use crate::db::{
    map_connection_error, ColumnInfo, ConnectionSpec, DatabaseBackend, DatabaseClient,
    QueryResult, Row, Value,
};
use crate::error::{BridgeError, Result};
use crate::safety::ValidatedStatement;

/// SQL Server database client.
pub struct MssqlClient {
    client: Client<Compat<TcpStream>>,
}

impl MssqlClient {
    /// Opens a single TDS session. No retries: a failed handshake is reported.
    pub async fn connect(spec: &ConnectionSpec) -> Result<Self> {
        let config = build_config(spec)?;
        let map_err = |e: &dyn std::fmt::Display| {
            map_connection_error(&e.to_string(), spec, DatabaseBackend::SqlServer)
        };

        // Without an instance name this is a plain connect to host:port.
        let tcp = TcpStream::connect_named(&config)
            .await
            .map_err(|e| map_err(&e))?;

        let client = Client::connect(config, tcp.compat_write())
            .await
            .map_err(|e| map_err(&e))?;

        debug!("Connected to SQL Server at {}", spec.display_string());
        Ok(Self { client })
    }
}

/// Translates the connection spec into a tiberius config.
fn build_config(spec: &ConnectionSpec) -> Result<Config> {
    let mut config = Config::new();
    config.host(spec.host.trim());
    config.authentication(AuthMethod::sql_server(
        &spec.username,
        spec.password.expose(),
    ));
    if let Some(database) = spec.database_name() {
        config.database(database);
    }

    let mut instance = None;
    for (key, value) in spec.parsed_properties()? {
        match key.to_lowercase().as_str() {
            "encrypt" => config.encryption(parse_encryption(&value)?),
            "trustservercertificate" => {
                if parse_flag(&key, &value)? {
                    config.trust_cert();
                }
            }
            "applicationname" | "application_name" => config.application_name(value),
            "instancename" | "instance_name" => {
                let name = value.trim();
                if name.is_empty() {
                    return Err(BridgeError::connection(
                        "SQL Server property 'instanceName' must not be empty",
                    ));
                }
                instance = Some(name.to_string());
            }
            _ => warn!("Ignoring unknown SQL Server connection property '{}'", key),
        }
    }

    // An explicit port addresses the instance directly, as with `host,port`.
    match (spec.port, instance) {
        (Some(port), Some(name)) => {
            debug!("Port {} given; not resolving instance '{}'", port, name);
            config.port(port);
        }
        (Some(port), None) => config.port(port),
        (None, Some(name)) => config.instance_name(name),
        (None, None) => config.port(spec.port_or_default(DatabaseBackend::SqlServer)),
    }

    Ok(config)
}

fn parse_encryption(value: &str) -> Result<EncryptionLevel> {
    match value.to_lowercase().as_str() {
        "true" | "required" | "yes" => Ok(EncryptionLevel::Required),
        "false" | "no" => Ok(EncryptionLevel::Off),
        "off" | "notsupported" => Ok(EncryptionLevel::NotSupported),
        other => Err(BridgeError::connection(format!(
            "Invalid value '{other}' for SQL Server property 'encrypt'"
        ))),
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        other => Err(BridgeError::connection(format!(
            "Invalid value '{other}' for SQL Server property '{key}'"
        ))),
    }
}

#[async_trait]
impl DatabaseClient for MssqlClient {
    async fn execute_query(&mut self, statement: &ValidatedStatement) -> Result<QueryResult> {
        let start = Instant::now();

        let mut stream = self
            .client
            .simple_query(statement.as_str())
            .await
            .map_err(|e| BridgeError::query_execution(format_query_error(e)))?;

        let columns: Vec<ColumnInfo> = stream
            .columns()
            .await
            .map_err(|e| BridgeError::query_execution(format_query_error(e)))?
            .map(|cols| {
                cols.iter()
                    .map(|col| ColumnInfo::new(col.name(), format!("{:?}", col.column_type())))
                    .collect()
            })
            .unwrap_or_default();

        let rows = stream
            .into_first_result()
            .await
            .map_err(|e| BridgeError::query_execution(format_query_error(e)))?;

        let rows: Vec<Row> = rows
            .iter()
            .map(|row| row.cells().map(|(_, data)| convert_value(data)).collect())
            .collect();

        Ok(QueryResult::with_data(columns, rows).with_execution_time(start.elapsed()))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let client = *self;
        client.client.close().await.map_err(|e| {
            BridgeError::connection(format!("Failed to close SQL Server connection: {e}"))
        })
    }
}

/// Converts a single TDS cell to our Value type. The match is exhaustive, so a
/// new tiberius cell type fails to compile instead of decoding to NULL.
fn convert_value(data: &ColumnData<'static>) -> Value {
    match data {
        ColumnData::Bit(v) => (*v).into(),
        ColumnData::U8(v) => v.map(|v| Value::Int(v as i64)).unwrap_or(Value::Null),
        ColumnData::I16(v) => v.map(|v| Value::Int(v as i64)).unwrap_or(Value::Null),
        ColumnData::I32(v) => (*v).into(),
        ColumnData::I64(v) => (*v).into(),
        ColumnData::F32(v) => v.map(|v| Value::Float(v as f64)).unwrap_or(Value::Null),
        ColumnData::F64(v) => (*v).into(),
        ColumnData::String(v) => v
            .as_ref()
            .map(|s| Value::String(s.to_string()))
            .unwrap_or(Value::Null),
        ColumnData::Guid(v) => v
            .as_ref()
            .map(|g| Value::String(g.to_string()))
            .unwrap_or(Value::Null),
        ColumnData::Binary(v) => v
            .as_ref()
            .map(|b| Value::Bytes(b.to_vec()))
            .unwrap_or(Value::Null),
        ColumnData::Numeric(v) => v
            .as_ref()
            .map(|n| Value::String(n.to_string()))
            .unwrap_or(Value::Null),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            decode_temporal::<NaiveDateTime>(data)
        }
        ColumnData::Date(_) => decode_temporal::<NaiveDate>(data),
        ColumnData::Time(_) => decode_temporal::<NaiveTime>(data),
        ColumnData::DateTimeOffset(_) => DateTime::<FixedOffset>::from_sql(data)
            .ok()
            .flatten()
            .map(|v| Value::String(v.to_rfc3339()))
            .unwrap_or(Value::Null),
        ColumnData::Xml(v) => v
            .as_ref()
            .map(|x| Value::String(x.to_string()))
            .unwrap_or(Value::Null),
    }
}

fn decode_temporal<'a, T>(data: &'a ColumnData<'static>) -> Value
where
    T: FromSql<'a> + ToString,
{
    T::from_sql(data)
        .ok()
        .flatten()
        .map(|v| Value::String(v.to_string()))
        .unwrap_or(Value::Null)
}

/// Formats a query error, keeping the server's error number.
fn format_query_error(error: tiberius::error::Error) -> String {
    match error {
        tiberius::error::Error::Server(token) => {
            format!("ERROR {}: {}", token.code(), token.message())
        }
        other => other.to_string(),
    }
}
