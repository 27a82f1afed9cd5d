//! Typed invocation request.

use serde::Deserialize;
use serde_json::Value;

use crate::db::ConnectionSpec;
use crate::error::{BridgeError, Result};
use crate::secrets::Secret;

/// Raw invocation parameters as supplied by the host.
///
/// Every field is optional at this stage; [`InvocationRequest::validate`]
/// enforces which ones are required.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvocationRequest {
    #[serde(alias = "assistant_name")]
    pub assistant_name: Option<String>,
    pub query: Option<String>,
    #[serde(alias = "db_type")]
    pub db_type: Option<String>,
    #[serde(alias = "db_host")]
    pub db_host: Option<String>,
    /// Number, numeric string, empty string, or null.
    #[serde(alias = "db_port")]
    pub db_port: Option<Value>,
    #[serde(alias = "db_username")]
    pub db_username: Option<String>,
    #[serde(alias = "db_password")]
    pub db_password: Option<String>,
    #[serde(alias = "db_name")]
    pub db_name: Option<String>,
    #[serde(alias = "db_properties")]
    pub db_properties: Option<String>,
    #[serde(alias = "query_sql")]
    pub query_sql: Option<String>,
}

/// A request whose required fields are all present.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedInvocation {
    pub assistant_name: String,
    pub query: String,
    pub connection: ConnectionSpec,
    pub query_sql: String,
}

impl InvocationRequest {
    /// Parses a request from JSON text.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| BridgeError::config(format!("Invalid invocation request: {e}")))
    }

    /// Checks required fields in a fixed order and builds the connection spec.
    pub fn validate(self) -> Result<ValidatedInvocation> {
        let engine = required(self.db_type, "Please select the database type")?;
        let host = required(self.db_host, "Please fill in the database host")?;
        let username = required(self.db_username, "Please fill in the database username")?;
        let password = required(self.db_password, "Please fill in the database password")?;
        let query_sql = required(
            self.query_sql,
            "Please fill in the query SQL, for example: select email from accounts where name = 'admin'",
        )?;
        let assistant_name = required(self.assistant_name, "Please fill in the assistant name")?;
        let query = required(self.query, "Please fill in the query")?;
        let port = parse_port(self.db_port.as_ref())?;

        Ok(ValidatedInvocation {
            assistant_name,
            query,
            connection: ConnectionSpec {
                engine: engine.trim().to_string(),
                host: host.trim().to_string(),
                port,
                username,
                password: Secret::new(password),
                database: optional(self.db_name),
                properties: optional(self.db_properties),
            },
            query_sql,
        })
    }
}

fn required(value: Option<String>, message: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(BridgeError::missing_field(message)),
    }
}

fn optional(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parses the port field. Absent, null, and blank all mean "engine default".
pub fn parse_port(value: Option<&Value>) -> Result<Option<u16>> {
    let invalid = |raw: &dyn std::fmt::Display| {
        BridgeError::config(format!("Invalid database port: {raw}"))
    };

    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u16>()
            .map(Some)
            .map_err(|_| invalid(&s.trim())),
        Some(Value::Number(n)) => {
            let port = n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64));
            match port.and_then(|p| u16::try_from(p).ok()) {
                Some(p) => Ok(Some(p)),
                None => Err(invalid(n)),
            }
        }
        Some(other) => Err(invalid(other)),
    }
}
