//! Wire types and response interpretation for the remote analytics service.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BridgeError, Result};

/// Name of the status variable emitted after a query.
pub const STATUS_VARIABLE: &str = "status";

/// Body of `POST /api/chat/query/verify`.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyRequest<'a> {
    pub access_token: &'a str,
}

/// Body of `POST /api/chat/dify/executeByParams`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteQueryRequest {
    pub agent_name: String,
    pub query_text: String,
    /// Identity attribute from the caller's database. May be empty.
    pub user_name: String,
}

impl RemoteQueryRequest {
    pub fn new(
        agent_name: impl Into<String>,
        query_text: impl Into<String>,
        user_name: impl Into<String>,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            query_text: query_text.into(),
            user_name: user_name.into(),
        }
    }
}

/// Envelope shared by both endpoints. Every field is optional on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteResponse {
    #[serde(default)]
    pub code: Option<Value>,
    #[serde(default)]
    pub msg: Option<Value>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl RemoteResponse {
    /// Returns the `code` field when it is a JSON integer. A string such as
    /// `"200"` does not count.
    pub fn code(&self) -> Option<i64> {
        match self.code.as_ref()? {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    /// Returns `data.textResult`, or `""` when `data` is absent or empty.
    pub fn text_result(&self) -> String {
        let data = match self.data.as_ref() {
            Some(data) if is_truthy(data) => data,
            _ => return String::new(),
        };
        match data.get("textResult") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }
}

/// A message produced by one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolMessage {
    Text { text: String },
    Json { json: Value },
    Variable { name: String, value: Value },
}

impl ToolMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn json(json: Value) -> Self {
        Self::Json { json }
    }

    pub fn variable(name: impl Into<String>, value: Value) -> Self {
        Self::Variable {
            name: name.into(),
            value,
        }
    }
}

/// Interprets a verify response. Every failure mode is a credential error
/// carrying the raw diagnostic.
pub fn interpret_verify(status: u16, body: &str) -> Result<()> {
    if status != 200 {
        return Err(BridgeError::credential(format!("HTTP {status}: {body}")));
    }

    let response: RemoteResponse = serde_json::from_str(body).map_err(|e| {
        BridgeError::credential(format!("Malformed verify response ({e}): {body}"))
    })?;

    match response.code() {
        Some(200) => Ok(()),
        _ => Err(BridgeError::credential(body.trim().to_string())),
    }
}

/// Interprets a query response into ordered tool messages.
///
/// HTTP 200 yields text, then the structured payload, then the status
/// variable. Any other status yields a single `Error: <body>` text message.
pub fn interpret_query(status: u16, body: &str) -> Result<Vec<ToolMessage>> {
    if status != 200 {
        return Ok(vec![ToolMessage::text(format!("Error: {body}"))]);
    }

    let response: RemoteResponse = serde_json::from_str(body).map_err(|e| {
        BridgeError::remote_invocation(format!("Malformed query response ({e}): {body}"))
    })?;

    let text = response.text_result();
    Ok(vec![
        ToolMessage::text(text),
        ToolMessage::json(response.data.unwrap_or(Value::Null)),
        ToolMessage::variable(STATUS_VARIABLE, response.msg.unwrap_or(Value::Null)),
    ])
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
