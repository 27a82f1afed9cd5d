//! Mock remote service for testing.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::types::{RemoteQueryRequest, ToolMessage, STATUS_VARIABLE};
use super::RemoteService;
use crate::error::{BridgeError, Result};

/// Remote service that answers from a script and records every query.
#[derive(Debug, Default)]
pub struct MockRemoteService {
    messages: Vec<ToolMessage>,
    query_error: Option<String>,
    requests: Mutex<Vec<RemoteQueryRequest>>,
}

impl MockRemoteService {
    /// Answers every query with `text` as the text result and `"ok"` as status.
    pub fn answering(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            messages: vec![
                ToolMessage::text(text.clone()),
                ToolMessage::json(json!({ "textResult": text })),
                ToolMessage::variable(STATUS_VARIABLE, Value::from("ok")),
            ],
            ..Self::default()
        }
    }

    /// Queries fail with a remote invocation error.
    pub fn failing_query(message: impl Into<String>) -> Self {
        Self {
            query_error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Every query request received, in order.
    pub fn requests(&self) -> Vec<RemoteQueryRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl RemoteService for MockRemoteService {
    async fn verify(&self) -> Result<()> {
        Ok(())
    }

    async fn query(&self, request: &RemoteQueryRequest) -> Result<Vec<ToolMessage>> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        match &self.query_error {
            Some(message) => Err(BridgeError::remote_invocation(message.clone())),
            None => Ok(self.messages.clone()),
        }
    }
}
