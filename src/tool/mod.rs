//! Invocation pipeline.
//!
//! One invocation validates the request, gates the SQL, resolves the caller's
//! identity attribute from their database, and forwards the natural-language
//! query to the remote service. Stages run strictly in order and nothing is
//! sent to the remote service unless every earlier stage succeeded.

pub mod request;

pub use request::{parse_port, InvocationRequest, ValidatedInvocation};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::db::{Connector, DatabaseBackend};
use crate::error::Result;
use crate::query::{extract_user_property, QueryExecutor};
use crate::remote::{RemoteQueryRequest, RemoteService, ToolMessage};
use crate::safety::SqlGuard;

/// Pipeline stage, logged as each one is entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Unvalidated,
    SqlValidated,
    ConnectionOpen,
    QueryExecuted,
    ConnectionClosed,
    RemoteDispatched,
    Done,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unvalidated => "unvalidated",
            Self::SqlValidated => "sql_validated",
            Self::ConnectionOpen => "connection_open",
            Self::QueryExecuted => "query_executed",
            Self::ConnectionClosed => "connection_closed",
            Self::RemoteDispatched => "remote_dispatched",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The text-to-data tool.
pub struct Text2DataTool {
    remote: Arc<dyn RemoteService>,
    connector: Arc<dyn Connector>,
    query_timeout: Duration,
}

impl Text2DataTool {
    pub fn new(
        remote: Arc<dyn RemoteService>,
        connector: Arc<dyn Connector>,
        query_timeout: Duration,
    ) -> Self {
        Self {
            remote,
            connector,
            query_timeout,
        }
    }

    /// Runs one invocation and returns its messages in emission order.
    pub async fn invoke(&self, request: InvocationRequest) -> Result<Vec<ToolMessage>> {
        debug!(stage = %Stage::Unvalidated, "Invocation received");

        match self.run(request).await {
            Ok(messages) => {
                debug!(stage = %Stage::Done, "Invocation finished");
                Ok(messages)
            }
            Err(e) => {
                debug!(stage = %Stage::Failed, "{}", e);
                Err(e)
            }
        }
    }

    async fn run(&self, request: InvocationRequest) -> Result<Vec<ToolMessage>> {
        let invocation = request.validate()?;
        info!(
            "Invoking assistant '{}' against {}",
            invocation.assistant_name,
            invocation.connection.display_string()
        );

        let guard = SqlGuard::for_backend(DatabaseBackend::parse(&invocation.connection.engine));
        let statement = guard.validate(&invocation.query_sql)?;
        debug!(stage = %Stage::SqlValidated, "Identity query accepted");

        let executor = QueryExecutor::new(self.connector.as_ref(), self.query_timeout);
        let result = executor.run(&invocation.connection, &statement).await?;
        let user_name = extract_user_property(&result);

        let remote_request =
            RemoteQueryRequest::new(invocation.assistant_name, invocation.query, user_name);
        let messages = self.remote.query(&remote_request).await?;
        debug!(stage = %Stage::RemoteDispatched, "Remote returned {} messages", messages.len());

        info!("Invocation produced {} messages", messages.len());
        Ok(messages)
    }
}
