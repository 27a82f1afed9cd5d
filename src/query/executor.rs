//! Scoped query execution.
//!
//! Opens a connection, runs exactly one statement, and closes the connection
//! on every exit path. Nothing is retried.

use std::time::Duration;

use tracing::{debug, warn};

use crate::db::{ConnectionSpec, Connector, DatabaseClient, QueryResult};
use crate::error::{BridgeError, Result};
use crate::safety::ValidatedStatement;
use crate::tool::Stage;

/// Query executor bound to a connector and a query timeout.
pub struct QueryExecutor<'a> {
    connector: &'a dyn Connector,
    query_timeout: Duration,
}

impl<'a> QueryExecutor<'a> {
    /// Creates a new query executor.
    pub fn new(connector: &'a dyn Connector, query_timeout: Duration) -> Self {
        Self {
            connector,
            query_timeout,
        }
    }

    /// Opens a connection for `spec`, runs `statement`, and closes the
    /// connection exactly once whether or not the query succeeded.
    ///
    /// A failed close is logged and never replaces the query outcome.
    pub async fn run(
        &self,
        spec: &ConnectionSpec,
        statement: &ValidatedStatement,
    ) -> Result<QueryResult> {
        let mut client = self.connector.open(spec).await?;
        debug!(stage = %Stage::ConnectionOpen, "Connected to {}", spec.display_string());

        let result = self.execute(client.as_mut(), statement).await;
        if result.is_ok() {
            debug!(stage = %Stage::QueryExecuted, "Query finished");
        }

        match client.close().await {
            Ok(()) => debug!(stage = %Stage::ConnectionClosed, "Connection closed"),
            Err(e) => warn!("Failed to close connection to {}: {}", spec.display_string(), e),
        }

        result
    }

    /// Runs `statement` once on an open connection, bounded by the query
    /// timeout. Every failure surfaces as a query execution error carrying
    /// the driver's diagnostic.
    pub async fn execute(
        &self,
        client: &mut dyn DatabaseClient,
        statement: &ValidatedStatement,
    ) -> Result<QueryResult> {
        let result = tokio::time::timeout(self.query_timeout, client.execute_query(statement))
            .await
            .map_err(|_| {
                BridgeError::query_execution(format!(
                    "Query timed out after {} seconds",
                    self.query_timeout.as_secs()
                ))
            })?
            .map_err(|e| match e {
                BridgeError::QueryExecution(_) => e,
                other => BridgeError::query_execution(other.to_string()),
            })?;

        debug!(
            "Query returned {} rows in {:?}",
            result.row_count(),
            result.execution_time
        );
        Ok(result)
    }
}

/// Returns the first value of the first row as a string, or the empty
/// string when the result has no rows.
pub fn extract_user_property(result: &QueryResult) -> String {
    result
        .first_value()
        .map(|v| v.to_property_string())
        .unwrap_or_default()
}
