//! Mock database connections for testing.
//!
//! Provides scripted in-memory connections that record what they were asked
//! to run and how many times they were closed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{ConnectionSpec, Connector, DatabaseClient, QueryResult};
use crate::error::{BridgeError, Result};
use crate::safety::ValidatedStatement;

#[derive(Debug, Clone)]
enum Outcome {
    Rows(QueryResult),
    Fail(String),
    Stall(Duration),
}

/// Counters shared between a connector and the clients it hands out.
#[derive(Debug, Default)]
struct Journal {
    opens: AtomicUsize,
    closes: AtomicUsize,
    executed: Mutex<Vec<String>>,
}

impl Journal {
    fn record(&self, sql: &str) {
        self.executed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(sql.to_string());
    }
}

/// A mock database client that returns a predefined result or failure.
#[derive(Debug)]
pub struct MockDatabaseClient {
    outcome: Outcome,
    journal: Arc<Journal>,
}

impl MockDatabaseClient {
    /// Creates a client that answers every query with `result`.
    pub fn with_result(result: QueryResult) -> Self {
        Self {
            outcome: Outcome::Rows(result),
            journal: Arc::default(),
        }
    }

    /// Creates a client whose queries fail with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Fail(message.into()),
            journal: Arc::default(),
        }
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn execute_query(&mut self, statement: &ValidatedStatement) -> Result<QueryResult> {
        self.journal.record(statement.as_str());
        match &self.outcome {
            Outcome::Rows(result) => Ok(result.clone()),
            Outcome::Fail(message) => Err(BridgeError::query_execution(message.clone())),
            Outcome::Stall(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(QueryResult::new())
            }
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.journal.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A connector that hands out [`MockDatabaseClient`]s.
///
/// Engine identifiers are still resolved, so unsupported engines fail the
/// same way they do with the real drivers.
#[derive(Debug)]
pub struct MockConnector {
    outcome: Outcome,
    connect_error: Option<String>,
    journal: Arc<Journal>,
}

impl MockConnector {
    /// Connections answer every query with `result`.
    pub fn returning(result: QueryResult) -> Self {
        Self {
            outcome: Outcome::Rows(result),
            connect_error: None,
            journal: Arc::default(),
        }
    }

    /// Connections open fine but every query fails with `message`.
    pub fn failing_query(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Fail(message.into()),
            connect_error: None,
            journal: Arc::default(),
        }
    }

    /// Connections open fine but every query takes `delay` before answering
    /// with no rows.
    pub fn stalling(delay: Duration) -> Self {
        Self {
            outcome: Outcome::Stall(delay),
            connect_error: None,
            journal: Arc::default(),
        }
    }

    /// Every open fails with a connection error.
    pub fn failing_connect(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Rows(QueryResult::new()),
            connect_error: Some(message.into()),
            journal: Arc::default(),
        }
    }

    /// Number of successful opens.
    pub fn open_count(&self) -> usize {
        self.journal.opens.load(Ordering::SeqCst)
    }

    /// Number of closes across all handed-out clients.
    pub fn close_count(&self) -> usize {
        self.journal.closes.load(Ordering::SeqCst)
    }

    /// SQL text of every executed statement, in order.
    pub fn executed(&self) -> Vec<String> {
        self.journal
            .executed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, spec: &ConnectionSpec) -> Result<Box<dyn DatabaseClient>> {
        spec.backend()?;

        if let Some(message) = &self.connect_error {
            return Err(BridgeError::connection(message.clone()));
        }

        self.journal.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockDatabaseClient {
            outcome: self.outcome.clone(),
            journal: Arc::clone(&self.journal),
        }))
    }
}
