//! Error types for text2data.
//!
//! Defines the single error enum used throughout the bridge. Each variant is
//! scoped to one invocation; none of them is fatal to the process.

use thiserror::Error;

/// Main error type for text2data operations.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// A required invocation field is missing or blank.
    #[error("Missing field: {0}")]
    MissingField(String),

    /// The SQL guard rejected the statement.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The requested database engine is not supported.
    #[error("Unsupported database engine: {0}")]
    UnsupportedEngine(String),

    /// Database connection errors (host unreachable, auth failed, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution errors, with the driver diagnostic preserved.
    #[error("Error executing SQL: {0}")]
    QueryExecution(String),

    /// Remote credential verification failed for any reason.
    #[error("Credential verification failed: {0}")]
    Credential(String),

    /// The remote query call could not be completed.
    #[error("Remote invocation failed: {0}")]
    RemoteInvocation(String),

    /// Configuration errors (invalid config file, bad port, missing base URL, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Creates a missing-field error with the given message.
    pub fn missing_field(msg: impl Into<String>) -> Self {
        Self::MissingField(msg.into())
    }

    /// Creates an invalid-query error with the given message.
    pub fn invalid_query(msg: impl Into<String>) -> Self {
        Self::InvalidQuery(msg.into())
    }

    /// Creates an unsupported-engine error naming the engine.
    pub fn unsupported_engine(engine: impl Into<String>) -> Self {
        Self::UnsupportedEngine(engine.into())
    }

    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query execution error with the given message.
    pub fn query_execution(msg: impl Into<String>) -> Self {
        Self::QueryExecution(msg.into())
    }

    /// Creates a credential error with the given message.
    pub fn credential(msg: impl Into<String>) -> Self {
        Self::Credential(msg.into())
    }

    /// Creates a remote invocation error with the given message.
    pub fn remote_invocation(msg: impl Into<String>) -> Self {
        Self::RemoteInvocation(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "Missing Field",
            Self::InvalidQuery(_) => "Invalid Query",
            Self::UnsupportedEngine(_) => "Unsupported Engine",
            Self::Connection(_) => "Connection Error",
            Self::QueryExecution(_) => "Query Execution Error",
            Self::Credential(_) => "Credential Error",
            Self::RemoteInvocation(_) => "Remote Invocation Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using BridgeError.
pub type Result<T> = std::result::Result<T, BridgeError>;
