//! Connection factory.
//!
//! Turns a [`ConnectionSpec`] into a live, exclusively owned connection for
//! one of a small fixed set of engines. Every engine sits behind the same
//! [`DatabaseClient`] trait; URL building, default ports, TLS properties, and
//! row decoding stay inside the engine modules.

mod mock;
mod mssql;
mod mysql;
mod postgres;
mod spec;
mod types;

pub use mock::{MockConnector, MockDatabaseClient};
pub use mssql::MssqlClient;
pub use mysql::MySqlClient;
pub use postgres::PostgresClient;
pub use spec::{parse_properties, ConnectionSpec};
pub use types::{ColumnInfo, QueryResult, Row, Value};

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::error::{BridgeError, Result};
use crate::safety::ValidatedStatement;
pub use crate::secrets::Secret;

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseBackend {
    MySql,
    Postgres,
    SqlServer,
}

impl DatabaseBackend {
    /// Returns the canonical engine identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
            Self::SqlServer => "sqlserver",
        }
    }

    /// Parses an engine identifier (case-insensitive, surrounding whitespace ignored).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "mysql" | "mariadb" => Some(Self::MySql),
            "postgres" | "postgresql" | "pg" => Some(Self::Postgres),
            "sqlserver" | "mssql" => Some(Self::SqlServer),
            _ => None,
        }
    }

    /// Returns the default port for this backend.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::MySql => 3306,
            Self::Postgres => 5432,
            Self::SqlServer => 1433,
        }
    }

    /// Returns the URL scheme for URL-configured backends.
    pub fn url_scheme(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
            Self::SqlServer => "mssql",
        }
    }
}

impl fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A live connection to one database, owned by exactly one invocation.
#[async_trait]
pub trait DatabaseClient: Send {
    /// Runs the statement once and returns every row.
    async fn execute_query(&mut self, statement: &ValidatedStatement) -> Result<QueryResult>;

    /// Closes the underlying session. Consumes the client so it cannot be
    /// used or closed again.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Opens connections for a [`ConnectionSpec`].
///
/// The executor goes through this seam so tests can substitute scripted
/// connections.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, spec: &ConnectionSpec) -> Result<Box<dyn DatabaseClient>>;
}

/// Connector backed by the real drivers.
#[derive(Debug, Clone)]
pub struct DriverConnector {
    connect_timeout: Duration,
}

impl DriverConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl Connector for DriverConnector {
    async fn open(&self, spec: &ConnectionSpec) -> Result<Box<dyn DatabaseClient>> {
        connect(spec, self.connect_timeout).await
    }
}

/// Creates a database client for the engine named in `spec`.
///
/// This is the central factory function for database connections. The
/// engine is resolved before any network activity.
pub async fn connect(spec: &ConnectionSpec, timeout: Duration) -> Result<Box<dyn DatabaseClient>> {
    let backend = spec.backend()?;
    debug!("Opening {} connection to {}", backend, spec.display_string());

    let attempt = async {
        let client: Box<dyn DatabaseClient> = match backend {
            DatabaseBackend::MySql => Box::new(MySqlClient::connect(spec).await?),
            DatabaseBackend::Postgres => Box::new(PostgresClient::connect(spec).await?),
            DatabaseBackend::SqlServer => Box::new(MssqlClient::connect(spec).await?),
        };
        Ok::<_, BridgeError>(client)
    };

    tokio::time::timeout(timeout, attempt).await.map_err(|_| {
        BridgeError::connection(format!(
            "Connection to {}:{} timed out after {} seconds",
            spec.host,
            spec.port_or_default(backend),
            timeout.as_secs()
        ))
    })?
}

/// Builds a driver URL with percent-encoded credentials and properties as
/// query options.
pub(crate) fn build_url(backend: DatabaseBackend, spec: &ConnectionSpec) -> Result<Url> {
    let invalid = |what: &str| BridgeError::connection(format!("Invalid {what} for {backend}"));

    let mut url = Url::parse(&format!("{}://localhost", backend.url_scheme()))
        .map_err(|e| BridgeError::internal(format!("Failed to build connection URL: {e}")))?;

    // mysql:// and postgres:// are not special schemes, so an IPv6 literal
    // must arrive bracketed.
    let host = spec.host_addr();
    let host = if host.contains(':') {
        format!("[{host}]")
    } else {
        host.to_string()
    };
    url.set_host(Some(&host))
        .map_err(|e| BridgeError::connection(format!("Invalid host '{}': {e}", spec.host)))?;
    url.set_port(Some(spec.port_or_default(backend)))
        .map_err(|_| invalid("port"))?;
    url.set_username(&spec.username)
        .map_err(|_| invalid("username"))?;
    url.set_password(Some(spec.password.expose()))
        .map_err(|_| invalid("password"))?;

    if let Some(database) = spec.database_name() {
        url.set_path(&format!("/{database}"));
    }

    let properties = spec.parsed_properties()?;
    if !properties.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in &properties {
            pairs.append_pair(key, value);
        }
    }

    Ok(url)
}

/// Error for a result column the engine module has no decoding for.
pub(crate) fn unsupported_column_type(type_name: &str) -> BridgeError {
    BridgeError::query_execution(format!("unsupported column type {type_name}"))
}

/// Maps a driver connection failure to a user-readable message.
pub(crate) fn map_connection_error(
    error: &str,
    spec: &ConnectionSpec,
    backend: DatabaseBackend,
) -> BridgeError {
    let host = &spec.host;
    let port = spec.port_or_default(backend);
    let user = &spec.username;
    let database = spec.database_name().unwrap_or("unknown");

    let error_str = error.to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        BridgeError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
        || error_str.contains("access denied")
        || error_str.contains("login failed")
    {
        BridgeError::connection(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if (error_str.contains("does not exist") || error_str.contains("unknown database"))
        && error_str.contains("database")
    {
        BridgeError::connection(format!("Database '{database}' does not exist."))
    } else if error_str.contains("ssl")
        || error_str.contains("tls")
        || error_str.contains("certificate")
    {
        BridgeError::connection(format!("TLS negotiation with {host}:{port} failed: {error}"))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        BridgeError::connection(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        BridgeError::connection(error.to_string())
    }
}
