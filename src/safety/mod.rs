//! SQL guard.
//!
//! Parses caller-supplied SQL and admits it only when it is exactly one
//! statement whose top-level type is SELECT. The guard classifies; it never
//! rewrites, sanitizes, or executes anything.
//!
//! Only the top-level statement type is checked. Nested constructs such as
//! data-modifying CTEs, `SELECT ... INTO`, or functions with side effects are
//! not inspected, so read-only access must still be enforced by the database
//! account the query runs as.

mod parser;

pub use parser::{validate, SqlGuard};

use std::fmt;

/// The type of SQL statement detected at the top level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementType {
    Select,
    Values,
    Insert,
    Update,
    Delete,
    Merge,
    Drop,
    Truncate,
    Alter,
    Create,
    Grant,
    Revoke,
    Explain,
    Show,
    /// Statement type could not be determined.
    Unknown,
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select => write!(f, "SELECT"),
            Self::Values => write!(f, "VALUES"),
            Self::Insert => write!(f, "INSERT"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
            Self::Merge => write!(f, "MERGE"),
            Self::Drop => write!(f, "DROP"),
            Self::Truncate => write!(f, "TRUNCATE"),
            Self::Alter => write!(f, "ALTER"),
            Self::Create => write!(f, "CREATE"),
            Self::Grant => write!(f, "GRANT"),
            Self::Revoke => write!(f, "REVOKE"),
            Self::Explain => write!(f, "EXPLAIN"),
            Self::Show => write!(f, "SHOW"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// A SQL string proven to be exactly one SELECT statement.
///
/// Only the guard can construct one. The original text is kept verbatim and
/// is what gets sent to the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedStatement {
    sql: String,
}

impl ValidatedStatement {
    pub(crate) fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into() }
    }

    /// Returns the SQL text exactly as the caller supplied it.
    pub fn as_str(&self) -> &str {
        &self.sql
    }
}

impl fmt::Display for ValidatedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}
