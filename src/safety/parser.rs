//! SQL parsing and statement gating.
//!
//! Uses sqlparser-rs with a dialect matching the target engine to parse the
//! caller's SQL and decide whether it is a single top-level SELECT.

use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::dialect::{Dialect, GenericDialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect};
use sqlparser::parser::Parser;
use tracing::debug;

use crate::db::DatabaseBackend;
use crate::error::{BridgeError, Result};

use super::{StatementType, ValidatedStatement};

const MULTIPLE_STATEMENTS: &str = "Only a single query SQL can be filled";
const NOT_A_SELECT: &str = "Query SQL can only be a single SELECT statement";

/// Parses SQL in the dialect of one engine and admits single SELECTs.
pub struct SqlGuard {
    dialect: Box<dyn Dialect + Send + Sync>,
}

impl Default for SqlGuard {
    fn default() -> Self {
        Self::for_backend(None)
    }
}

impl SqlGuard {
    /// Creates a guard for the given backend.
    ///
    /// `None` (an unrecognized engine) falls back to the generic dialect so
    /// the SQL is still checked before the factory rejects the engine.
    pub fn for_backend(backend: Option<DatabaseBackend>) -> Self {
        let dialect: Box<dyn Dialect + Send + Sync> = match backend {
            Some(DatabaseBackend::MySql) => Box::new(MySqlDialect {}),
            Some(DatabaseBackend::Postgres) => Box::new(PostgreSqlDialect {}),
            Some(DatabaseBackend::SqlServer) => Box::new(MsSqlDialect {}),
            None => Box::new(GenericDialect {}),
        };
        Self { dialect }
    }

    /// Validates that `sql` is exactly one SELECT statement.
    pub fn validate(&self, sql: &str) -> Result<ValidatedStatement> {
        let statements = Parser::parse_sql(self.dialect.as_ref(), sql)
            .map_err(|e| BridgeError::invalid_query(format!("{NOT_A_SELECT}: {e}")))?;

        if statements.len() != 1 {
            debug!("Rejected SQL with {} statements", statements.len());
            return Err(BridgeError::invalid_query(MULTIPLE_STATEMENTS));
        }

        match classify_statement(&statements[0]) {
            StatementType::Select => Ok(ValidatedStatement::new(sql)),
            other => {
                debug!("Rejected {} statement", other);
                Err(BridgeError::invalid_query(format!(
                    "{NOT_A_SELECT} (found {other})"
                )))
            }
        }
    }
}

/// Validates SQL with the generic dialect.
pub fn validate(sql: &str) -> Result<ValidatedStatement> {
    SqlGuard::default().validate(sql)
}

/// Returns the top-level type of a parsed statement.
fn classify_statement(statement: &Statement) -> StatementType {
    match statement {
        Statement::Query(query) => classify_query(query),
        Statement::Explain { .. } => StatementType::Explain,
        Statement::ShowVariable { .. }
        | Statement::ShowTables { .. }
        | Statement::ShowColumns { .. }
        | Statement::ShowCreate { .. }
        | Statement::ShowFunctions { .. }
        | Statement::ShowStatus { .. }
        | Statement::ShowCollation { .. } => StatementType::Show,

        Statement::Insert { .. } => StatementType::Insert,
        Statement::Update { .. } => StatementType::Update,
        Statement::Delete { .. } => StatementType::Delete,
        Statement::Merge { .. } => StatementType::Merge,

        Statement::Drop { .. } => StatementType::Drop,
        Statement::Truncate { .. } => StatementType::Truncate,
        Statement::AlterTable { .. }
        | Statement::AlterIndex { .. }
        | Statement::AlterView { .. }
        | Statement::AlterRole { .. } => StatementType::Alter,
        Statement::CreateTable { .. }
        | Statement::CreateIndex { .. }
        | Statement::CreateView { .. }
        | Statement::CreateSchema { .. }
        | Statement::CreateDatabase { .. }
        | Statement::CreateFunction { .. }
        | Statement::CreateRole { .. }
        | Statement::CreateSequence { .. }
        | Statement::CreateType { .. } => StatementType::Create,
        Statement::Grant { .. } => StatementType::Grant,
        Statement::Revoke { .. } => StatementType::Revoke,

        _ => StatementType::Unknown,
    }
}

/// A query's type is the type of its main body; a WITH clause does not change it.
fn classify_query(query: &Query) -> StatementType {
    classify_set_expr(&query.body)
}

fn classify_set_expr(set_expr: &SetExpr) -> StatementType {
    match set_expr {
        SetExpr::Select(_) => StatementType::Select,
        SetExpr::Query(query) => classify_query(query),
        // UNION / INTERSECT / EXCEPT take the type of the leftmost operand
        SetExpr::SetOperation { left, .. } => classify_set_expr(left),
        SetExpr::Values(_) => StatementType::Values,
        SetExpr::Insert(stmt) | SetExpr::Update(stmt) => classify_statement(stmt),
        _ => StatementType::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_accepted(sql: &str) {
        let stmt = validate(sql).unwrap_or_else(|e| panic!("SQL: '{}' - rejected: {}", sql, e));
        assert_eq!(stmt.as_str(), sql, "accepted SQL must be unchanged");
    }

    fn assert_rejected(sql: &str) -> String {
        match validate(sql) {
            Err(BridgeError::InvalidQuery(msg)) => msg,
            other => panic!("SQL: '{}' - expected InvalidQuery, got {:?}", sql, other),
        }
    }

    // Accepted
    #[test]
    fn test_identity_lookup_is_accepted() {
        assert_accepted("select email from accounts where name = 'admin'");
    }

    #[test]
    fn test_select_with_trailing_semicolon_is_accepted() {
        assert_accepted("SELECT name FROM users WHERE id = 7;");
    }

    #[test]
    fn test_select_with_join_is_accepted() {
        assert_accepted(
            "SELECT u.email FROM users u JOIN tenants t ON u.tenant_id = t.id WHERE t.slug = 'acme'",
        );
    }

    #[test]
    fn test_select_with_subquery_is_accepted() {
        assert_accepted("SELECT email FROM users WHERE id IN (SELECT user_id FROM admins)");
    }

    #[test]
    fn test_cte_select_is_accepted() {
        assert_accepted(
            "WITH admins AS (SELECT id FROM users WHERE role = 'admin') SELECT email FROM users WHERE id IN (SELECT id FROM admins)",
        );
    }

    #[test]
    fn test_union_is_accepted() {
        assert_accepted("SELECT email FROM users UNION SELECT email FROM contractors");
    }

    #[test]
    fn test_parenthesized_select_is_accepted() {
        assert_accepted("(SELECT 1)");
    }

    // Statement count
    #[test]
    fn test_two_selects_are_rejected() {
        let msg = assert_rejected("select 1; select 2");
        assert_eq!(msg, "Only a single query SQL can be filled");
    }

    #[test]
    fn test_select_then_delete_is_rejected() {
        let msg = assert_rejected("SELECT 1; DELETE FROM users");
        assert_eq!(msg, "Only a single query SQL can be filled");
    }

    #[test]
    fn test_empty_sql_is_rejected() {
        let msg = assert_rejected("");
        assert_eq!(msg, "Only a single query SQL can be filled");
    }

    #[test]
    fn test_whitespace_sql_is_rejected() {
        assert_rejected("   \n\t ");
    }

    // Statement type
    #[test]
    fn test_insert_is_rejected() {
        let msg = assert_rejected("INSERT INTO users (name) VALUES ('x')");
        assert!(msg.starts_with("Query SQL can only be a single SELECT statement"));
        assert!(msg.contains("INSERT"));
    }

    #[test]
    fn test_update_is_rejected() {
        let msg = assert_rejected("UPDATE users SET name = 'x'");
        assert!(msg.contains("UPDATE"));
    }

    #[test]
    fn test_delete_is_rejected() {
        let msg = assert_rejected("DELETE FROM users WHERE id = 1");
        assert!(msg.contains("DELETE"));
    }

    #[test]
    fn test_drop_is_rejected() {
        let msg = assert_rejected("DROP TABLE users");
        assert!(msg.contains("DROP"));
    }

    #[test]
    fn test_truncate_is_rejected() {
        assert_rejected("TRUNCATE TABLE users");
    }

    #[test]
    fn test_create_is_rejected() {
        let msg = assert_rejected("CREATE TABLE t (id INT)");
        assert!(msg.contains("CREATE"));
    }

    #[test]
    fn test_explain_is_rejected() {
        let msg = assert_rejected("EXPLAIN SELECT * FROM users");
        assert!(msg.contains("EXPLAIN"));
    }

    #[test]
    fn test_values_is_rejected() {
        let msg = assert_rejected("VALUES (1), (2)");
        assert!(msg.contains("VALUES"));
    }

    #[test]
    fn test_cte_insert_is_rejected() {
        assert_rejected("WITH x AS (SELECT 1 AS id) INSERT INTO users (id) SELECT id FROM x");
    }

    #[test]
    fn test_unparsable_sql_is_rejected() {
        let msg = assert_rejected("selec email frm accounts");
        assert!(msg.starts_with("Query SQL can only be a single SELECT statement"));
    }

    // Dialects
    #[test]
    fn test_mysql_backticks_are_accepted() {
        let guard = SqlGuard::for_backend(Some(DatabaseBackend::MySql));
        let sql = "SELECT `email` FROM `accounts` WHERE `name` = 'admin'";
        assert_eq!(guard.validate(sql).unwrap().as_str(), sql);
    }

    #[test]
    fn test_postgres_cast_is_accepted() {
        let guard = SqlGuard::for_backend(Some(DatabaseBackend::Postgres));
        assert!(guard.validate("SELECT id::text FROM users LIMIT 1").is_ok());
    }

    #[test]
    fn test_mssql_brackets_are_accepted() {
        let guard = SqlGuard::for_backend(Some(DatabaseBackend::SqlServer));
        assert!(guard
            .validate("SELECT [email] FROM [dbo].[accounts] WHERE [name] = 'admin'")
            .is_ok());
    }

    #[test]
    fn test_mssql_multiple_statements_are_rejected() {
        let guard = SqlGuard::for_backend(Some(DatabaseBackend::SqlServer));
        assert!(matches!(
            guard.validate("SELECT 1; DROP TABLE accounts"),
            Err(BridgeError::InvalidQuery(_))
        ));
    }
}
