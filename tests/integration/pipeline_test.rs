//! End-to-end invocation tests.
//!
//! The database side is a scripted connector; the remote side is the
//! in-process HTTP responder.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use text2data::db::{ColumnInfo, MockConnector, QueryResult, Value};
use text2data::error::BridgeError;
use text2data::remote::{HttpRemoteClient, RemoteConfig, ToolMessage};
use text2data::secrets::Secret;
use text2data::tool::{InvocationRequest, Text2DataTool};

use super::http_stub::StubServer;

fn tool(base_url: &str, connector: &Arc<MockConnector>) -> Text2DataTool {
    let remote = HttpRemoteClient::new(
        RemoteConfig::new(base_url, Secret::new("tok")).with_timeout(Duration::from_secs(10)),
    )
    .unwrap();
    Text2DataTool::new(Arc::new(remote), connector.clone(), Duration::from_secs(10))
}

fn request(sql: &str) -> InvocationRequest {
    InvocationRequest::from_json(&format!(
        r#"{{
            "assistantName": "sales",
            "query": "how many orders did I place?",
            "dbType": "postgres",
            "dbHost": "db.internal",
            "dbPort": "",
            "dbUsername": "reader",
            "dbPassword": "hunter2",
            "dbName": "crm",
            "querySql": {}
        }}"#,
        serde_json::to_string(sql).unwrap()
    ))
    .unwrap()
}

fn email_rows() -> QueryResult {
    QueryResult::with_data(
        vec![ColumnInfo::new("email", "text")],
        vec![vec![Value::from("a@b.com")]],
    )
}

#[tokio::test]
async fn test_identity_is_forwarded_as_user_name() {
    let server = StubServer::start(vec![(
        200,
        r#"{"code":200,"msg":"ok","data":{"textResult":"12 orders"}}"#,
    )])
    .await;
    let connector = Arc::new(MockConnector::returning(email_rows()));

    let messages = tool(&server.base_url, &connector)
        .invoke(request("select email from accounts where name = 'admin'"))
        .await
        .unwrap();

    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0], ToolMessage::text("12 orders"));
    assert_eq!(
        server.requests()[0].json(),
        json!({
            "agentName": "sales",
            "queryText": "how many orders did I place?",
            "userName": "a@b.com"
        })
    );
    assert_eq!(connector.open_count(), 1);
    assert_eq!(connector.close_count(), 1);
}

#[tokio::test]
async fn test_no_rows_forwards_empty_user_name() {
    let server = StubServer::start(vec![(200, r#"{"data":null,"msg":"ok"}"#)]).await;
    let connector = Arc::new(MockConnector::returning(QueryResult::new()));

    let messages = tool(&server.base_url, &connector)
        .invoke(request("select email from accounts where name = 'ghost'"))
        .await
        .unwrap();

    assert_eq!(server.requests()[0].json()["userName"], json!(""));
    assert_eq!(messages[0], ToolMessage::text(""));
    assert_eq!(messages[2], ToolMessage::variable("status", json!("ok")));
}

#[tokio::test]
async fn test_rejected_sql_never_reaches_database_or_remote() {
    let server = StubServer::start(vec![(200, r#"{"code":200}"#)]).await;
    let connector = Arc::new(MockConnector::returning(email_rows()));

    let err = tool(&server.base_url, &connector)
        .invoke(request("select 1; select 2"))
        .await
        .unwrap_err();

    assert!(matches!(err, BridgeError::InvalidQuery(ref m) if m == "Only a single query SQL can be filled"));
    assert_eq!(connector.open_count(), 0);
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn test_query_failure_never_reaches_remote() {
    let server = StubServer::start(vec![(200, r#"{"code":200}"#)]).await;
    let connector = Arc::new(MockConnector::failing_query(
        "relation \"acounts\" does not exist",
    ));

    let err = tool(&server.base_url, &connector)
        .invoke(request("select email from acounts"))
        .await
        .unwrap_err();

    assert!(matches!(err, BridgeError::QueryExecution(_)));
    assert_eq!(connector.close_count(), 1);
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn test_remote_http_error_is_reported_as_text() {
    let server = StubServer::start(vec![(500, "internal error")]).await;
    let connector = Arc::new(MockConnector::returning(email_rows()));

    let messages = tool(&server.base_url, &connector)
        .invoke(request("select email from accounts"))
        .await
        .unwrap();

    assert_eq!(messages, vec![ToolMessage::text("Error: internal error")]);
}

#[tokio::test]
async fn test_query_timeout_closes_connection_and_skips_remote() {
    let server = StubServer::start(vec![(200, r#"{"code":200}"#)]).await;
    let connector = Arc::new(MockConnector::stalling(Duration::from_secs(60)));
    let remote = HttpRemoteClient::new(RemoteConfig::new(&server.base_url, Secret::new("tok")))
        .unwrap();
    let tool = Text2DataTool::new(Arc::new(remote), connector.clone(), Duration::from_millis(50));

    let err = tool
        .invoke(request("select email from accounts"))
        .await
        .unwrap_err();

    assert!(matches!(err, BridgeError::QueryExecution(ref m) if m.contains("timed out")));
    assert_eq!(connector.open_count(), 1);
    assert_eq!(connector.close_count(), 1);
    assert!(server.requests().is_empty());
}
