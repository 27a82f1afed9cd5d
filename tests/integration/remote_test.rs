//! Remote service integration tests.
//!
//! Exercises the HTTP client against the in-process responder.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use text2data::error::BridgeError;
use text2data::remote::{HttpRemoteClient, RemoteConfig, RemoteQueryRequest, RemoteService, ToolMessage};
use text2data::secrets::Secret;

use super::http_stub::StubServer;

fn client(base_url: &str) -> HttpRemoteClient {
    HttpRemoteClient::new(
        RemoteConfig::new(base_url, Secret::new("tok-123")).with_timeout(Duration::from_secs(10)),
    )
    .unwrap()
}

#[tokio::test]
async fn test_verify_sends_token_and_accepts_code_200() {
    let server = StubServer::start(vec![(200, r#"{"code":200,"msg":"success"}"#)]).await;

    client(&server.base_url).verify().await.unwrap();

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/api/chat/query/verify");
    assert_eq!(request.header("authorization"), Some("Bearer tok-123"));
    assert_eq!(request.header("content-type"), Some("application/json"));
    assert_eq!(request.json(), json!({"access_token": "tok-123"}));
}

#[tokio::test]
async fn test_verify_rejects_code_401_in_200_body() {
    let server = StubServer::start(vec![(200, r#"{"code":401,"msg":"token expired"}"#)]).await;

    let err = client(&server.base_url).verify().await.unwrap_err();

    assert!(matches!(err, BridgeError::Credential(ref m) if m.contains("token expired")));
}

#[tokio::test]
async fn test_verify_rejects_http_error() {
    let server = StubServer::start(vec![(401, "unauthorized")]).await;

    let err = client(&server.base_url).verify().await.unwrap_err();

    assert!(matches!(err, BridgeError::Credential(ref m) if m.contains("401") && m.contains("unauthorized")));
}

#[tokio::test]
async fn test_verify_rejects_malformed_body() {
    let server = StubServer::start(vec![(200, "<html>gateway</html>")]).await;

    let err = client(&server.base_url).verify().await.unwrap_err();

    assert!(matches!(err, BridgeError::Credential(_)));
}

#[tokio::test]
async fn test_query_posts_request_and_maps_messages() {
    let server = StubServer::start(vec![(
        200,
        r#"{"code":200,"msg":"ok","data":{"textResult":"You placed 12 orders.","sql":"select count(*) from orders"}}"#,
    )])
    .await;
    let base_url = format!("{}/", server.base_url);

    let messages = client(&base_url)
        .query(&RemoteQueryRequest::new("sales", "how many orders?", "a@b.com"))
        .await
        .unwrap();

    assert_eq!(
        messages,
        vec![
            ToolMessage::text("You placed 12 orders."),
            ToolMessage::json(json!({
                "textResult": "You placed 12 orders.",
                "sql": "select count(*) from orders"
            })),
            ToolMessage::variable("status", json!("ok")),
        ]
    );

    let request = &server.requests()[0];
    assert_eq!(request.path, "/api/chat/dify/executeByParams");
    assert_eq!(request.header("authorization"), Some("Bearer tok-123"));
    assert_eq!(
        request.json(),
        json!({"agentName": "sales", "queryText": "how many orders?", "userName": "a@b.com"})
    );
}

#[tokio::test]
async fn test_query_null_data_still_emits_three_messages() {
    let server = StubServer::start(vec![(200, r#"{"data":null,"msg":"ok"}"#)]).await;

    let messages = client(&server.base_url)
        .query(&RemoteQueryRequest::new("sales", "q", ""))
        .await
        .unwrap();

    assert_eq!(
        messages,
        vec![
            ToolMessage::text(""),
            ToolMessage::json(serde_json::Value::Null),
            ToolMessage::variable("status", json!("ok")),
        ]
    );
}

#[tokio::test]
async fn test_query_http_error_is_single_text_message() {
    let server = StubServer::start(vec![(502, "bad gateway")]).await;

    let messages = client(&server.base_url)
        .query(&RemoteQueryRequest::new("sales", "q", "a@b.com"))
        .await
        .unwrap();

    assert_eq!(messages, vec![ToolMessage::text("Error: bad gateway")]);
}

#[tokio::test]
async fn test_query_malformed_body_is_remote_invocation_error() {
    let server = StubServer::start(vec![(200, "not json")]).await;

    let err = client(&server.base_url)
        .query(&RemoteQueryRequest::new("sales", "q", ""))
        .await
        .unwrap_err();

    assert!(matches!(err, BridgeError::RemoteInvocation(_)));
}
