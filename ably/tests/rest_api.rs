//! Integration tests for the Ably REST channel against a mock server.

#![allow(clippy::unwrap_used, clippy::panic)]

use clinic_ably::AblyChannel;
use clinic_core::channel::{Channel, ChannelError, ChannelMessage, HistoryQuery};
use serde_json::json;
use wiremock::matchers::{basic_auth, body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CHANNEL: &str = "code-clinic-event";
const MESSAGES_PATH: &str = "/channels/code-clinic-event/messages";

fn client(server: &MockServer) -> AblyChannel {
    AblyChannel::builder()
        .api_key("app.key:secret")
        .rest_url(server.uri())
        .build()
        .unwrap()
}

#[tokio::test]
async fn history_requests_newest_message_with_basic_auth() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(MESSAGES_PATH))
        .and(query_param("limit", "1"))
        .and(query_param("direction", "backwards"))
        .and(basic_auth("app.key", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": "msg-1",
                "name": "stateUpdate",
                "data": "{\"round\":1,\"teams\":{}}",
                "encoding": "json",
                "timestamp": 1_735_689_600_000_i64
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let messages = client(&server)
        .history(CHANNEL, HistoryQuery::latest())
        .await
        .unwrap();

    assert_eq!(messages.len(), 1);
    assert!(messages[0].is_named("stateUpdate"));
    assert_eq!(messages[0].data, json!({ "round": 1, "teams": {} }));
    assert_eq!(messages[0].timestamp.unwrap().timestamp(), 1_735_689_600);
}

#[tokio::test]
async fn empty_history_is_an_empty_list() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(MESSAGES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let messages = client(&server)
        .history(CHANNEL, HistoryQuery::latest())
        .await
        .unwrap();

    assert!(messages.is_empty());
}

#[tokio::test]
async fn publish_sends_json_encoded_payload() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MESSAGES_PATH))
        .and(basic_auth("app.key", "secret"))
        .and(body_json(json!({
            "name": "stateUpdate",
            "data": "{\"round\":2}",
            "encoding": "json"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "channel": CHANNEL })))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .publish(CHANNEL, &ChannelMessage::new("stateUpdate", json!({ "round": 2 })))
        .await
        .unwrap();
}

#[tokio::test]
async fn rejected_credential_is_unauthorized() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(MESSAGES_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "Invalid key", "code": 40101 }
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .history(CHANNEL, HistoryQuery::latest())
        .await
        .unwrap_err();

    assert!(matches!(err, ChannelError::Unauthorized(ref body) if body.contains("Invalid key")));
}

#[tokio::test]
async fn server_error_on_history_is_history_failed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(MESSAGES_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let err = client(&server)
        .history(CHANNEL, HistoryQuery::latest())
        .await
        .unwrap_err();

    match err {
        ChannelError::HistoryFailed { channel, reason } => {
            assert_eq!(channel, CHANNEL);
            assert!(reason.contains("503"));
        },
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn server_error_on_publish_is_publish_failed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MESSAGES_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = client(&server)
        .publish(CHANNEL, &ChannelMessage::new("stateUpdate", json!({})))
        .await
        .unwrap_err();

    assert!(matches!(err, ChannelError::PublishFailed { .. }));
}

#[tokio::test]
async fn non_list_history_is_invalid_response() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(MESSAGES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "unexpected": true })))
        .mount(&server)
        .await;

    let err = client(&server)
        .history(CHANNEL, HistoryQuery::latest())
        .await
        .unwrap_err();

    assert!(matches!(err, ChannelError::InvalidResponse(_)));
}

#[tokio::test]
async fn unreachable_service_is_connection_failed() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let channel = AblyChannel::builder()
        .api_key("app.key:secret")
        .rest_url(uri)
        .build()
        .unwrap();

    let err = channel
        .history(CHANNEL, HistoryQuery::latest())
        .await
        .unwrap_err();

    assert!(matches!(err, ChannelError::ConnectionFailed(_)));
}
