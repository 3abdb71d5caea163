//! Router tests with a scripted action handler.

#![allow(clippy::unwrap_used)]

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use clinic_core::channel::ChannelError;
use clinic_runtime::{Acknowledgement, ActionHandler, DispatchFuture, HandlerError};
use clinic_web::{AppState, CORRELATION_ID_HEADER, router};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// Records every body it sees and answers with a fixed result.
struct ScriptedHandler {
    bodies: Mutex<Vec<Vec<u8>>>,
    failure: Option<HandlerError>,
}

impl ScriptedHandler {
    fn ok() -> Arc<Self> {
        Arc::new(Self {
            bodies: Mutex::new(Vec::new()),
            failure: None,
        })
    }

    fn failing(error: HandlerError) -> Arc<Self> {
        Arc::new(Self {
            bodies: Mutex::new(Vec::new()),
            failure: Some(error),
        })
    }

    fn bodies(&self) -> Vec<Vec<u8>> {
        self.bodies.lock().unwrap().clone()
    }
}

impl ActionHandler for ScriptedHandler {
    fn dispatch<'a>(&'a self, body: &'a [u8]) -> DispatchFuture<'a> {
        Box::pin(async move {
            self.bodies.lock().unwrap().push(body.to_vec());
            match &self.failure {
                Some(error) => Err(error.clone()),
                None => Ok(Acknowledgement {
                    kind: "requestState".to_string(),
                    changed: false,
                }),
            }
        })
    }
}

fn post(uri: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn event_post_dispatches_body_and_acknowledges() {
    let handler = ScriptedHandler::ok();
    let app = router(AppState::new(handler.clone()));

    let body = r#"{"type":"requestState","senderId":"u1"}"#;
    let response = app.oneshot(post("/event-handler", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(CORRELATION_ID_HEADER));
    assert_eq!(json_body(response).await, json!({ "status": "success" }));
    assert_eq!(handler.bodies(), vec![body.as_bytes().to_vec()]);
}

#[tokio::test]
async fn function_alias_path_is_served() {
    let handler = ScriptedHandler::ok();
    let app = router(AppState::new(handler.clone()));

    let response = app
        .oneshot(post("/.netlify/functions/event-handler", r#"{"type":"requestState"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(handler.bodies().len(), 1);
}

#[tokio::test]
async fn malformed_body_is_passed_through_and_acknowledged() {
    let handler = ScriptedHandler::ok();
    let app = router(AppState::new(handler.clone()));

    let response = app.oneshot(post("/event-handler", "not json")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(handler.bodies(), vec![b"not json".to_vec()]);
}

#[tokio::test]
async fn channel_failure_is_bad_gateway() {
    let handler = ScriptedHandler::failing(HandlerError::ReadFailed(
        ChannelError::ConnectionFailed("refused".to_string()),
    ));
    let app = router(AppState::new(handler));

    let response = app
        .oneshot(post("/event-handler", r#"{"type":"requestState"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(response).await;
    assert_eq!(body["code"], "CHANNEL_UNAVAILABLE");
}

#[tokio::test]
async fn health_is_ok() {
    let app = router(AppState::new(ScriptedHandler::ok()));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), 1024).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn metrics_are_not_found_when_disabled() {
    let app = router(AppState::new(ScriptedHandler::ok()));

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_on_event_handler_is_rejected() {
    let handler = ScriptedHandler::ok();
    let app = router(AppState::new(handler.clone()));

    let response = app
        .oneshot(Request::builder().uri("/event-handler").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(handler.bodies().is_empty());
}
