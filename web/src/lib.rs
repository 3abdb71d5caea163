//! Axum transport for the Code Clinic event handler.
//!
//! This crate is the imperative shell around the invocation runtime: it
//! turns an HTTP POST into one [`ActionHandler::dispatch`](clinic_runtime::ActionHandler)
//! call and maps the outcome to a response.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Imperative Shell (Axum)         │  ← HTTP, CORS, correlation ids
//! │  - Request body passthrough             │  ← Logging, metrics scrape
//! │  - Response mapping                     │
//! ├─────────────────────────────────────────┤
//! │         Invocation Runtime              │  ← read → reduce → publish
//! ├─────────────────────────────────────────┤
//! │         Functional Core                 │
//! │  - Pure reducer                         │  ← No I/O, injected clock
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Routes
//!
//! | Method | Path | Response |
//! |--------|------|----------|
//! | `POST` | `/event-handler` | `200 {"status":"success"}` or `502 CHANNEL_UNAVAILABLE` |
//! | `POST` | `/.netlify/functions/event-handler` | same as above |
//! | `GET`  | `/health` | `200 ok` |
//! | `GET`  | `/metrics` | Prometheus text, `404` when disabled |
//!
//! # Example
//!
//! ```ignore
//! use clinic_web::{router, AppState};
//! use std::sync::Arc;
//!
//! let app = router(AppState::new(Arc::new(handler)));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8888").await?;
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

// Re-export key types for convenience
pub use error::AppError;
pub use middleware::{CORRELATION_ID_HEADER, CorrelationId, correlation_id_layer};
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;

/// Primary path of the event handler endpoint.
pub const EVENT_HANDLER_PATH: &str = "/event-handler";

/// Path browser clients deployed against the serverless build post to.
pub const FUNCTION_ALIAS_PATH: &str = "/.netlify/functions/event-handler";

/// Build the application router.
///
/// CORS allows any origin for `GET` and `POST`.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route(EVENT_HANDLER_PATH, post(handlers::handle_event))
        .route(FUNCTION_ALIAS_PATH, post(handlers::handle_event))
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::render_metrics))
        .with_state(state)
        .layer(correlation_id_layer())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
