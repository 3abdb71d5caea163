//! Event handler endpoint.
//!
//! One POST is one invocation: read the newest snapshot, apply the action,
//! publish, acknowledge. Clients never get state back from this endpoint;
//! they receive it from the channel subscription.

use crate::middleware::CorrelationId;
use crate::{AppError, AppState};
use axum::{
    Extension,
    body::Bytes,
    extract::State,
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
};
use clinic_runtime::SUCCESS_BODY;

/// Dispatch one action.
///
/// The body is passed through untouched: a body that is not a valid action
/// envelope is still acknowledged, and the current state is still
/// republished.
///
/// # Endpoint
///
/// ```text
/// POST /event-handler
/// POST /.netlify/functions/event-handler
/// ```
///
/// # Response
///
/// ```json
/// { "status": "success" }
/// ```
///
/// # Errors
///
/// Returns 502 `CHANNEL_UNAVAILABLE` when the channel could not be read or
/// published to. Nothing is retried here; the client may resend.
pub async fn handle_event(
    State(state): State<AppState>,
    correlation_id: Option<Extension<CorrelationId>>,
    body: Bytes,
) -> Result<Response, AppError> {
    let ack = state.handler().dispatch(&body).await?;

    tracing::debug!(
        correlation_id = ?correlation_id.map(|Extension(id)| id.0),
        kind = %ack.kind,
        changed = ack.changed,
        "Action acknowledged"
    );

    Ok(([(CONTENT_TYPE, "application/json")], SUCCESS_BODY).into_response())
}
