//! Prometheus scrape endpoint.

use crate::{AppError, AppState};
use axum::{
    extract::State,
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
};

/// Prometheus text exposition of the process's metrics.
///
/// # Endpoint
///
/// ```text
/// GET /metrics
/// ```
///
/// # Errors
///
/// Returns 404 when metrics are disabled.
#[allow(clippy::unused_async)]
pub async fn render_metrics(State(state): State<AppState>) -> Result<Response, AppError> {
    let handle = state
        .metrics()
        .ok_or_else(|| AppError::not_found("Metrics are disabled"))?;

    Ok((
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    )
        .into_response())
}
