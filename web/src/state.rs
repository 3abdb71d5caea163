//! Application state for Axum handlers.

use clinic_runtime::ActionHandler;
use clinic_runtime::metrics::PrometheusHandle;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// Holds the invocation entry point behind a trait object so the router does
/// not name the reducer type. Cloning is cheap.
///
/// # Examples
///
/// ```ignore
/// use clinic_web::AppState;
/// use std::sync::Arc;
///
/// let handler = EventHandler::new(QuizReducer::new(), env, channel, "code-clinic-event");
/// let state = AppState::new(Arc::new(handler)).with_metrics(recorder.handle().cloned());
/// ```
#[derive(Clone)]
pub struct AppState {
    handler: Arc<dyn ActionHandler>,
    metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create state around an action handler, with metrics disabled.
    #[must_use]
    pub fn new(handler: Arc<dyn ActionHandler>) -> Self {
        Self {
            handler,
            metrics: None,
        }
    }

    /// Serve the given Prometheus handle at `/metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Option<PrometheusHandle>) -> Self {
        self.metrics = metrics;
        self
    }

    /// The action handler.
    #[must_use]
    pub fn handler(&self) -> &dyn ActionHandler {
        self.handler.as_ref()
    }

    /// The Prometheus handle, when metrics are enabled.
    #[must_use]
    pub const fn metrics(&self) -> Option<&PrometheusHandle> {
        self.metrics.as_ref()
    }
}
