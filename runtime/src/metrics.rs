//! Prometheus metrics for observability and monitoring.
//!
//! This module provides metric collection for the invocation loop:
//! - Handler invocations, state changes and failures
//! - Snapshot reads and fallbacks to the initial state
//! - Channel publishes
//!
//! # Example
//!
//! ```rust,no_run
//! use clinic_runtime::metrics::MetricsRecorder;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut recorder = MetricsRecorder::new();
//! recorder.install()?;
//!
//! // Later, from the /metrics route
//! let body = recorder.render().unwrap_or_default();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, histogram};
pub use metrics_exporter_prometheus::PrometheusHandle;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Installs the Prometheus recorder and renders its scrape output.
#[derive(Default)]
pub struct MetricsRecorder {
    handle: Option<PrometheusHandle>,
}

impl MetricsRecorder {
    /// Create a recorder that is not yet installed.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Register metric descriptions and install the global recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a metrics recorder is already installed (e.g., in tests), this logs a
    /// warning and leaves [`render`](Self::render) returning `None`.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if the recorder hasn't been installed by this instance.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!(
        "handler_invocations_total",
        "Total number of handler invocations, labelled by action kind"
    );
    describe_counter!(
        "handler_state_changes_total",
        "Invocations whose action changed the state"
    );
    describe_counter!(
        "handler_failures_total",
        "Invocations that failed on a channel call"
    );
    describe_histogram!(
        "handler_duration_seconds",
        "Wall time of one invocation, including channel calls"
    );
    describe_counter!(
        "snapshot_fallbacks_total",
        "Reads that fell back to the initial state, labelled by reason"
    );
    describe_counter!(
        "channel_publishes_total",
        "Snapshots published to the channel"
    );
}

/// Handler metrics recorder.
pub struct HandlerMetrics;

impl HandlerMetrics {
    /// Record a completed invocation.
    pub fn record_invocation(kind: &str, changed: bool, duration: Duration) {
        counter!("handler_invocations_total", "kind" => kind.to_string()).increment(1);
        if changed {
            counter!("handler_state_changes_total").increment(1);
        }
        histogram!("handler_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a failed invocation.
    pub fn record_failure(stage: &'static str) {
        counter!("handler_failures_total", "stage" => stage).increment(1);
    }
}

/// Snapshot and channel metrics recorder.
pub struct ChannelMetrics;

impl ChannelMetrics {
    /// Record a read that produced the initial state.
    pub fn record_fallback(reason: &'static str) {
        counter!("snapshot_fallbacks_total", "reason" => reason).increment(1);
    }

    /// Record a publish.
    pub fn record_publish() {
        counter!("channel_publishes_total").increment(1);
    }
}
