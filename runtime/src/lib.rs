//! # Code Clinic Runtime
//!
//! Stateless invocation runtime for the Code Clinic event handler.
//!
//! Each invocation is an independent unit of work:
//!
//! 1. **Read** the newest snapshot from the channel's history
//! 2. **Reduce** the requested action against it
//! 3. **Publish** the resulting snapshot, whether or not it changed
//! 4. **Acknowledge** the caller
//!
//! Nothing is kept in memory between invocations. Two concurrent invocations
//! may read the same snapshot; the channel orders their publishes and the last
//! one wins. There is no locking and no compare-and-swap.
//!
//! ## Example
//!
//! ```ignore
//! use clinic_runtime::EventHandler;
//! use std::sync::Arc;
//!
//! let handler = EventHandler::new(QuizReducer::new(), env, Arc::new(channel), "code-clinic-event");
//!
//! let response = handler.invoke(br#"{"type":"requestState","senderId":"u1"}"#).await;
//! assert_eq!(response.status_code, 200);
//! ```

use clinic_core::channel::{Channel, ChannelError, ChannelMessage, HistoryQuery};
use clinic_core::reducer::{Change, Reducer};
use clinic_core::request::{ActionRequest, DecodeAction};
use clinic_core::state::Snapshot;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

/// Prometheus metrics for observability
pub mod metrics;

use metrics::{ChannelMetrics, HandlerMetrics};

/// Event name carried by every snapshot message.
pub const STATE_UPDATE_EVENT: &str = "stateUpdate";

/// Action kind reported for bodies that could not be parsed.
pub const MALFORMED_KIND: &str = "malformed";

/// Error types for the invocation runtime
pub mod error {
    use clinic_core::channel::ChannelError;
    use thiserror::Error;

    /// Errors that abort an invocation.
    ///
    /// Only the channel calls can fail; the reducer is total. No state is
    /// persisted by a failed invocation because publishing is the only write.
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum HandlerError {
        /// The newest snapshot could not be read
        #[error("Failed to read channel history: {0}")]
        ReadFailed(#[source] ChannelError),

        /// The resulting snapshot could not be published
        #[error("Failed to publish snapshot: {0}")]
        PublishFailed(#[source] ChannelError),

        /// The state could not be encoded as JSON
        #[error("Failed to encode state: {0}")]
        Encode(String),
    }

    impl HandlerError {
        /// Stage label for logs and metrics.
        #[must_use]
        pub const fn stage(&self) -> &'static str {
            match self {
                Self::ReadFailed(_) => "read",
                Self::PublishFailed(_) => "publish",
                Self::Encode(_) => "encode",
            }
        }

        /// The underlying channel error, if any.
        #[must_use]
        pub const fn channel_error(&self) -> Option<&ChannelError> {
            match self {
                Self::ReadFailed(e) | Self::PublishFailed(e) => Some(e),
                Self::Encode(_) => None,
            }
        }
    }
}

pub use error::HandlerError;

/// Where an invocation's starting state came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotSource {
    /// The newest history entry was a usable snapshot
    History,
    /// The channel has no history (cold start)
    Empty,
    /// The newest entry is not tagged with the snapshot event name
    Untagged,
    /// The newest entry is tagged but is not shaped like the state
    Corrupt(String),
}

impl SnapshotSource {
    const fn label(&self) -> &'static str {
        match self {
            Self::History => "history",
            Self::Empty => "empty",
            Self::Untagged => "untagged",
            Self::Corrupt(_) => "corrupt",
        }
    }
}

/// State recovered from the channel at the start of an invocation.
#[derive(Debug, Clone)]
pub struct LoadedSnapshot<S> {
    /// The state to reduce against
    pub state: S,
    /// Provenance of `state`
    pub source: SnapshotSource,
    raw: Option<serde_json::Value>,
}

impl<S> LoadedSnapshot<S> {
    /// The JSON exactly as read, when it came from history and needed no repair.
    #[must_use]
    pub const fn raw(&self) -> Option<&serde_json::Value> {
        self.raw.as_ref()
    }
}

/// Result of a successful invocation.
#[derive(Debug, Clone)]
pub struct Outcome<S> {
    /// Action kind as decoded (or [`MALFORMED_KIND`])
    pub kind: String,
    /// Whether the reducer changed the state
    pub change: Change,
    /// Provenance of the starting state
    pub source: SnapshotSource,
    /// The state that was published
    pub state: S,
}

/// Function-style response envelope: `{ statusCode, body }`.
///
/// `body` is a JSON document serialised to a string, as serverless platforms
/// expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResponse {
    /// HTTP status code
    pub status_code: u16,
    /// JSON body
    pub body: String,
}

/// Body of a successful acknowledgement.
pub const SUCCESS_BODY: &str = r#"{"status":"success"}"#;

impl FunctionResponse {
    /// The fixed success envelope, returned whether or not state changed.
    #[must_use]
    pub fn success() -> Self {
        Self {
            status_code: 200,
            body: SUCCESS_BODY.to_string(),
        }
    }

    /// A failure envelope for a transport error.
    #[must_use]
    pub fn failure(error: &HandlerError) -> Self {
        let body = serde_json::json!({
            "status": "error",
            "message": error.to_string(),
        });
        Self {
            status_code: 500,
            body: body.to_string(),
        }
    }
}

/// What the transport needs back from one dispatched request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgement {
    /// Action kind as decoded
    pub kind: String,
    /// Whether the state changed
    pub changed: bool,
}

/// Boxed future returned by [`ActionHandler::dispatch`].
pub type DispatchFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Acknowledgement, HandlerError>> + Send + 'a>>;

/// Object-safe entry point for transports.
///
/// Lets the web layer hold an `Arc<dyn ActionHandler>` without naming the
/// reducer type.
pub trait ActionHandler: Send + Sync {
    /// Run one invocation for a raw request body.
    fn dispatch<'a>(&'a self, body: &'a [u8]) -> DispatchFuture<'a>;
}

/// Per-invocation orchestration: read, reduce, publish.
///
/// The handler itself is immutable and may be shared by any number of
/// concurrent invocations.
pub struct EventHandler<R: Reducer> {
    reducer: R,
    environment: R::Environment,
    channel: Arc<dyn Channel>,
    channel_name: String,
    event_name: String,
}

impl<R> EventHandler<R>
where
    R: Reducer,
    R::State: Snapshot,
    R::Action: DecodeAction,
{
    /// Create a handler for one channel.
    #[must_use]
    pub fn new(
        reducer: R,
        environment: R::Environment,
        channel: Arc<dyn Channel>,
        channel_name: impl Into<String>,
    ) -> Self {
        Self {
            reducer,
            environment,
            channel,
            channel_name: channel_name.into(),
            event_name: STATE_UPDATE_EVENT.to_string(),
        }
    }

    /// Use a different snapshot event name.
    #[must_use]
    pub fn with_event_name(mut self, event_name: impl Into<String>) -> Self {
        self.event_name = event_name.into();
        self
    }

    /// The channel this handler reads and publishes.
    #[must_use]
    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    /// The reducer's environment.
    #[must_use]
    pub const fn environment(&self) -> &R::Environment {
        &self.environment
    }

    /// Recover the newest authoritative state.
    ///
    /// Empty history, an untagged newest entry, or an entry that does not
    /// parse (or cannot be repaired) all yield the reducer's initial state.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::ReadFailed`] only when the channel call fails.
    pub async fn fetch_latest(&self) -> Result<LoadedSnapshot<R::State>, HandlerError> {
        let messages = self
            .channel
            .history(&self.channel_name, HistoryQuery::latest())
            .await
            .map_err(HandlerError::ReadFailed)?;

        let loaded = match messages.into_iter().next() {
            None => self.fallback(SnapshotSource::Empty),
            Some(message) if !message.is_named(&self.event_name) => {
                self.fallback(SnapshotSource::Untagged)
            },
            Some(message) => self.decode_snapshot(message.data),
        };

        if loaded.source != SnapshotSource::History {
            ChannelMetrics::record_fallback(loaded.source.label());
            match &loaded.source {
                SnapshotSource::Corrupt(reason) => tracing::warn!(
                    channel = %self.channel_name,
                    %reason,
                    "Newest snapshot unusable, starting from initial state"
                ),
                other => tracing::debug!(
                    channel = %self.channel_name,
                    source = other.label(),
                    "No snapshot in history, starting from initial state"
                ),
            }
        }

        Ok(loaded)
    }

    fn fallback(&self, source: SnapshotSource) -> LoadedSnapshot<R::State> {
        LoadedSnapshot {
            state: self.reducer.initial_state(&self.environment),
            source,
            raw: None,
        }
    }

    fn decode_snapshot(&self, data: serde_json::Value) -> LoadedSnapshot<R::State> {
        let mut state = match R::State::deserialize(&data) {
            Ok(state) => state,
            Err(e) => return self.fallback(SnapshotSource::Corrupt(e.to_string())),
        };
        let repaired = match state.repair() {
            Ok(change) => change.is_changed(),
            Err(e) => return self.fallback(SnapshotSource::Corrupt(e.to_string())),
        };
        if repaired {
            tracing::debug!(
                channel = %self.channel_name,
                "Snapshot repaired, republishing the fixed state"
            );
        }
        LoadedSnapshot {
            state,
            source: SnapshotSource::History,
            raw: (!repaired).then_some(data),
        }
    }

    /// Run one invocation for an already-parsed request.
    ///
    /// `None` stands for a request body that could not be parsed: the state
    /// is still read and republished unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when reading history or publishing fails.
    #[tracing::instrument(
        skip(self, request),
        name = "handle_action",
        fields(channel = %self.channel_name)
    )]
    pub async fn handle(
        &self,
        request: Option<ActionRequest>,
    ) -> Result<Outcome<R::State>, HandlerError> {
        let loaded = self.fetch_latest().await?;
        let LoadedSnapshot {
            mut state,
            source,
            raw,
        } = loaded;

        let (kind, change) = match request {
            Some(request) => {
                let action = R::Action::decode(request);
                let kind = action.kind().to_string();
                let change = self.reducer.reduce(&mut state, action, &self.environment);
                (kind, change)
            },
            None => (MALFORMED_KIND.to_string(), Change::Unchanged),
        };

        // An unchanged snapshot is republished byte-for-byte as it was read,
        // unless repair had to fix it.
        let data = match (change, raw) {
            (Change::Unchanged, Some(raw)) => raw,
            _ => serde_json::to_value(&state).map_err(|e| HandlerError::Encode(e.to_string()))?,
        };

        let message = ChannelMessage::new(self.event_name.clone(), data);
        self.channel
            .publish(&self.channel_name, &message)
            .await
            .map_err(HandlerError::PublishFailed)?;
        ChannelMetrics::record_publish();

        tracing::info!(
            kind = %kind,
            changed = change.is_changed(),
            source = source.label(),
            "Snapshot published"
        );

        Ok(Outcome {
            kind,
            change,
            source,
            state,
        })
    }

    /// Run one invocation for a raw request body.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when reading history or publishing fails. A
    /// malformed body is not an error.
    pub async fn handle_body(&self, body: &[u8]) -> Result<Outcome<R::State>, HandlerError> {
        let started = Instant::now();

        let request = match ActionRequest::parse(body) {
            Ok(request) => Some(request),
            Err(e) => {
                tracing::debug!(error = %e, "Treating malformed request as a no-op");
                None
            },
        };

        match self.handle(request).await {
            Ok(outcome) => {
                HandlerMetrics::record_invocation(
                    &outcome.kind,
                    outcome.change.is_changed(),
                    started.elapsed(),
                );
                Ok(outcome)
            },
            Err(e) => {
                HandlerMetrics::record_failure(e.stage());
                tracing::error!(error = %e, stage = e.stage(), "Invocation failed");
                Err(e)
            },
        }
    }

    /// Run one invocation and wrap the result in the function envelope.
    pub async fn invoke(&self, body: &[u8]) -> FunctionResponse {
        match self.handle_body(body).await {
            Ok(_) => FunctionResponse::success(),
            Err(e) => FunctionResponse::failure(&e),
        }
    }
}

impl<R> ActionHandler for EventHandler<R>
where
    R: Reducer + Send + Sync,
    R::State: Snapshot + Send,
    R::Action: DecodeAction + Send,
    R::Environment: Send + Sync,
{
    fn dispatch<'a>(&'a self, body: &'a [u8]) -> DispatchFuture<'a> {
        Box::pin(async move {
            let outcome = self.handle_body(body).await?;
            Ok(Acknowledgement {
                kind: outcome.kind,
                changed: outcome.change.is_changed(),
            })
        })
    }
}
