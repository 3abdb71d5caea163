//! Channel abstraction: the pub/sub topic that is both broadcast medium and log.
//!
//! This module provides the [`Channel`] trait consumed by the event handler.
//! A channel is the only durable store in the system: every published message
//! is delivered to the current subscribers and appended to the channel's
//! retained history, and the newest history entry is the authoritative state.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │   Request   │
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────────┐
//! │ 1. Read newest  │
//! │    snapshot     │◄─── history(limit = 1, backwards)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   2. Reducer    │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  3. Publish     │
//! │    snapshot     │◄─── at-least-once fan-out + history append
//! └────────┬────────┘
//!          │
//!     ┌────┴────┐
//!     ▼         ▼
//! ┌───────┐ ┌───────┐
//! │Client │ │Client │
//! └───────┘ └───────┘
//! ```
//!
//! # Key Principles
//!
//! - **History is the source of truth**: there is no other database
//! - **Last writer wins**: publishes are totally ordered by the channel and
//!   there is no compare-and-swap
//! - **Empty history is normal**: it is the cold-start condition, not an error
//!
//! # Implementations
//!
//! - `InMemoryChannel` (`clinic-testing`) - For tests
//! - `AblyChannel` (`clinic-ably`) - Ably REST API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur while talking to the channel service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The channel service could not be reached
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The configured credential was rejected or is malformed
    #[error("Credential rejected: {0}")]
    Unauthorized(String),

    /// Reading history failed
    #[error("History request failed for channel '{channel}': {reason}")]
    HistoryFailed {
        /// The channel that was queried
        channel: String,
        /// The reason for failure
        reason: String,
    },

    /// Publishing failed; the history did not gain the message
    #[error("Publish failed for channel '{channel}': {reason}")]
    PublishFailed {
        /// The channel that failed
        channel: String,
        /// The reason for failure
        reason: String,
    },

    /// The service answered with something that is not a message list
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Direction of a history query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryDirection {
    /// Newest first
    #[default]
    Backwards,
    /// Oldest first
    Forwards,
}

impl HistoryDirection {
    /// The query-string form used by channel services.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Backwards => "backwards",
            Self::Forwards => "forwards",
        }
    }
}

/// Bounds for a history query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryQuery {
    /// Maximum number of messages to return
    pub limit: usize,
    /// Ordering of the returned messages
    pub direction: HistoryDirection,
}

impl HistoryQuery {
    /// The newest message only.
    #[must_use]
    pub const fn latest() -> Self {
        Self {
            limit: 1,
            direction: HistoryDirection::Backwards,
        }
    }
}

/// A message as published to, or read back from, a channel.
///
/// `name` is the event kind; history entries published by other tools may
/// carry no name at all, which readers treat as "not a snapshot".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Service-assigned id (absent before publish)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Event name, e.g. `stateUpdate`
    #[serde(default)]
    pub name: Option<String>,

    /// JSON payload
    #[serde(default)]
    pub data: serde_json::Value,

    /// Service-assigned timestamp (absent before publish)
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChannelMessage {
    /// Create a named message ready to publish.
    #[must_use]
    pub fn new(name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
            data,
            timestamp: None,
        }
    }

    /// Whether this message carries the given event name.
    #[must_use]
    pub fn is_named(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name)
    }
}

impl fmt::Display for ChannelMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ChannelMessage {{ name: {}, id: {} }}",
            self.name.as_deref().unwrap_or("<unnamed>"),
            self.id.as_deref().unwrap_or("<unpublished>")
        )
    }
}

/// Boxed future returned by [`Channel`] methods.
pub type ChannelFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ChannelError>> + Send + 'a>>;

/// Trait for channel service implementations.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`: one instance is shared by every
/// concurrent invocation. Implementations hold no session state of their own.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn`
/// so the handler can hold an `Arc<dyn Channel>`.
pub trait Channel: Send + Sync {
    /// Read messages from the channel's retained history.
    ///
    /// An empty history yields `Ok(vec![])`.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] when the service is unreachable, rejects the
    /// credential, or answers with something unreadable.
    fn history<'a>(
        &'a self,
        channel: &'a str,
        query: HistoryQuery,
    ) -> ChannelFuture<'a, Vec<ChannelMessage>>;

    /// Publish a message: fan out to subscribers and append to history.
    ///
    /// Publishing is atomic from the caller's point of view: on error the
    /// history did not gain the message.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::PublishFailed`] (or a connection/credential
    /// error) when the message was not accepted.
    fn publish<'a>(&'a self, channel: &'a str, message: &'a ChannelMessage)
    -> ChannelFuture<'a, ()>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn latest_query_is_one_newest_first() {
        let query = HistoryQuery::latest();
        assert_eq!(query.limit, 1);
        assert_eq!(query.direction.as_str(), "backwards");
    }

    #[test]
    fn message_name_matching() {
        let message = ChannelMessage::new("stateUpdate", json!({}));
        assert!(message.is_named("stateUpdate"));
        assert!(!message.is_named("chat"));

        let unnamed = ChannelMessage {
            name: None,
            ..message
        };
        assert!(!unnamed.is_named("stateUpdate"));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn message_deserializes_service_fields() {
        let message: ChannelMessage = serde_json::from_value(json!({
            "id": "abc:0",
            "name": "stateUpdate",
            "data": { "round": 1 },
            "timestamp": 1_735_689_600_000_i64
        }))
        .unwrap();

        assert_eq!(message.id.as_deref(), Some("abc:0"));
        assert_eq!(message.data, json!({ "round": 1 }));
        assert_eq!(message.timestamp.unwrap().timestamp(), 1_735_689_600);
    }

    #[test]
    fn message_display() {
        let message = ChannelMessage::new("stateUpdate", json!(null));
        let display = format!("{message}");
        assert!(display.contains("stateUpdate"));
        assert!(display.contains("<unpublished>"));
    }
}
