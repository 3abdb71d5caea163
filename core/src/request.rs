//! Inbound request envelope and action decoding.
//!
//! Clients send `{ "type": ..., "payload": {...}, "senderId": ... }`. The
//! envelope is parsed here; turning it into a domain action is the job of
//! [`DecodeAction`], which must never fail: a payload that does not validate
//! becomes a no-op action so the handler can still republish the state.
//!
//! # Example
//!
//! ```
//! use clinic_core::request::ActionRequest;
//!
//! let request = ActionRequest::parse(br#"{"type":"requestState","senderId":"u1"}"#).unwrap();
//! assert_eq!(request.kind, "requestState");
//! assert_eq!(request.sender_id.as_deref(), Some("u1"));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error parsing a request body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// The body is not JSON or lacks a `type`
    #[error("Malformed request body: {0}")]
    Malformed(String),
}

/// A decoded request envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    /// Action kind, e.g. `joinOrCreateTeam`
    #[serde(rename = "type")]
    pub kind: String,

    /// Kind-specific payload (`null` when absent)
    #[serde(default)]
    pub payload: serde_json::Value,

    /// Id of the client that sent the action
    #[serde(default)]
    pub sender_id: Option<String>,
}

impl ActionRequest {
    /// Create a request by hand (tests, embedding).
    #[must_use]
    pub fn new(kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
            sender_id: None,
        }
    }

    /// Set the sender.
    #[must_use]
    pub fn from_sender(mut self, sender_id: impl Into<String>) -> Self {
        self.sender_id = Some(sender_id.into());
        self
    }

    /// Parse a raw request body.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Malformed`] when the body is not a JSON object
    /// with a string `type`.
    pub fn parse(body: &[u8]) -> Result<Self, RequestError> {
        serde_json::from_slice(body).map_err(|e| RequestError::Malformed(e.to_string()))
    }

    /// The sender id, if present and non-empty.
    #[must_use]
    pub fn sender(&self) -> Option<&str> {
        self.sender_id.as_deref().filter(|s| !s.is_empty())
    }
}

impl fmt::Display for ActionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ActionRequest {{ type: {}, sender: {} }}",
            self.kind,
            self.sender().unwrap_or("<anonymous>")
        )
    }
}

/// Total conversion from a request envelope to a domain action.
///
/// Implementations map unknown kinds and invalid payloads to no-op variants
/// instead of failing.
pub trait DecodeAction: Sized {
    /// Decode the envelope.
    fn decode(request: ActionRequest) -> Self;

    /// A short label for logs and metrics.
    fn kind(&self) -> &str;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_full_envelope() {
        let body = br#"{"type":"joinOrCreateTeam","payload":{"teamId":"alpha"},"senderId":"u1"}"#;
        let request = ActionRequest::parse(body).unwrap();

        assert_eq!(request.kind, "joinOrCreateTeam");
        assert_eq!(request.payload, json!({ "teamId": "alpha" }));
        assert_eq!(request.sender(), Some("u1"));
    }

    #[test]
    fn parse_without_payload_defaults_to_null() {
        let request = ActionRequest::parse(br#"{"type":"requestState"}"#).unwrap();
        assert_eq!(request.payload, json!(null));
        assert_eq!(request.sender(), None);
    }

    #[test]
    fn parse_rejects_missing_type() {
        let err = ActionRequest::parse(br#"{"payload":{}}"#).unwrap_err();
        assert!(matches!(err, RequestError::Malformed(_)));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(ActionRequest::parse(b"not json").is_err());
    }

    #[test]
    fn empty_sender_is_anonymous() {
        let request = ActionRequest::new("finishQuestion", json!({})).from_sender("");
        assert_eq!(request.sender(), None);
        assert!(format!("{request}").contains("<anonymous>"));
    }
}
