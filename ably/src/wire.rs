//! Ably REST message wire format.

use chrono::{DateTime, Utc};
use clinic_core::channel::ChannelMessage;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const JSON_ENCODING: &str = "json";

/// A message as the REST API sends and receives it.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct RestMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub data: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,

    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<DateTime<Utc>>,
}

impl RestMessage {
    /// Encode an outgoing message; the payload travels as a JSON string.
    pub fn encode(message: &ChannelMessage) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: None,
            name: message.name.clone(),
            data: Value::String(serde_json::to_string(&message.data)?),
            encoding: Some(JSON_ENCODING.to_string()),
            timestamp: None,
        })
    }

    /// Decode a history entry, unwrapping `json` encoded payloads.
    pub fn into_message(self) -> ChannelMessage {
        let data = match (self.encoding.as_deref(), self.data) {
            (None, data) => data,
            (Some(JSON_ENCODING), Value::String(raw)) => {
                serde_json::from_str(&raw).unwrap_or_else(|e| {
                    tracing::warn!(id = ?self.id, error = %e, "Undecodable json payload");
                    Value::Null
                })
            },
            (Some(JSON_ENCODING), data) => data,
            (Some(encoding), _) => {
                tracing::warn!(id = ?self.id, encoding, "Unsupported payload encoding");
                Value::Null
            },
        };

        ChannelMessage {
            id: self.id,
            name: self.name,
            data,
            timestamp: self.timestamp,
        }
    }
}
