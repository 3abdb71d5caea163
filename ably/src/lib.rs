//! Ably REST channel implementation for Code Clinic.
//!
//! This crate provides [`AblyChannel`], an implementation of the
//! [`Channel`] trait from `clinic-core` over the Ably REST API. It uses the
//! two endpoints the event handler needs:
//!
//! - `GET  /channels/{channel}/messages?limit=N&direction=backwards` (history)
//! - `POST /channels/{channel}/messages` (publish)
//!
//! # Delivery Semantics
//!
//! Ably fans a published message out to every attached realtime client and
//! appends it to the channel's persisted history. Delivery to clients is
//! at-least-once; history is bounded by the app's retention window. The
//! channel is the only durable store the handler has.
//!
//! # Payload Encoding
//!
//! Snapshots are published as JSON strings tagged `encoding: "json"`. On read,
//! `json` encoded payloads are decoded back into JSON; payloads with any other
//! encoding are surfaced as `null`, which the handler treats like a corrupt
//! snapshot.
//!
//! # Example
//!
//! ```no_run
//! use clinic_ably::AblyChannel;
//! use clinic_core::channel::{Channel, ChannelMessage, HistoryQuery};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let channel = AblyChannel::new("app.key:secret")?;
//!
//! channel
//!     .publish("code-clinic-event", &ChannelMessage::new("stateUpdate", json!({ "round": 1 })))
//!     .await?;
//!
//! let latest = channel.history("code-clinic-event", HistoryQuery::latest()).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use clinic_core::channel::{Channel, ChannelError, ChannelFuture, ChannelMessage, HistoryQuery};
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;

mod key;
mod wire;

pub use key::{AblyKey, KeyError};

/// Default Ably REST endpoint.
pub const DEFAULT_REST_URL: &str = "https://rest.ably.io";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Ably REST channel client.
///
/// Cheap to clone; clones share the underlying connection pool.
///
/// # Example
///
/// ```no_run
/// use clinic_ably::AblyChannel;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// // Basic configuration
/// let channel = AblyChannel::new("app.key:secret")?;
///
/// // Custom configuration
/// let channel = AblyChannel::builder()
///     .api_key("app.key:secret")
///     .rest_url("https://eu-rest.ably.io")
///     .timeout(Duration::from_secs(5))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct AblyChannel {
    client: Client,
    key: AblyKey,
    rest_url: Url,
}

impl AblyChannel {
    /// Create a client for the default endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Unauthorized`] if the key is malformed.
    pub fn new(api_key: &str) -> Result<Self, ChannelError> {
        Self::builder().api_key(api_key).build()
    }

    /// Create a new builder for configuring the client.
    #[must_use]
    pub fn builder() -> AblyChannelBuilder {
        AblyChannelBuilder::default()
    }

    /// The REST endpoint in use.
    #[must_use]
    pub const fn rest_url(&self) -> &Url {
        &self.rest_url
    }

    /// The public name of the key in use.
    #[must_use]
    pub fn key_name(&self) -> &str {
        self.key.name()
    }

    fn messages_url(&self, channel: &str) -> Result<Url, ChannelError> {
        let mut url = self.rest_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                ChannelError::ConnectionFailed(format!("Invalid REST URL: {}", self.rest_url))
            })?
            .pop_if_empty()
            .push("channels")
            .push(channel)
            .push("messages");
        Ok(url)
    }

    async fn fetch_history(
        &self,
        channel: &str,
        query: HistoryQuery,
    ) -> Result<Vec<ChannelMessage>, ChannelError> {
        let url = self.messages_url(channel)?;
        let limit = query.limit.to_string();

        let response = self
            .client
            .get(url)
            .basic_auth(self.key.name(), Some(self.key.secret()))
            .query(&[("limit", limit.as_str()), ("direction", query.direction.as_str())])
            .send()
            .await
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let messages = response
                    .json::<Vec<wire::RestMessage>>()
                    .await
                    .map_err(|e| ChannelError::InvalidResponse(e.to_string()))?;

                tracing::debug!(channel, count = messages.len(), "Fetched channel history");
                Ok(messages.into_iter().map(wire::RestMessage::into_message).collect())
            },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(ChannelError::Unauthorized(error_body(response).await))
            },
            status => Err(ChannelError::HistoryFailed {
                channel: channel.to_string(),
                reason: format!("status {}: {}", status.as_u16(), error_body(response).await),
            }),
        }
    }

    async fn send_message(
        &self,
        channel: &str,
        message: &ChannelMessage,
    ) -> Result<(), ChannelError> {
        let url = self.messages_url(channel)?;
        let body = wire::RestMessage::encode(message).map_err(|e| ChannelError::PublishFailed {
            channel: channel.to_string(),
            reason: e.to_string(),
        })?;

        let response = self
            .client
            .post(url)
            .basic_auth(self.key.name(), Some(self.key.secret()))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(channel, name = ?message.name, "Published message");
            return Ok(());
        }

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(ChannelError::Unauthorized(error_body(response).await))
            },
            _ => Err(ChannelError::PublishFailed {
                channel: channel.to_string(),
                reason: format!("status {}: {}", status.as_u16(), error_body(response).await),
            }),
        }
    }
}

async fn error_body(response: reqwest::Response) -> String {
    response.text().await.unwrap_or_default()
}

impl Channel for AblyChannel {
    fn history<'a>(
        &'a self,
        channel: &'a str,
        query: HistoryQuery,
    ) -> ChannelFuture<'a, Vec<ChannelMessage>> {
        Box::pin(self.fetch_history(channel, query))
    }

    fn publish<'a>(
        &'a self,
        channel: &'a str,
        message: &'a ChannelMessage,
    ) -> ChannelFuture<'a, ()> {
        Box::pin(self.send_message(channel, message))
    }
}

/// Builder for configuring an [`AblyChannel`].
#[derive(Default)]
pub struct AblyChannelBuilder {
    api_key: Option<String>,
    key: Option<AblyKey>,
    rest_url: Option<String>,
    timeout: Option<Duration>,
}

impl AblyChannelBuilder {
    /// Set the API key (`<app>.<key>:<secret>`).
    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Use an already parsed key. Takes precedence over [`api_key`](Self::api_key).
    #[must_use]
    pub fn key(mut self, key: AblyKey) -> Self {
        self.key = Some(key);
        self
    }

    /// Set the REST endpoint.
    ///
    /// Default: `https://rest.ably.io`
    #[must_use]
    pub fn rest_url(mut self, rest_url: impl Into<String>) -> Self {
        self.rest_url = Some(rest_url.into());
        self
    }

    /// Set the per-request timeout.
    ///
    /// Default: 10 seconds
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the [`AblyChannel`].
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Unauthorized`] if the key is missing or
    /// malformed, and [`ChannelError::ConnectionFailed`] if the endpoint is
    /// not a valid base URL or the HTTP client cannot be created.
    pub fn build(self) -> Result<AblyChannel, ChannelError> {
        let key = match self.key {
            Some(key) => key,
            None => self
                .api_key
                .as_deref()
                .unwrap_or_default()
                .parse()
                .map_err(|e: KeyError| ChannelError::Unauthorized(e.to_string()))?,
        };

        let raw_url = self.rest_url.as_deref().unwrap_or(DEFAULT_REST_URL);
        let rest_url = Url::parse(raw_url)
            .map_err(|e| ChannelError::ConnectionFailed(format!("Invalid REST URL {raw_url}: {e}")))?;
        if rest_url.cannot_be_a_base() {
            return Err(ChannelError::ConnectionFailed(format!(
                "Invalid REST URL {raw_url}: not a base URL"
            )));
        }

        let client = Client::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()
            .map_err(|e| ChannelError::ConnectionFailed(format!("Failed to create HTTP client: {e}")))?;

        tracing::info!(
            rest_url = %rest_url,
            key_name = %key.name(),
            "Ably channel client created"
        );

        Ok(AblyChannel {
            client,
            key,
            rest_url,
        })
    }
}
