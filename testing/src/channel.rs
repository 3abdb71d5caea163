//! In-memory channel for fast, deterministic tests.
//!
//! [`InMemoryChannel`] keeps every published message as retained history and
//! fans it out to live subscribers, which lets tests observe exactly what a
//! browser client would receive. Outages can be injected to exercise the
//! handler's transport-error path.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Lock poisoning only follows a panicking test

use chrono::Utc;
use clinic_core::channel::{
    Channel, ChannelError, ChannelFuture, ChannelMessage, HistoryDirection, HistoryQuery,
};
use futures::Stream;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

/// Stream of messages delivered to a subscriber.
pub type MessageStream = Pin<Box<dyn Stream<Item = ChannelMessage> + Send>>;

const SUBSCRIBER_BUFFER: usize = 256;

/// In-memory [`Channel`] with retained history.
///
/// # Example
///
/// ```
/// use clinic_testing::InMemoryChannel;
/// use clinic_core::channel::{Channel, ChannelMessage, HistoryQuery};
/// use serde_json::json;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let channel = InMemoryChannel::new();
///
/// channel.publish("quiz", &ChannelMessage::new("stateUpdate", json!({ "round": 1 }))).await?;
///
/// let latest = channel.history("quiz", HistoryQuery::latest()).await?;
/// assert_eq!(latest[0].data, json!({ "round": 1 }));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryChannel {
    history: Arc<RwLock<HashMap<String, Vec<ChannelMessage>>>>,
    sender: broadcast::Sender<(String, ChannelMessage)>,
    sequence: Arc<AtomicU64>,
    unavailable: Arc<AtomicBool>,
    reject_publishes: Arc<AtomicBool>,
}

impl InMemoryChannel {
    /// Create a channel service with empty history everywhere.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(SUBSCRIBER_BUFFER);
        Self {
            history: Arc::new(RwLock::new(HashMap::new())),
            sender,
            sequence: Arc::new(AtomicU64::new(0)),
            unavailable: Arc::new(AtomicBool::new(false)),
            reject_publishes: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Append a message to history without notifying subscribers.
    ///
    /// Use this to set up arbitrary prior history, including entries another
    /// tool might have published (unnamed, malformed, ...).
    pub fn seed(&self, channel: &str, message: ChannelMessage) {
        let message = self.stamp(channel, message);
        self.history
            .write()
            .unwrap()
            .entry(channel.to_string())
            .or_default()
            .push(message);
    }

    /// Make every call fail as if the service were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make publishes fail while history reads keep working.
    pub fn reject_publishes(&self, reject: bool) {
        self.reject_publishes.store(reject, Ordering::SeqCst);
    }

    /// All retained messages on a channel, oldest first.
    #[must_use]
    pub fn messages(&self, channel: &str) -> Vec<ChannelMessage> {
        self.history
            .read()
            .unwrap()
            .get(channel)
            .cloned()
            .unwrap_or_default()
    }

    /// The newest retained message on a channel.
    #[must_use]
    pub fn latest(&self, channel: &str) -> Option<ChannelMessage> {
        self.history
            .read()
            .unwrap()
            .get(channel)
            .and_then(|messages| messages.last().cloned())
    }

    /// Number of retained messages on a channel.
    #[must_use]
    pub fn history_len(&self, channel: &str) -> usize {
        self.history
            .read()
            .unwrap()
            .get(channel)
            .map_or(0, Vec::len)
    }

    /// Subscribe to messages published on `channel` from now on.
    #[must_use]
    pub fn subscribe(&self, channel: &str) -> MessageStream {
        let mut receiver = self.sender.subscribe();
        let wanted = channel.to_string();

        Box::pin(async_stream::stream! {
            loop {
                match receiver.recv().await {
                    Ok((name, message)) if name == wanted => yield message,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {},
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn stamp(&self, channel: &str, mut message: ChannelMessage) -> ChannelMessage {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        message.id = Some(format!("{channel}:{seq}"));
        message.timestamp = Some(Utc::now());
        message
    }

    fn check_available(&self) -> Result<(), ChannelError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ChannelError::ConnectionFailed(
                "in-memory channel marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for InMemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl Channel for InMemoryChannel {
    fn history<'a>(
        &'a self,
        channel: &'a str,
        query: HistoryQuery,
    ) -> ChannelFuture<'a, Vec<ChannelMessage>> {
        Box::pin(async move {
            self.check_available()?;

            let messages = self.messages(channel);
            let selected = match query.direction {
                HistoryDirection::Backwards => {
                    messages.into_iter().rev().take(query.limit).collect()
                },
                HistoryDirection::Forwards => messages.into_iter().take(query.limit).collect(),
            };
            Ok(selected)
        })
    }

    fn publish<'a>(
        &'a self,
        channel: &'a str,
        message: &'a ChannelMessage,
    ) -> ChannelFuture<'a, ()> {
        Box::pin(async move {
            self.check_available()?;
            if self.reject_publishes.load(Ordering::SeqCst) {
                return Err(ChannelError::PublishFailed {
                    channel: channel.to_string(),
                    reason: "in-memory channel rejecting publishes".to_string(),
                });
            }

            let message = self.stamp(channel, message.clone());
            self.history
                .write()
                .unwrap()
                .entry(channel.to_string())
                .or_default()
                .push(message.clone());

            // No subscribers is fine
            let _ = self.sender.send((channel.to_string(), message));
            Ok(())
        })
    }
}
