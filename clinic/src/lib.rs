//! # Code Clinic
//!
//! Shared state for a live team quiz, kept entirely in a pub/sub channel.
//!
//! The newest `stateUpdate` message in the channel's history *is* the event.
//! Each request to the event handler reads it, applies one [`QuizAction`]
//! through the pure [`QuizReducer`], and publishes the result back so every
//! subscribed client re-renders. The server holds nothing between requests.
//!
//! ## Modules
//!
//! - [`types`]: the snapshot aggregate and its wire format
//! - [`actions`]: action decoding from request envelopes
//! - [`reducer`]: the event rules
//! - [`questions`]: the default question bank
//! - [`config`]: environment configuration for the server binary

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod actions;
pub mod config;
pub mod questions;
pub mod reducer;
pub mod types;

pub use actions::{QuizAction, TimerCommand};
pub use config::{Config, ConfigError};
pub use questions::{QuestionBank, QuestionBankError};
pub use reducer::{QuizEnvironment, QuizReducer};
pub use types::{EventState, LAST_ROUND, Member, Question, Team, TimerState};

use clinic_core::channel::Channel;
use clinic_runtime::EventHandler;
use std::sync::Arc;

/// Event handler wired to the quiz reducer.
pub type QuizHandler = EventHandler<QuizReducer>;

/// Build a quiz event handler over `channel`.
#[must_use]
pub fn event_handler(
    environment: QuizEnvironment,
    channel: Arc<dyn Channel>,
    channel_name: impl Into<String>,
) -> QuizHandler {
    EventHandler::new(QuizReducer::new(), environment, channel, channel_name)
}
