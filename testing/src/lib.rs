//! # Code Clinic Testing
//!
//! Testing utilities and helpers for the Code Clinic event handler.
//!
//! This crate provides:
//! - Deterministic clocks ([`FixedClock`], [`ManualClock`])
//! - [`ReducerTest`], a Given-When-Then harness for reducers
//! - [`InMemoryChannel`], a channel with retained history, live subscribers
//!   and failure injection
//!
//! ## Example
//!
//! ```ignore
//! use clinic_testing::{InMemoryChannel, test_clock};
//! use clinic_runtime::EventHandler;
//! use std::sync::Arc;
//!
//! #[tokio::test]
//! async fn republishes_on_request_state() {
//!     let channel = Arc::new(InMemoryChannel::new());
//!     let handler = EventHandler::new(QuizReducer::new(), env, channel.clone(), "quiz");
//!
//!     handler.invoke(br#"{"type":"requestState"}"#).await;
//!
//!     assert_eq!(channel.history_len("quiz"), 1);
//! }
//! ```

use chrono::{DateTime, Duration, Utc};
use clinic_core::environment::Clock;

pub mod channel;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Duration, Utc};
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use clinic_testing::mocks::FixedClock;
    /// use clinic_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to.
    ///
    /// Stored as epoch milliseconds, which is the precision snapshots keep.
    ///
    /// ```
    /// use clinic_testing::mocks::ManualClock;
    /// use clinic_core::environment::Clock;
    /// use chrono::Duration;
    ///
    /// let clock = ManualClock::starting_at_test_epoch();
    /// let before = clock.now();
    /// clock.advance(Duration::seconds(30));
    /// assert_eq!(clock.now() - before, Duration::seconds(30));
    /// ```
    #[derive(Debug)]
    pub struct ManualClock {
        millis: AtomicI64,
    }

    impl ManualClock {
        /// Create a clock reading `time`.
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                millis: AtomicI64::new(time.timestamp_millis()),
            }
        }

        /// Create a clock reading the same instant as [`test_clock`].
        #[must_use]
        pub fn starting_at_test_epoch() -> Self {
            Self::new(test_clock().now())
        }

        /// Move the clock forward (or backward, for negative durations).
        pub fn advance(&self, by: Duration) {
            self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
        }

        /// Jump to an absolute time.
        pub fn set(&self, time: DateTime<Utc>) {
            self.millis.store(time.timestamp_millis(), Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

// Re-export commonly used items
pub use channel::InMemoryChannel;
pub use mocks::{FixedClock, ManualClock, test_clock};
pub use reducer_test::{ReducerTest, assertions};
