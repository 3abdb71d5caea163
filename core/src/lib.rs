//! # Code Clinic Core
//!
//! Core traits and types for the Code Clinic event handler.
//!
//! The handler keeps no memory between invocations. Every request rebuilds the
//! current state from the newest snapshot on a pub/sub channel, reduces the
//! incoming action against it, and republishes the result. This crate defines
//! the pieces of that loop that do not depend on a particular domain or
//! transport.
//!
//! ## Core Concepts
//!
//! - **State**: A complete snapshot of the shared session
//! - **Action**: A decoded client request (see [`request`])
//! - **Reducer**: Pure function `(State, Action, Environment) → (State, Change)`
//! - **Environment**: Injected dependencies (clock, static configuration)
//! - **Channel**: History reader and publisher (see [`channel`])
//!
//! ## Example
//!
//! ```ignore
//! use clinic_core::reducer::{Change, Reducer};
//!
//! impl Reducer for ScoreReducer {
//!     type State = ScoreState;
//!     type Action = ScoreAction;
//!     type Environment = ScoreEnvironment;
//!
//!     fn initial_state(&self, _env: &ScoreEnvironment) -> ScoreState {
//!         ScoreState::default()
//!     }
//!
//!     fn reduce(
//!         &self,
//!         state: &mut ScoreState,
//!         action: ScoreAction,
//!         env: &ScoreEnvironment,
//!     ) -> Change {
//!         match action {
//!             ScoreAction::Add { points } => {
//!                 state.total += points;
//!                 Change::Changed
//!             }
//!             ScoreAction::Unrecognized { .. } => Change::Unchanged,
//!         }
//!     }
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

pub mod channel;
pub mod request;

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Change)`.
///
/// They contain all business logic and are deterministic and testable. The
/// returned [`Change`](reducer::Change) tells the caller whether the state
/// moved; it never decides whether the state is published.
pub mod reducer {
    /// Whether a reduction modified the state.
    #[must_use]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Change {
        /// The state is exactly what it was before the action
        Unchanged,
        /// The action produced a new state
        Changed,
    }

    impl Change {
        /// Returns `true` for [`Change::Changed`].
        #[must_use]
        pub const fn is_changed(self) -> bool {
            matches!(self, Self::Changed)
        }

        /// Combine two outcomes: changed if either changed.
        pub const fn or(self, other: Self) -> Self {
            match (self, other) {
                (Self::Unchanged, Self::Unchanged) => Self::Unchanged,
                _ => Self::Changed,
            }
        }
    }

    impl From<bool> for Change {
        fn from(changed: bool) -> Self {
            if changed { Self::Changed } else { Self::Unchanged }
        }
    }

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    ///
    /// Implementations must be total: every action, including ones that fail
    /// validation, yields a `Change` rather than an error.
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Build the state used when no usable snapshot exists.
        ///
        /// Must be pure: the same environment always yields the same state.
        fn initial_state(&self, env: &Self::Environment) -> Self::State;

        /// Reduce an action into a state change
        ///
        /// This is a pure function that:
        /// 1. Validates the action against the current state
        /// 2. Updates state in place
        /// 3. Reports whether anything changed
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Change;
    }
}

/// State module - snapshot shape validation
///
/// A snapshot read back from history was written by some earlier invocation,
/// possibly by an older or buggy client. Before it is reduced it gets a chance
/// to restore its invariants.
pub mod state {
    use crate::reducer::Change;
    use serde::{Serialize, de::DeserializeOwned};
    use thiserror::Error;

    /// A snapshot that cannot be used and must be replaced by the initial state.
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    #[error("Unusable snapshot: {0}")]
    pub struct SnapshotError(pub String);

    /// State that is persisted whole as a channel snapshot.
    pub trait Snapshot: Serialize + DeserializeOwned {
        /// Restore invariants on a snapshot read from history.
        ///
        /// Reports [`Change::Changed`] when anything had to be fixed, so the
        /// repaired snapshot is published instead of the one that was read.
        ///
        /// # Errors
        ///
        /// Returns [`SnapshotError`] when the snapshot is beyond repair; the
        /// caller then falls back to the reducer's initial state.
        fn repair(&mut self) -> Result<Change, SnapshotError> {
            Ok(Change::Unchanged)
        }
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via the Environment parameter.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use clinic_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let before = clock.now();
    /// assert!(clock.now() >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
