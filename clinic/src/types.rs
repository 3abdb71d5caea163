//! Core domain types for the quiz event.
//!
//! [`EventState`] is the single root aggregate. It is published whole on
//! every invocation, so its serialised form is the wire format browser
//! clients render from: camelCase field names, timestamps as epoch
//! milliseconds, `teams` and `finishTimes` as objects, `finishedMembers` as
//! an array.

use crate::questions::QuestionBank;
use chrono::{DateTime, Duration, Utc};
use clinic_core::reducer::Change;
use clinic_core::state::{Snapshot, SnapshotError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Number of rounds in an event.
pub const LAST_ROUND: u32 = 2;

const fn first_round() -> u32 {
    1
}

/// A quiz question. Opaque content; never mutated by the reducer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Short title shown in the question list
    pub title: String,
    /// Full problem statement
    pub content: String,
}

impl Question {
    /// Creates a question
    #[must_use]
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

/// A participant in a team.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    /// Client-chosen user id (the request's `senderId`)
    pub user_id: String,
    /// Display name
    pub user_name: String,
}

impl Member {
    /// Creates a member
    #[must_use]
    pub fn new(user_id: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
        }
    }
}

/// A team and its progress through the current round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    /// Team id; equal to the team's key in [`EventState::teams`]
    pub id: String,
    /// Display name
    pub name: String,
    /// Members in join order, unique by `user_id`
    #[serde(default)]
    pub members: Vec<Member>,
    /// Index of the question the team is working on
    #[serde(default)]
    pub current_question_index: usize,
    /// Members who have finished the current question; always a subset of `members`
    #[serde(default)]
    pub finished_members: BTreeSet<String>,
    /// Round the team is playing
    #[serde(default = "first_round")]
    pub round: u32,
    /// When each member last finished a question
    #[serde(default, with = "millis_map")]
    pub finish_times: BTreeMap<String, DateTime<Utc>>,
}

impl Team {
    /// Creates a round-one team with a single founding member
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, founder: Member) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            members: vec![founder],
            current_question_index: 0,
            finished_members: BTreeSet::new(),
            round: first_round(),
            finish_times: BTreeMap::new(),
        }
    }

    /// Whether `user_id` belongs to the team
    #[must_use]
    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m.user_id == user_id)
    }

    /// Whether every member has finished
    #[must_use]
    pub fn all_finished(&self) -> bool {
        self.members
            .iter()
            .all(|m| self.finished_members.contains(&m.user_id))
    }

    /// Move on to the next question, capped at `question_count`, with nobody
    /// finished yet.
    pub fn advance_question(&mut self, question_count: usize) {
        self.current_question_index = (self.current_question_index + 1).min(question_count);
        self.finished_members.clear();
    }

    /// Clear per-round progress and move to `round`
    pub fn enter_round(&mut self, round: u32) {
        self.round = round;
        self.current_question_index = 0;
        self.finished_members.clear();
        self.finish_times.clear();
    }

    fn repair(&mut self, key: &str, event_round: u32, question_count: impl Fn(u32) -> usize) {
        if self.id != key {
            tracing::debug!(team = %key, id = %self.id, "Team id does not match its key");
            key.clone_into(&mut self.id);
        }

        let mut seen = BTreeSet::new();
        self.members.retain(|m| seen.insert(m.user_id.clone()));

        self.finished_members.retain(|id| seen.contains(id));
        self.finish_times.retain(|id, _| seen.contains(id));

        self.round = self.round.clamp(1, event_round);
        let count = question_count(self.round);
        self.current_question_index = self.current_question_index.min(count);

        if !self.finished_members.is_empty() && self.all_finished() {
            tracing::debug!(team = %key, "Every member already finished, completing the question");
            self.advance_question(count);
        }
    }
}

/// Timer sub-state, derived from the timer fields of [`EventState`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerState {
    /// Never started, or reset
    Stopped,
    /// Counting
    Running,
    /// Started, then paused
    Paused,
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "Stopped"),
            Self::Running => write!(f, "Running"),
            Self::Paused => write!(f, "Paused"),
        }
    }
}

/// The whole shared session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventState {
    /// Set once the organiser starts the event; guards against re-initialisation
    pub is_initialized: bool,
    /// Current round, starting at 1
    pub round: u32,
    /// Whether the timer is counting
    #[serde(default)]
    pub timer_running: bool,
    /// When the timer was started, shifted forward by any pauses
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub start_time: Option<DateTime<Utc>>,
    /// When the timer was paused
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub pause_time: Option<DateTime<Utc>>,
    /// Questions for round one
    #[serde(default)]
    pub round1_questions: Vec<Question>,
    /// Questions for round two
    #[serde(default)]
    pub round2_questions: Vec<Question>,
    /// Teams by id
    pub teams: BTreeMap<String, Team>,
}

impl EventState {
    /// The default state: not initialised, round one, timer stopped, no teams,
    /// questions taken from the bank.
    #[must_use]
    pub fn new(questions: &QuestionBank) -> Self {
        Self {
            is_initialized: false,
            round: first_round(),
            timer_running: false,
            start_time: None,
            pause_time: None,
            round1_questions: questions.round1().to_vec(),
            round2_questions: questions.round2().to_vec(),
            teams: BTreeMap::new(),
        }
    }

    /// Questions for a round; rounds without a list have none.
    #[must_use]
    pub fn questions_for_round(&self, round: u32) -> &[Question] {
        match round {
            1 => &self.round1_questions,
            2 => &self.round2_questions,
            _ => &[],
        }
    }

    /// Number of questions in a round
    #[must_use]
    pub fn question_count(&self, round: u32) -> usize {
        self.questions_for_round(round).len()
    }

    /// Current timer sub-state
    #[must_use]
    pub const fn timer_state(&self) -> TimerState {
        if self.timer_running {
            TimerState::Running
        } else if self.start_time.is_some() && self.pause_time.is_some() {
            TimerState::Paused
        } else {
            TimerState::Stopped
        }
    }

    /// Elapsed timer time as clients display it: up to `now` while running,
    /// up to `pauseTime` while paused.
    #[must_use]
    pub fn elapsed(&self, now: DateTime<Utc>) -> Option<Duration> {
        let start = self.start_time?;
        let end = if self.timer_running { now } else { self.pause_time? };
        Some(end - start)
    }

    /// Stop the timer and forget its anchors
    pub fn reset_timer(&mut self) {
        self.timer_running = false;
        self.start_time = None;
        self.pause_time = None;
    }

    /// Cap every team's question index at its round's question count
    pub fn clamp_question_indices(&mut self) {
        let round1 = self.round1_questions.len();
        let round2 = self.round2_questions.len();
        for team in self.teams.values_mut() {
            let count = match team.round {
                1 => round1,
                2 => round2,
                _ => 0,
            };
            team.current_question_index = team.current_question_index.min(count);
        }
    }
}

impl Snapshot for EventState {
    fn repair(&mut self) -> Result<Change, SnapshotError> {
        let before = self.clone();
        self.round = self.round.clamp(1, LAST_ROUND);

        match (self.timer_running, self.start_time, self.pause_time) {
            (true, None, _) => {
                tracing::debug!("Running timer without a start time, stopping it");
                self.reset_timer();
            },
            (true, Some(_), _) => self.pause_time = None,
            (false, Some(start), Some(paused_at)) if paused_at < start => {
                tracing::debug!(%start, %paused_at, "Timer paused before it started, resetting it");
                self.reset_timer();
            },
            _ => {},
        }

        let round = self.round;
        let round1 = self.round1_questions.len();
        let round2 = self.round2_questions.len();
        let count = move |r: u32| match r {
            1 => round1,
            2 => round2,
            _ => 0,
        };

        for (key, team) in &mut self.teams {
            team.repair(key, round, count);
        }

        Ok(Change::from(*self != before))
    }
}

/// `finishTimes` as an object of epoch milliseconds.
mod millis_map {
    use chrono::{DateTime, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S>(map: &BTreeMap<String, DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(map.iter().map(|(id, at)| (id, at.timestamp_millis())))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<String, DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        BTreeMap::<String, i64>::deserialize(deserializer)?
            .into_iter()
            .map(|(id, millis)| {
                DateTime::from_timestamp_millis(millis)
                    .map(|at| (id, at))
                    .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {millis}")))
            })
            .collect()
    }
}
