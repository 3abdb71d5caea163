//! Quiz reducer: the event's state machine.
//!
//! The reducer is total. Every action, including ones that failed
//! validation at decode time, produces a [`Change`]; none produces an error.
//! It reads the time only through the injected [`Clock`] and the default
//! state only from the injected [`QuestionBank`], so the same snapshot and
//! action always give the same result.

use crate::actions::{QuizAction, TimerCommand};
use crate::questions::QuestionBank;
use crate::types::{EventState, LAST_ROUND, Member, Question, Team};
use chrono::{DateTime, Utc};
use clinic_core::environment::Clock;
use clinic_core::reducer::{Change, Reducer};
use std::sync::Arc;

/// Environment for the quiz reducer
#[derive(Clone)]
pub struct QuizEnvironment {
    /// Clock for timer anchors and finish times
    pub clock: Arc<dyn Clock>,
    /// Question lists for the default state
    pub questions: Arc<QuestionBank>,
}

impl QuizEnvironment {
    /// Creates a new quiz environment
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, questions: Arc<QuestionBank>) -> Self {
        Self { clock, questions }
    }
}

/// Reducer implementing the quiz event rules
#[derive(Clone, Debug, Default)]
pub struct QuizReducer;

impl QuizReducer {
    /// Creates a new quiz reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn initialize(state: &mut EventState, questions: &QuestionBank) -> Change {
        if state.is_initialized {
            return Change::Unchanged;
        }
        *state = EventState::new(questions);
        state.is_initialized = true;
        Change::Changed
    }

    fn join_or_create_team(
        state: &mut EventState,
        team_id: String,
        team_name: Option<String>,
        member: Member,
    ) -> Change {
        if let Some(team) = state.teams.get_mut(&team_id) {
            if team.is_member(&member.user_id) {
                return Change::Unchanged;
            }
            tracing::debug!(team = %team_id, user = %member.user_id, "Member joined team");
            team.members.push(member);
            return Change::Changed;
        }

        tracing::debug!(team = %team_id, user = %member.user_id, "Team created");
        let name = team_name.unwrap_or_else(|| team_id.clone());
        state
            .teams
            .insert(team_id.clone(), Team::new(team_id, name, member));
        Change::Changed
    }

    fn finish_question(
        state: &mut EventState,
        team_id: &str,
        sender_id: &str,
        now: DateTime<Utc>,
    ) -> Change {
        let Some(round) = state.teams.get(team_id).map(|team| team.round) else {
            tracing::debug!(team = team_id, "finishQuestion for unknown team");
            return Change::Unchanged;
        };
        let question_count = state.question_count(round);

        let Some(team) = state.teams.get_mut(team_id) else {
            return Change::Unchanged;
        };
        if team.current_question_index >= question_count {
            tracing::debug!(
                team = team_id,
                user = sender_id,
                "Round already complete, finishQuestion ignored"
            );
            return Change::Unchanged;
        }
        if !team.is_member(sender_id) || team.finished_members.contains(sender_id) {
            tracing::debug!(team = team_id, user = sender_id, "finishQuestion ignored");
            return Change::Unchanged;
        }

        team.finished_members.insert(sender_id.to_string());
        team.finish_times.insert(sender_id.to_string(), now);

        if team.all_finished() {
            team.advance_question(question_count);
            tracing::debug!(
                team = team_id,
                index = team.current_question_index,
                "Every member finished, question advanced"
            );
        }
        Change::Changed
    }

    fn update_questions(
        state: &mut EventState,
        round1: Option<Vec<Question>>,
        round2: Option<Vec<Question>>,
    ) -> Change {
        if let Some(questions) = round1 {
            state.round1_questions = questions;
        }
        if let Some(questions) = round2 {
            state.round2_questions = questions;
        }
        state.clamp_question_indices();
        Change::Changed
    }

    fn timer_control(state: &mut EventState, command: TimerCommand, now: DateTime<Utc>) -> Change {
        let change = Self::apply_timer_command(state, command, now);
        if change.is_changed() {
            tracing::debug!(%command, timer = %state.timer_state(), "Timer updated");
        }
        change
    }

    fn apply_timer_command(
        state: &mut EventState,
        command: TimerCommand,
        now: DateTime<Utc>,
    ) -> Change {
        match command {
            TimerCommand::Start => {
                if state.timer_running {
                    return Change::Unchanged;
                }
                state.timer_running = true;
                state.start_time = Some(now);
                state.pause_time = None;
                Change::Changed
            },
            TimerCommand::Pause => {
                if !state.timer_running {
                    return Change::Unchanged;
                }
                state.timer_running = false;
                state.pause_time = Some(now);
                Change::Changed
            },
            TimerCommand::Resume => match (state.timer_running, state.start_time, state.pause_time)
            {
                (false, Some(start), Some(paused_at)) => {
                    let shifted = start.checked_add_signed(now.signed_duration_since(paused_at));
                    if shifted.is_none() {
                        tracing::warn!(
                            %start,
                            %paused_at,
                            "Timer anchors out of range, restarting timer"
                        );
                    }
                    state.start_time = Some(shifted.unwrap_or(now));
                    state.pause_time = None;
                    state.timer_running = true;
                    Change::Changed
                },
                _ => Change::Unchanged,
            },
            TimerCommand::Reset => {
                if !state.timer_running && state.start_time.is_none() && state.pause_time.is_none()
                {
                    return Change::Unchanged;
                }
                state.reset_timer();
                Change::Changed
            },
        }
    }

    fn advance_round(state: &mut EventState) -> Change {
        if !state.is_initialized || state.round >= LAST_ROUND {
            return Change::Unchanged;
        }
        state.round += 1;
        state.reset_timer();
        let round = state.round;
        for team in state.teams.values_mut() {
            team.enter_round(round);
        }
        tracing::debug!(round, "Event advanced to next round");
        Change::Changed
    }
}

impl Reducer for QuizReducer {
    type State = EventState;
    type Action = QuizAction;
    type Environment = QuizEnvironment;

    fn initial_state(&self, env: &QuizEnvironment) -> EventState {
        EventState::new(&env.questions)
    }

    fn reduce(&self, state: &mut EventState, action: QuizAction, env: &QuizEnvironment) -> Change {
        match action {
            QuizAction::RequestState => Change::Unchanged,
            QuizAction::InitializeEvent => Self::initialize(state, &env.questions),
            QuizAction::JoinOrCreateTeam {
                team_id,
                team_name,
                sender_id,
                user_name,
            } => {
                let member = Member::new(sender_id, user_name);
                Self::join_or_create_team(state, team_id, team_name, member)
            },
            QuizAction::FinishQuestion { team_id, sender_id } => {
                Self::finish_question(state, &team_id, &sender_id, env.clock.now())
            },
            QuizAction::UpdateQuestions { round1, round2 } => {
                Self::update_questions(state, round1, round2)
            },
            QuizAction::TimerControl(command) => {
                Self::timer_control(state, command, env.clock.now())
            },
            QuizAction::AdvanceRound => Self::advance_round(state),
            QuizAction::Invalid { kind, reason } => {
                tracing::debug!(%kind, %reason, "Invalid payload, treating as no-op");
                Change::Unchanged
            },
            QuizAction::Unrecognized { kind } => {
                tracing::debug!(%kind, "Unrecognized action, treating as no-op");
                Change::Unchanged
            },
        }
    }
}
