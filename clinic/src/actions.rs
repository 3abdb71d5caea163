//! Quiz actions and their decoding from request envelopes.
//!
//! Every action kind has its own variant with the fields it needs. Decoding
//! validates the payload at the boundary; anything that does not validate
//! becomes [`QuizAction::Invalid`], and unknown kinds become
//! [`QuizAction::Unrecognized`]. Both are no-ops in the reducer, so decoding
//! never fails.

use crate::types::Question;
use clinic_core::request::{ActionRequest, DecodeAction};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::str::FromStr;

/// Timer command carried by `timerControl`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerCommand {
    /// Stopped/Paused → Running with a fresh start time
    Start,
    /// Running → Paused
    Pause,
    /// Paused → Running, excluding the pause from elapsed time
    Resume,
    /// Any → Stopped, clearing both anchors
    Reset,
}

impl FromStr for TimerCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Self::Start),
            "pause" => Ok(Self::Pause),
            "resume" => Ok(Self::Resume),
            "reset" => Ok(Self::Reset),
            other => Err(format!("unknown timer action '{other}'")),
        }
    }
}

impl fmt::Display for TimerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Pause => write!(f, "pause"),
            Self::Resume => write!(f, "resume"),
            Self::Reset => write!(f, "reset"),
        }
    }
}

/// Actions the quiz reducer understands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuizAction {
    /// Republish the current state
    RequestState,

    /// Start the event (once)
    InitializeEvent,

    /// Join a team, creating it if it does not exist
    JoinOrCreateTeam {
        /// Team to join
        team_id: String,
        /// Name for a newly created team
        team_name: Option<String>,
        /// Joining user's id
        sender_id: String,
        /// Joining user's display name
        user_name: String,
    },

    /// A member finished the team's current question
    FinishQuestion {
        /// The member's team
        team_id: String,
        /// The finishing member
        sender_id: String,
    },

    /// Replace question lists wholesale
    UpdateQuestions {
        /// New round one list, if given
        round1: Option<Vec<Question>>,
        /// New round two list, if given
        round2: Option<Vec<Question>>,
    },

    /// Drive the event timer
    TimerControl(TimerCommand),

    /// Move the event and every team to the next round
    AdvanceRound,

    /// A known kind whose payload failed validation
    Invalid {
        /// The action kind
        kind: String,
        /// What was wrong
        reason: String,
    },

    /// A kind this server does not know
    Unrecognized {
        /// The action kind
        kind: String,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinPayload {
    team_id: String,
    #[serde(default)]
    team_name: Option<String>,
    user_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinishPayload {
    team_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuestionsPayload {
    #[serde(default)]
    round1_questions: Option<Vec<Question>>,
    #[serde(default)]
    round2_questions: Option<Vec<Question>>,
}

#[derive(Deserialize)]
struct TimerPayload {
    action: String,
}

fn payload<T: DeserializeOwned>(request: &ActionRequest) -> Result<T, String> {
    T::deserialize(&request.payload).map_err(|e| format!("invalid payload: {e}"))
}

fn require_sender(request: &ActionRequest) -> Result<String, String> {
    request
        .sender()
        .map(str::to_string)
        .ok_or_else(|| "missing senderId".to_string())
}

fn require_non_empty(field: &str, value: String) -> Result<String, String> {
    if value.trim().is_empty() {
        Err(format!("{field} must not be empty"))
    } else {
        Ok(value)
    }
}

impl QuizAction {
    fn decode_join(request: &ActionRequest) -> Result<Self, String> {
        let JoinPayload {
            team_id,
            team_name,
            user_name,
        } = payload(request)?;
        Ok(Self::JoinOrCreateTeam {
            team_id: require_non_empty("teamId", team_id)?,
            team_name: team_name.filter(|name| !name.trim().is_empty()),
            sender_id: require_sender(request)?,
            user_name,
        })
    }

    fn decode_finish(request: &ActionRequest) -> Result<Self, String> {
        let FinishPayload { team_id } = payload(request)?;
        Ok(Self::FinishQuestion {
            team_id: require_non_empty("teamId", team_id)?,
            sender_id: require_sender(request)?,
        })
    }

    fn decode_questions(request: &ActionRequest) -> Result<Self, String> {
        let QuestionsPayload {
            round1_questions,
            round2_questions,
        } = payload(request)?;
        if round1_questions.is_none() && round2_questions.is_none() {
            return Err("neither round1Questions nor round2Questions given".to_string());
        }
        Ok(Self::UpdateQuestions {
            round1: round1_questions,
            round2: round2_questions,
        })
    }

    fn decode_timer(request: &ActionRequest) -> Result<Self, String> {
        let TimerPayload { action } = payload(request)?;
        Ok(Self::TimerControl(action.parse()?))
    }
}

impl DecodeAction for QuizAction {
    fn decode(request: ActionRequest) -> Self {
        let decoded = match request.kind.as_str() {
            "requestState" => Ok(Self::RequestState),
            "initializeEvent" => Ok(Self::InitializeEvent),
            "joinOrCreateTeam" => Self::decode_join(&request),
            "finishQuestion" => Self::decode_finish(&request),
            "updateQuestions" => Self::decode_questions(&request),
            "timerControl" => Self::decode_timer(&request),
            "advanceRound" => Ok(Self::AdvanceRound),
            _ => {
                return Self::Unrecognized {
                    kind: request.kind,
                };
            },
        };

        decoded.unwrap_or_else(|reason| Self::Invalid {
            kind: request.kind,
            reason,
        })
    }

    fn kind(&self) -> &str {
        match self {
            Self::RequestState => "requestState",
            Self::InitializeEvent => "initializeEvent",
            Self::JoinOrCreateTeam { .. } => "joinOrCreateTeam",
            Self::FinishQuestion { .. } => "finishQuestion",
            Self::UpdateQuestions { .. } => "updateQuestions",
            Self::TimerControl(_) => "timerControl",
            Self::AdvanceRound => "advanceRound",
            Self::Invalid { kind, .. } | Self::Unrecognized { kind } => kind,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(kind: &str, payload: serde_json::Value, sender: Option<&str>) -> QuizAction {
        let mut request = ActionRequest::new(kind, payload);
        request.sender_id = sender.map(str::to_string);
        QuizAction::decode(request)
    }

    fn assert_invalid(action: &QuizAction, expected_kind: &str) {
        match action {
            QuizAction::Invalid { kind, .. } => assert_eq!(kind, expected_kind),
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn decodes_payloadless_kinds() {
        assert_eq!(decode("requestState", json!(null), None), QuizAction::RequestState);
        assert_eq!(decode("initializeEvent", json!({}), Some("u1")), QuizAction::InitializeEvent);
        assert_eq!(decode("advanceRound", json!(null), None), QuizAction::AdvanceRound);
    }

    #[test]
    fn decodes_join() {
        let action = decode(
            "joinOrCreateTeam",
            json!({ "teamId": "alpha", "teamName": "Alpha", "userName": "Bo" }),
            Some("u1"),
        );
        assert_eq!(
            action,
            QuizAction::JoinOrCreateTeam {
                team_id: "alpha".to_string(),
                team_name: Some("Alpha".to_string()),
                sender_id: "u1".to_string(),
                user_name: "Bo".to_string(),
            }
        );
    }

    #[test]
    fn blank_team_name_is_absent() {
        let action = decode(
            "joinOrCreateTeam",
            json!({ "teamId": "alpha", "teamName": " ", "userName": "Bo" }),
            Some("u1"),
        );
        assert!(matches!(action, QuizAction::JoinOrCreateTeam { team_name: None, .. }));
    }

    #[test]
    fn join_requires_team_user_and_sender() {
        let join = |payload: serde_json::Value, sender: Option<&'static str>| {
            decode("joinOrCreateTeam", payload, sender)
        };

        assert_invalid(&join(json!({ "teamId": "alpha", "userName": "Bo" }), None), "joinOrCreateTeam");
        assert_invalid(&join(json!({ "teamId": "", "userName": "Bo" }), Some("u1")), "joinOrCreateTeam");
        assert_invalid(&join(json!({ "teamId": "alpha" }), Some("u1")), "joinOrCreateTeam");
        assert_invalid(&join(json!(null), Some("u1")), "joinOrCreateTeam");
        assert_invalid(&join(json!({ "teamId": 7, "userName": "Bo" }), Some("u1")), "joinOrCreateTeam");
    }

    #[test]
    fn decodes_finish() {
        let action = decode("finishQuestion", json!({ "teamId": "alpha" }), Some("u1"));
        assert_eq!(
            action,
            QuizAction::FinishQuestion {
                team_id: "alpha".to_string(),
                sender_id: "u1".to_string(),
            }
        );
        assert_invalid(&decode("finishQuestion", json!({ "teamId": "alpha" }), Some("")), "finishQuestion");
    }

    #[test]
    fn decodes_question_updates() {
        let action = decode(
            "updateQuestions",
            json!({ "round2Questions": [{ "title": "T", "content": "C" }] }),
            Some("organiser"),
        );
        assert_eq!(
            action,
            QuizAction::UpdateQuestions {
                round1: None,
                round2: Some(vec![Question::new("T", "C")]),
            }
        );

        assert_invalid(&decode("updateQuestions", json!({}), None), "updateQuestions");
        assert_invalid(
            &decode("updateQuestions", json!({ "round1Questions": [{ "title": "T" }] }), None),
            "updateQuestions",
        );
    }

    #[test]
    fn decodes_timer_commands() {
        for (raw, command) in [
            ("start", TimerCommand::Start),
            ("pause", TimerCommand::Pause),
            ("resume", TimerCommand::Resume),
            ("reset", TimerCommand::Reset),
        ] {
            assert_eq!(
                decode("timerControl", json!({ "action": raw }), None),
                QuizAction::TimerControl(command)
            );
            assert_eq!(command.to_string(), raw);
        }

        assert_invalid(&decode("timerControl", json!({ "action": "stop" }), None), "timerControl");
        assert_invalid(&decode("timerControl", json!({}), None), "timerControl");
    }

    #[test]
    fn unknown_kind_is_unrecognized() {
        let action = decode("foo", json!({ "anything": true }), Some("u1"));
        assert_eq!(action, QuizAction::Unrecognized { kind: "foo".to_string() });
        assert_eq!(action.kind(), "foo");
    }

    #[test]
    fn kind_labels_match_wire_names() {
        assert_eq!(QuizAction::RequestState.kind(), "requestState");
        assert_eq!(QuizAction::TimerControl(TimerCommand::Pause).kind(), "timerControl");
        let invalid = decode("finishQuestion", json!({}), Some("u1"));
        assert_eq!(invalid.kind(), "finishQuestion");
    }
}
