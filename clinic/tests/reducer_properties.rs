//! Property tests: snapshot invariants hold after any sequence of actions.

#![allow(clippy::unwrap_used)]

use chrono::Duration;
use clinic_core::reducer::Reducer;
use clinic_core::state::Snapshot;
use clinic_testing::ManualClock;
use code_clinic::{
    EventState, LAST_ROUND, Question, QuestionBank, QuizAction, QuizEnvironment, QuizReducer,
    TimerCommand,
};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

fn bank() -> QuestionBank {
    QuestionBank::new(
        vec![
            Question::new("Q1", "one"),
            Question::new("Q2", "two"),
            Question::new("Q3", "three"),
        ],
        vec![Question::new("R2", "final")],
    )
}

fn arb_team() -> impl Strategy<Value = String> {
    prop_oneof![Just("alpha".to_string()), Just("beta".to_string())]
}

fn arb_user() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("u1".to_string()),
        Just("u2".to_string()),
        Just("u3".to_string()),
    ]
}

fn arb_timer() -> impl Strategy<Value = TimerCommand> {
    prop_oneof![
        Just(TimerCommand::Start),
        Just(TimerCommand::Pause),
        Just(TimerCommand::Resume),
        Just(TimerCommand::Reset),
    ]
}

fn arb_questions() -> impl Strategy<Value = Option<Vec<Question>>> {
    proptest::option::of((0usize..4).prop_map(|n| {
        (0..n)
            .map(|i| Question::new(format!("T{i}"), "content"))
            .collect()
    }))
}

fn arb_action() -> impl Strategy<Value = QuizAction> {
    prop_oneof![
        Just(QuizAction::RequestState),
        Just(QuizAction::InitializeEvent),
        Just(QuizAction::AdvanceRound),
        (arb_team(), arb_user()).prop_map(|(team_id, sender_id)| QuizAction::JoinOrCreateTeam {
            team_name: None,
            user_name: format!("name-{sender_id}"),
            team_id,
            sender_id,
        }),
        (arb_team(), arb_user())
            .prop_map(|(team_id, sender_id)| QuizAction::FinishQuestion { team_id, sender_id }),
        (arb_questions(), arb_questions())
            .prop_map(|(round1, round2)| QuizAction::UpdateQuestions { round1, round2 }),
        arb_timer().prop_map(QuizAction::TimerControl),
        Just(QuizAction::Unrecognized {
            kind: "foo".to_string()
        }),
    ]
}

fn check_invariants(state: &EventState) -> Result<(), TestCaseError> {
    prop_assert!((1..=LAST_ROUND).contains(&state.round));
    if state.timer_running {
        prop_assert!(state.start_time.is_some());
        prop_assert!(state.pause_time.is_none());
    }

    for (key, team) in &state.teams {
        prop_assert_eq!(key, &team.id);

        let members: BTreeSet<_> = team.members.iter().map(|m| m.user_id.clone()).collect();
        prop_assert_eq!(members.len(), team.members.len(), "duplicate member");
        prop_assert!(team.finished_members.is_subset(&members));

        let timed: BTreeSet<_> = team.finish_times.keys().cloned().collect();
        prop_assert!(team.finished_members.is_subset(&timed));
        prop_assert!(timed.is_subset(&members));
        if !team.finished_members.is_empty() {
            prop_assert!(!team.all_finished(), "question left open after everyone finished");
        }

        prop_assert!(team.round >= 1 && team.round <= state.round);
        prop_assert!(team.current_question_index <= state.question_count(team.round));
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn invariants_hold_after_every_action(actions in prop::collection::vec(arb_action(), 1..40)) {
        let clock = Arc::new(ManualClock::starting_at_test_epoch());
        let env = QuizEnvironment::new(clock.clone(), Arc::new(bank()));
        let reducer = QuizReducer::new();
        let mut state = reducer.initial_state(&env);

        for action in actions {
            let before = state.clone();
            let change = reducer.reduce(&mut state, action, &env);
            clock.advance(Duration::seconds(7));

            check_invariants(&state)?;
            if !change.is_changed() {
                prop_assert_eq!(&state, &before);
            }

            // Finishing is monotonic within a question; initialization starts over
            if state.round == before.round && state.is_initialized == before.is_initialized {
                for (id, team) in &before.teams {
                    let after = &state.teams[id];
                    if after.current_question_index > team.current_question_index {
                        prop_assert_eq!(
                            after.current_question_index,
                            team.current_question_index + 1
                        );
                        prop_assert!(after.finished_members.is_empty());
                    } else {
                        prop_assert!(after.finished_members.is_superset(&team.finished_members));
                        prop_assert!(after.current_question_index >= team.current_question_index
                            || after.current_question_index == state.question_count(after.round));
                    }
                }
            }
        }
    }

    #[test]
    fn published_snapshots_survive_repair(actions in prop::collection::vec(arb_action(), 1..40)) {
        let env = QuizEnvironment::new(
            Arc::new(ManualClock::starting_at_test_epoch()),
            Arc::new(bank()),
        );
        let reducer = QuizReducer::new();
        let mut state = reducer.initial_state(&env);
        for action in actions {
            let _ = reducer.reduce(&mut state, action, &env);
        }

        let json = serde_json::to_value(&state).unwrap();
        let mut read_back: EventState = serde_json::from_value(json).unwrap();
        prop_assert!(!read_back.repair().unwrap().is_changed());
        prop_assert_eq!(read_back, state);
    }

    #[test]
    fn reduction_is_deterministic(actions in prop::collection::vec(arb_action(), 1..30)) {
        let run = || {
            let env = QuizEnvironment::new(
                Arc::new(ManualClock::starting_at_test_epoch()),
                Arc::new(bank()),
            );
            let reducer = QuizReducer::new();
            let mut state = reducer.initial_state(&env);
            let changes: Vec<_> = actions
                .iter()
                .cloned()
                .map(|action| reducer.reduce(&mut state, action, &env))
                .collect();
            (state, changes)
        };

        prop_assert_eq!(run(), run());
    }
}
