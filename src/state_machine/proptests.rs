//! Property-based tests for the turn state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::transition::*;
use super::*;
use crate::rag::RagError;
use crate::store::{References, Role};
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context() -> TurnContext {
    TurnContext {
        stand_alone_query: "query".to_string(),
        context_text: "context".to_string(),
        references: References::new(),
        source_tool_ids: vec![],
    }
}

fn submit(text: &str) -> Event {
    Event::UserSubmit {
        text: text.to_string(),
        tools: vec![],
    }
}

fn count_appends(effects: &[Effect], role: Role) -> usize {
    effects
        .iter()
        .filter(|e| matches!(e, Effect::AppendMessage { message } if message.role == role))
        .count()
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_error() -> impl Strategy<Value = RagError> {
    "[a-zA-Z ]{1,30}".prop_flat_map(|message| {
        prop_oneof![
            Just(RagError::context_build(message.clone())),
            Just(RagError::stream(message.clone())),
            Just(RagError::scoring(message.clone())),
            Just(RagError::network(message)),
        ]
    })
}

fn arb_chunk() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => "[a-zA-Z .,]{1,12}",
        1 => Just(String::new()),
    ]
}

fn arb_busy_state() -> impl Strategy<Value = TurnState> {
    prop_oneof![
        "[a-z ]{1,20}".prop_map(|query| TurnState::BuildingContext {
            query,
            tool_ids: vec![],
        }),
        ("[a-z ]{0,20}", any::<bool>()).prop_map(|(accumulated, received_first_chunk)| {
            TurnState::Streaming {
                context: test_context(),
                accumulated,
                received_first_chunk,
            }
        }),
        "[a-z ]{0,20}".prop_map(|answer| TurnState::Scoring {
            context: test_context(),
            answer,
        }),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        "[a-zA-Z ]{0,20}".prop_map(|text| submit(&text)),
        Just(Event::ContextBuilt {
            context: test_context()
        }),
        arb_error().prop_map(|error| Event::ContextFailed { error }),
        arb_chunk().prop_map(|data| Event::StreamChunk { data }),
        Just(Event::StreamClosed),
        arb_error().prop_map(|error| Event::StreamFailed { error }),
        (0.0f64..=1.0).prop_map(|score| Event::ScoreReceived {
            score,
            similar_queries: vec![],
        }),
        arb_error().prop_map(|error| Event::ScoringFailed { error }),
    ]
}

/// Which phase a turn fails in
#[derive(Debug, Clone, Copy)]
enum FailAt {
    Context,
    Stream,
    Scoring,
}

fn arb_fail_at() -> impl Strategy<Value = FailAt> {
    prop_oneof![
        Just(FailAt::Context),
        Just(FailAt::Stream),
        Just(FailAt::Scoring),
    ]
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Accepted submits append exactly one user message, rejected ones nothing
    #[test]
    fn prop_one_user_message_per_accepted_submit(events in proptest::collection::vec(arb_event(), 0..30)) {
        let mut state = TurnState::Idle;
        for event in events {
            let was_idle = !state.is_in_flight();
            let is_submit = matches!(event, Event::UserSubmit { .. });
            match transition(&state, event) {
                Ok(result) => {
                    let users = count_appends(&result.effects, Role::User);
                    prop_assert_eq!(users, usize::from(is_submit));
                    if is_submit {
                        prop_assert!(was_idle);
                    }
                    state = result.new_state;
                }
                Err(TransitionError::TurnInFlight) => prop_assert!(!was_idle),
                Err(_) => {}
            }
        }
    }

    // Assistant messages come only from a score landing in Scoring
    #[test]
    fn prop_assistant_message_only_when_scoring_finishes(events in proptest::collection::vec(arb_event(), 0..30)) {
        let mut state = TurnState::Idle;
        for event in events {
            let was_scoring = matches!(state, TurnState::Scoring { .. });
            let is_score = matches!(event, Event::ScoreReceived { .. });
            if let Ok(result) = transition(&state, event) {
                let assistants = count_appends(&result.effects, Role::Assistant);
                prop_assert_eq!(assistants, usize::from(was_scoring && is_score));
                state = result.new_state;
            }
        }
    }

    // Busy states reject submissions outright
    #[test]
    fn prop_busy_rejects_submit(state in arb_busy_state(), text in "[a-zA-Z ]{1,20}") {
        prop_assert_eq!(transition(&state, submit(&text)).unwrap_err(), TransitionError::TurnInFlight);
    }

    // A full turn stores the concatenation of normalized chunks
    #[test]
    fn prop_full_turn_accumulates_chunks(
        chunks in proptest::collection::vec(arb_chunk(), 0..20),
        score in 0.0f64..=1.0,
    ) {
        let mut state = transition(&TurnState::Idle, submit("hello")).unwrap().new_state;
        state = transition(&state, Event::ContextBuilt { context: test_context() }).unwrap().new_state;
        for data in &chunks {
            state = transition(&state, Event::StreamChunk { data: data.clone() }).unwrap().new_state;
        }
        state = transition(&state, Event::StreamClosed).unwrap().new_state;
        let result = transition(&state, Event::ScoreReceived { score, similar_queries: vec![] }).unwrap();

        let expected: String = chunks.iter().map(|c| normalize_chunk(c)).collect();
        let content = result.effects.iter().find_map(|e| match e {
            Effect::AppendMessage { message } if message.role == Role::Assistant => Some(message.content.clone()),
            _ => None,
        });
        prop_assert_eq!(content, Some(expected));
        prop_assert_eq!(result.new_state, TurnState::Idle);
    }

    // A failure in any phase ends at Idle without an assistant message
    #[test]
    fn prop_failure_in_any_phase_returns_to_idle(
        fail_at in arb_fail_at(),
        chunks in proptest::collection::vec(arb_chunk(), 0..5),
        error in arb_error(),
    ) {
        let mut effects = Vec::new();
        let mut step = |state: &TurnState, event: Event| {
            let result = transition(state, event).unwrap();
            effects.extend(result.effects);
            result.new_state
        };

        let mut state = step(&TurnState::Idle, submit("hello"));
        if matches!(fail_at, FailAt::Context) {
            state = step(&state, Event::ContextFailed { error });
        } else {
            state = step(&state, Event::ContextBuilt { context: test_context() });
            for data in chunks {
                state = step(&state, Event::StreamChunk { data });
            }
            if matches!(fail_at, FailAt::Stream) {
                state = step(&state, Event::StreamFailed { error });
            } else {
                state = step(&state, Event::StreamClosed);
                state = step(&state, Event::ScoringFailed { error });
            }
        }

        prop_assert_eq!(state, TurnState::Idle);
        prop_assert_eq!(count_appends(&effects, Role::User), 1);
        prop_assert_eq!(count_appends(&effects, Role::Assistant), 0);
        let failures = effects.iter().filter(|e| matches!(e, Effect::NotifyFailure { .. })).count();
        prop_assert_eq!(failures, 1);
    }
}
