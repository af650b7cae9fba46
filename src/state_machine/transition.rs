//! Pure state transition function
//!
//! Given the same state and event it always yields the same next state and
//! effects; all I/O happens in the runtime that executes the effects.

use super::{Effect, Event, TurnState};
use crate::mention::{strip_mentions, tool_ids};
use thiserror::Error;

/// Stands in for an empty `data` field, which marks a paragraph break
pub const EMPTY_CHUNK: &str = " \n";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: TurnState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: TurnState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("A turn is already in flight for this chat")]
    TurnInFlight,
    #[error("Nothing to send once mentions are removed")]
    EmptyInput,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Normalize one stream chunk before it is accumulated
pub fn normalize_chunk(data: &str) -> &str {
    if data.is_empty() {
        EMPTY_CHUNK
    } else {
        data
    }
}

/// An event the current state does not accept, with that state handed back
#[derive(Debug)]
pub struct Rejected {
    pub state: Box<TurnState>,
    pub error: TransitionError,
}

impl Rejected {
    fn new(state: TurnState, error: TransitionError) -> Self {
        Self {
            state: Box::new(state),
            error,
        }
    }
}

/// Pure transition function
#[cfg(test)]
pub fn transition(state: &TurnState, event: Event) -> Result<TransitionResult, TransitionError> {
    step(state.clone(), event).map_err(|rejected| rejected.error)
}

/// Transition that consumes the current state.
///
/// Streamed text is moved into the next state rather than copied, so a long
/// answer costs one append per chunk. A rejected event returns the state
/// unchanged inside [`Rejected`].
pub fn step(state: TurnState, event: Event) -> Result<TransitionResult, Rejected> {
    match (state, event) {
        // ============================================================
        // Submission
        // ============================================================

        // Idle + UserSubmit -> BuildingContext
        (TurnState::Idle, Event::UserSubmit { text, tools }) => {
            let query = strip_mentions(&text, &tools);
            if query.is_empty() {
                return Err(Rejected::new(TurnState::Idle, TransitionError::EmptyInput));
            }
            let tool_ids = tool_ids(&tools);

            Ok(TransitionResult::new(TurnState::BuildingContext {
                query: query.clone(),
                tool_ids: tool_ids.clone(),
            })
            .with_effect(Effect::append_user_message(query.clone()))
            .with_effect(Effect::PublishView)
            .with_effect(Effect::BuildContext { query, tool_ids }))
        }

        // Busy + UserSubmit -> reject, state untouched
        (state, Event::UserSubmit { .. }) => Err(Rejected::new(state, TransitionError::TurnInFlight)),

        // ============================================================
        // Context building
        // ============================================================

        // BuildingContext + ContextBuilt -> Streaming
        (TurnState::BuildingContext { .. }, Event::ContextBuilt { context }) => {
            let open = Effect::OpenStream {
                query: context.stand_alone_query.clone(),
                context: context.context_text.clone(),
            };
            Ok(TransitionResult::new(TurnState::Streaming {
                context,
                accumulated: String::new(),
                received_first_chunk: false,
            })
            .with_effect(Effect::PublishView)
            .with_effect(open))
        }

        // BuildingContext + ContextFailed -> Idle
        (TurnState::BuildingContext { .. }, Event::ContextFailed { error }) => Ok(failed(error)),

        // ============================================================
        // Streaming
        // ============================================================

        // Streaming + StreamChunk -> Streaming with the chunk appended
        (
            TurnState::Streaming {
                context,
                mut accumulated,
                ..
            },
            Event::StreamChunk { data },
        ) => {
            accumulated.push_str(normalize_chunk(&data));
            Ok(TransitionResult::new(TurnState::Streaming {
                context,
                accumulated,
                received_first_chunk: true,
            })
            .with_effect(Effect::PublishView))
        }

        // Streaming + StreamClosed -> Scoring
        (TurnState::Streaming { context, accumulated, .. }, Event::StreamClosed) => {
            let score = Effect::ScoreResponse {
                stand_alone_query: context.stand_alone_query.clone(),
                answer: accumulated.clone(),
            };
            Ok(TransitionResult::new(TurnState::Scoring {
                context,
                answer: accumulated,
            })
            .with_effect(Effect::PublishView)
            .with_effect(score))
        }

        // Streaming + StreamFailed -> Idle, partial answer discarded
        (TurnState::Streaming { .. }, Event::StreamFailed { error }) => Ok(failed(error)),

        // ============================================================
        // Scoring
        // ============================================================

        // Scoring + ScoreReceived -> Idle with the assistant message appended
        (
            TurnState::Scoring { context, answer },
            Event::ScoreReceived {
                score,
                similar_queries,
            },
        ) => Ok(TransitionResult::new(TurnState::Idle)
            .with_effect(Effect::append_assistant_message(
                answer,
                context.references,
                score,
            ))
            .with_effect(Effect::PublishView)
            .with_effect(Effect::NotifyTurnComplete { similar_queries })),

        // Scoring + ScoringFailed -> Idle, answer discarded
        (TurnState::Scoring { .. }, Event::ScoringFailed { error }) => Ok(failed(error)),

        // ============================================================
        // Invalid Transitions
        // ============================================================
        (state, event) => {
            let error = TransitionError::InvalidTransition(format!(
                "No transition from {:?} with event {}",
                state.phase(),
                event.name()
            ));
            Err(Rejected::new(state, error))
        }
    }
}

/// Any failure: back to Idle, nothing appended, one failure notice
fn failed(error: crate::rag::RagError) -> TransitionResult {
    TransitionResult::new(TurnState::Idle)
        .with_effect(Effect::PublishView)
        .with_effect(Effect::notify_failure(error))
}
