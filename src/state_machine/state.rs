//! Turn state types

use crate::store::References;
use serde::{Deserialize, Serialize};

/// Retrieval context for one turn. Owned by the turn and dropped when it ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnContext {
    pub stand_alone_query: String,
    pub context_text: String,
    pub references: References,
    pub source_tool_ids: Vec<String>,
}

/// Where a chat's current turn is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnState {
    /// Ready for input, no turn in flight
    #[default]
    Idle,

    /// User message appended, context request in flight
    BuildingContext {
        query: String,
        tool_ids: Vec<String>,
    },

    /// Answer stream open, chunks accumulating
    Streaming {
        context: TurnContext,
        accumulated: String,
        /// The loading indicator stays up until the first chunk arrives
        received_first_chunk: bool,
    },

    /// Stream closed, relevance request in flight
    Scoring { context: TurnContext, answer: String },
}

/// Coarse phase shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    BuildingContext,
    Streaming,
    Scoring,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Idle => "Ready",
            Phase::BuildingContext => "Building Context...",
            Phase::Streaming => "Streaming Response...",
            Phase::Scoring => "Evaluating Response...",
        }
    }
}

impl TurnState {
    pub fn phase(&self) -> Phase {
        match self {
            TurnState::Idle => Phase::Idle,
            TurnState::BuildingContext { .. } => Phase::BuildingContext,
            TurnState::Streaming { .. } => Phase::Streaming,
            TurnState::Scoring { .. } => Phase::Scoring,
        }
    }

    /// A turn is running; new submissions are rejected
    pub fn is_in_flight(&self) -> bool {
        !matches!(self, TurnState::Idle)
    }

    /// Waiting on the service with nothing new to show
    pub fn is_loading(&self) -> bool {
        match self {
            TurnState::Idle => false,
            TurnState::Streaming {
                received_first_chunk,
                ..
            } => !received_first_chunk,
            TurnState::BuildingContext { .. } | TurnState::Scoring { .. } => true,
        }
    }

    /// Streamed text not yet finalized into a message
    pub fn preview(&self) -> &str {
        match self {
            TurnState::Streaming { accumulated, .. } => accumulated,
            TurnState::Scoring { answer, .. } => answer,
            TurnState::Idle | TurnState::BuildingContext { .. } => "",
        }
    }
}
