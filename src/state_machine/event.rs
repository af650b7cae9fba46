//! Events that drive a chat turn

use super::state::TurnContext;
use crate::mention::ToolMention;
use crate::rag::RagError;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    UserSubmit {
        /// Raw input, mentions still present
        text: String,
        tools: Vec<ToolMention>,
    },

    // Context builder events
    ContextBuilt {
        context: TurnContext,
    },
    ContextFailed {
        error: RagError,
    },

    // Stream events, delivered in arrival order
    StreamChunk {
        data: String,
    },
    StreamClosed,
    StreamFailed {
        error: RagError,
    },

    // Relevance scorer events
    ScoreReceived {
        score: f64,
        similar_queries: Vec<String>,
    },
    ScoringFailed {
        error: RagError,
    },
}

impl Event {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Event::UserSubmit { .. } => "user_submit",
            Event::ContextBuilt { .. } => "context_built",
            Event::ContextFailed { .. } => "context_failed",
            Event::StreamChunk { .. } => "stream_chunk",
            Event::StreamClosed => "stream_closed",
            Event::StreamFailed { .. } => "stream_failed",
            Event::ScoreReceived { .. } => "score_received",
            Event::ScoringFailed { .. } => "scoring_failed",
        }
    }
}
