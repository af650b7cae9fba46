//! Effects produced by state transitions

use crate::rag::RagError;
use crate::store::{Message, References};

/// Effects to be executed after a state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append a finished message to the chat log
    AppendMessage { message: Message },

    /// Request a standalone query and retrieval context
    BuildContext { query: String, tool_ids: Vec<String> },

    /// Open the answer stream
    OpenStream { query: String, context: String },

    /// Request a relevance score for the finished answer
    ScoreResponse {
        stand_alone_query: String,
        answer: String,
    },

    /// Publish phase, loading flag and live preview to the view
    PublishView,

    /// Surface a turn failure to the user
    NotifyFailure { error: RagError },

    /// Tell the view the turn finished
    NotifyTurnComplete { similar_queries: Vec<String> },
}

impl Effect {
    pub fn append_user_message(content: impl Into<String>) -> Self {
        Effect::AppendMessage {
            message: Message::user(content),
        }
    }

    pub fn append_assistant_message(content: impl Into<String>, references: References, score: f64) -> Self {
        Effect::AppendMessage {
            message: Message::assistant(content, references, score),
        }
    }

    pub fn notify_failure(error: RagError) -> Self {
        Effect::NotifyFailure { error }
    }
}
