//! Chat history -> question/answer pairs for context building

use super::types::QaPair;
use crate::store::{Message, Role};

/// Pair each assistant message with the latest user message before it.
///
/// User messages that never got an answer are dropped, as are assistant
/// messages with no pending question.
pub fn qa_pairs(messages: &[Message]) -> Vec<QaPair> {
    let mut pairs = Vec::new();
    let mut question: Option<&str> = None;

    for message in messages {
        match message.role {
            Role::User => question = Some(&message.content),
            Role::Assistant => {
                if let Some(q) = question.take() {
                    pairs.push(QaPair {
                        question: q.to_string(),
                        answer: message.content.clone(),
                    });
                }
            }
        }
    }

    pairs
}
