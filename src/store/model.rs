//! Conversation data model

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Citation label -> source text, kept in the order the service produced them
pub type References = IndexMap<String, String>;

/// Title given to chats created without one
pub const DEFAULT_CHAT_TITLE: &str = "New Chat";

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// A finished chat message. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Only populated on assistant messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<References>,
    /// Relevance score in `[0, 1]`, only populated on assistant messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            references: None,
            score: None,
        }
    }

    pub fn assistant(content: impl Into<String>, references: References, score: f64) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            references: Some(references),
            score: Some(score),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    /// Score rendered as a percentage with two decimals, e.g. `90.00%`
    pub fn score_label(&self) -> Option<String> {
        self.score.map(|score| format!("{:.2}%", score * 100.0))
    }
}

/// A conversation: an ordered, append-only log of messages plus a title
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
}

impl Chat {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            messages: Vec::new(),
            created_at: Utc::now(),
        }
    }
}
