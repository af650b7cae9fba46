//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.
//! The RAG service seam lives in [`crate::rag::RagService`].

use crate::store::{Chat, Message};
use async_trait::async_trait;
use std::sync::Arc;

/// Ordered storage for chats and their messages
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Create an empty chat with the given title
    async fn create_chat(&self, title: &str) -> Result<Chat, String>;

    /// Get a chat by id, messages included
    async fn get_chat(&self, chat_id: &str) -> Result<Option<Chat>, String>;

    /// All chats, oldest first
    async fn list_chats(&self) -> Result<Vec<Chat>, String>;

    /// Append a message to the end of a chat's log
    async fn append_message(&self, chat_id: &str, message: Message) -> Result<(), String>;

    /// Rename a chat
    async fn rename_chat(&self, chat_id: &str, title: &str) -> Result<(), String>;

    /// Delete a chat and its messages; returns whether it existed
    async fn delete_chat(&self, chat_id: &str) -> Result<bool, String>;

    /// Messages for a chat, in append order
    async fn messages(&self, chat_id: &str) -> Result<Vec<Message>, String>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: ConversationStore + ?Sized> ConversationStore for Arc<T> {
    async fn create_chat(&self, title: &str) -> Result<Chat, String> {
        (**self).create_chat(title).await
    }

    async fn get_chat(&self, chat_id: &str) -> Result<Option<Chat>, String> {
        (**self).get_chat(chat_id).await
    }

    async fn list_chats(&self) -> Result<Vec<Chat>, String> {
        (**self).list_chats().await
    }

    async fn append_message(&self, chat_id: &str, message: Message) -> Result<(), String> {
        (**self).append_message(chat_id, message).await
    }

    async fn rename_chat(&self, chat_id: &str, title: &str) -> Result<(), String> {
        (**self).rename_chat(chat_id, title).await
    }

    async fn delete_chat(&self, chat_id: &str) -> Result<bool, String> {
        (**self).delete_chat(chat_id).await
    }

    async fn messages(&self, chat_id: &str) -> Result<Vec<Message>, String> {
        (**self).messages(chat_id).await
    }
}
