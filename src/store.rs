//! Conversation store
//!
//! Keeps chats and their append-only message logs in memory.

mod model;

pub use model::*;

use crate::runtime::traits::ConversationStore;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StoreError {
    #[error("Chat not found: {0}")]
    ChatNotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Thread-safe in-memory store. Chats are kept in creation order.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    chats: RwLock<Vec<Chat>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Chat Operations ====================

    pub async fn create(&self, title: &str) -> Chat {
        let chat = Chat::new(title);
        self.chats.write().await.push(chat.clone());
        tracing::debug!(chat_id = %chat.id, title, "Created chat");
        chat
    }

    pub async fn get(&self, chat_id: &str) -> Option<Chat> {
        self.chats.read().await.iter().find(|c| c.id == chat_id).cloned()
    }

    pub async fn list(&self) -> Vec<Chat> {
        self.chats.read().await.clone()
    }

    pub async fn rename(&self, chat_id: &str, title: &str) -> StoreResult<()> {
        let mut chats = self.chats.write().await;
        let chat = chats
            .iter_mut()
            .find(|c| c.id == chat_id)
            .ok_or_else(|| StoreError::ChatNotFound(chat_id.to_string()))?;
        title.clone_into(&mut chat.title);
        Ok(())
    }

    pub async fn delete(&self, chat_id: &str) -> bool {
        let mut chats = self.chats.write().await;
        let before = chats.len();
        chats.retain(|c| c.id != chat_id);
        chats.len() != before
    }

    // ==================== Message Operations ====================

    pub async fn append(&self, chat_id: &str, message: Message) -> StoreResult<()> {
        let mut chats = self.chats.write().await;
        let chat = chats
            .iter_mut()
            .find(|c| c.id == chat_id)
            .ok_or_else(|| StoreError::ChatNotFound(chat_id.to_string()))?;
        chat.messages.push(message);
        Ok(())
    }

    pub async fn messages_for(&self, chat_id: &str) -> StoreResult<Vec<Message>> {
        self.chats
            .read()
            .await
            .iter()
            .find(|c| c.id == chat_id)
            .map(|c| c.messages.clone())
            .ok_or_else(|| StoreError::ChatNotFound(chat_id.to_string()))
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn create_chat(&self, title: &str) -> Result<Chat, String> {
        Ok(self.create(title).await)
    }

    async fn get_chat(&self, chat_id: &str) -> Result<Option<Chat>, String> {
        Ok(self.get(chat_id).await)
    }

    async fn list_chats(&self) -> Result<Vec<Chat>, String> {
        Ok(self.list().await)
    }

    async fn append_message(&self, chat_id: &str, message: Message) -> Result<(), String> {
        self.append(chat_id, message).await.map_err(|e| e.to_string())
    }

    async fn rename_chat(&self, chat_id: &str, title: &str) -> Result<(), String> {
        self.rename(chat_id, title).await.map_err(|e| e.to_string())
    }

    async fn delete_chat(&self, chat_id: &str) -> Result<bool, String> {
        Ok(self.delete(chat_id).await)
    }

    async fn messages(&self, chat_id: &str) -> Result<Vec<Message>, String> {
        self.messages_for(chat_id).await.map_err(|e| e.to_string())
    }
}
