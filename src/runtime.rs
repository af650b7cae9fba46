//! Runtime for executing chat turns
//!
//! One background runtime per open chat. Each runtime owns its chat's turn
//! state, so turns on different chats proceed independently.

mod executor;
pub mod traits;


pub use executor::ChatRuntime;
pub use traits::*;

use crate::mention::ToolMention;
use crate::rag::{LoggingService, RagError, RagService};
use crate::state_machine::{Event, Phase, TurnState};
use crate::store::{Chat, InMemoryStore, Message, DEFAULT_CHAT_TITLE};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio_util::sync::CancellationToken;

/// Type alias for the manager the binary runs
pub type ProductionManager = ChatManager<InMemoryStore, LoggingService>;

/// Snapshot of a chat's turn for rendering
#[derive(Debug, Clone, PartialEq)]
pub struct TurnView {
    pub phase: Phase,
    /// Human-readable phase label, e.g. `Streaming Response...`
    pub label: &'static str,
    /// Waiting on the service with nothing new to show
    pub loading: bool,
    /// Streamed text not yet finalized into a message
    pub preview: String,
    /// Submissions are ignored while set
    pub in_flight: bool,
}

impl TurnView {
    pub fn from_state(state: &TurnState) -> Self {
        let phase = state.phase();
        Self {
            phase,
            label: phase.label(),
            loading: state.is_loading(),
            preview: state.preview().to_string(),
            in_flight: state.is_in_flight(),
        }
    }

    /// Bring the snapshot up to date with `state`.
    ///
    /// Within a turn the preview only grows, so only the new tail is copied.
    pub fn update(&mut self, state: &TurnState) {
        let phase = state.phase();
        let preview = state.preview();
        let continues = matches!(self.phase, Phase::Streaming | Phase::Scoring)
            && matches!(phase, Phase::Streaming | Phase::Scoring);
        match preview.get(self.preview.len()..) {
            Some(tail) if continues => self.preview.push_str(tail),
            _ => preview.clone_into(&mut self.preview),
        }

        self.phase = phase;
        self.label = phase.label();
        self.loading = state.is_loading();
        self.in_flight = state.is_in_flight();
    }
}

impl Default for TurnView {
    fn default() -> Self {
        Self::from_state(&TurnState::Idle)
    }
}

/// Discrete notifications for the view layer
#[derive(Debug, Clone)]
pub enum ViewEvent {
    MessageAppended { message: Message },
    /// The turn ended without an answer; shown once per failed turn
    TurnFailed { error: RagError },
    TurnCompleted { similar_queries: Vec<String> },
    /// Store failure while executing the turn
    Error { message: String },
}

/// Handle to interact with a running chat
#[derive(Clone)]
pub struct ChatHandle {
    pub event_tx: mpsc::Sender<Event>,
    pub broadcast_tx: broadcast::Sender<ViewEvent>,
    pub view_rx: watch::Receiver<TurnView>,
    shutdown: CancellationToken,
}

impl ChatHandle {
    /// Submit raw composer input. Ignored while a turn is in flight.
    pub async fn submit(&self, text: impl Into<String>, tools: Vec<ToolMention>) -> Result<(), String> {
        self.event_tx
            .send(Event::UserSubmit {
                text: text.into(),
                tools,
            })
            .await
            .map_err(|e| format!("Failed to send event: {e}"))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.broadcast_tx.subscribe()
    }

    pub fn view(&self) -> TurnView {
        self.view_rx.borrow().clone()
    }

    /// Cancel the turn in flight and stop the runtime. Nothing is published afterwards.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

/// Manager for all chat runtimes
pub struct ChatManager<S, R>
where
    S: ConversationStore + 'static,
    R: RagService + 'static,
{
    store: Arc<S>,
    rag: Arc<R>,
    runtimes: RwLock<HashMap<String, ChatHandle>>,
}

impl<S, R> ChatManager<S, R>
where
    S: ConversationStore + 'static,
    R: RagService + 'static,
{
    pub fn new(store: Arc<S>, rag: Arc<R>) -> Self {
        Self {
            store,
            rag,
            runtimes: RwLock::new(HashMap::new()),
        }
    }

    // ==================== Chat Operations ====================

    pub async fn create_chat(&self) -> Result<Chat, String> {
        self.store.create_chat(DEFAULT_CHAT_TITLE).await
    }

    pub async fn list_chats(&self) -> Result<Vec<Chat>, String> {
        self.store.list_chats().await
    }

    pub async fn get_chat(&self, chat_id: &str) -> Result<Option<Chat>, String> {
        self.store.get_chat(chat_id).await
    }

    pub async fn messages(&self, chat_id: &str) -> Result<Vec<Message>, String> {
        self.store.messages(chat_id).await
    }

    pub async fn rename_chat(&self, chat_id: &str, title: &str) -> Result<(), String> {
        self.store.rename_chat(chat_id, title).await
    }

    /// Tear down the chat's runtime, then delete the chat
    pub async fn delete_chat(&self, chat_id: &str) -> Result<bool, String> {
        if let Some(handle) = self.runtimes.write().await.remove(chat_id) {
            tracing::info!(chat_id = %chat_id, "Tearing down runtime of deleted chat");
            handle.shutdown();
        }
        self.store.delete_chat(chat_id).await
    }

    // ==================== Runtime Operations ====================

    /// Get or create a runtime for a chat
    pub async fn get_or_create(&self, chat_id: &str) -> Result<ChatHandle, String> {
        // Check if already running
        {
            let runtimes = self.runtimes.read().await;
            if let Some(handle) = runtimes.get(chat_id) {
                if !handle.is_shut_down() {
                    return Ok(handle.clone());
                }
            }
        }

        if self.store.get_chat(chat_id).await?.is_none() {
            return Err(format!("Chat not found: {chat_id}"));
        }

        let mut runtimes = self.runtimes.write().await;
        // Another caller may have started it while we were checking the store
        if let Some(handle) = runtimes.get(chat_id) {
            if !handle.is_shut_down() {
                return Ok(handle.clone());
            }
        }

        let (event_tx, event_rx) = mpsc::channel(64);
        let (broadcast_tx, _) = broadcast::channel(256);
        let (view_tx, view_rx) = watch::channel(TurnView::default());
        let shutdown = CancellationToken::new();

        let runtime = ChatRuntime::new(
            chat_id,
            self.store.clone(),
            self.rag.clone(),
            event_rx,
            event_tx.clone(),
            broadcast_tx.clone(),
            view_tx,
            shutdown.clone(),
        );

        // Start runtime in background
        let id = chat_id.to_string();
        tokio::spawn(async move {
            runtime.run().await;
            tracing::debug!(chat_id = %id, "Chat runtime finished");
        });

        let handle = ChatHandle {
            event_tx,
            broadcast_tx,
            view_rx,
            shutdown,
        };
        runtimes.insert(chat_id.to_string(), handle.clone());

        Ok(handle)
    }

    /// Submit input to a chat
    #[allow(dead_code)] // Used in tests
    pub async fn submit(&self, chat_id: &str, text: &str, tools: Vec<ToolMention>) -> Result<(), String> {
        self.get_or_create(chat_id).await?.submit(text, tools).await
    }

    /// Stop every runtime
    pub async fn shutdown_all(&self) {
        for (chat_id, handle) in self.runtimes.write().await.drain() {
            tracing::debug!(chat_id = %chat_id, "Stopping chat runtime");
            handle.shutdown();
        }
    }
}
