//! Chat runtime executor

use super::traits::ConversationStore;
use super::{TurnView, ViewEvent};

use crate::rag::{qa_pairs, BuildContextRequest, EvaluateRequest, RagError, RagService, StreamRequest};
use crate::state_machine::{step, Effect, Event, TransitionError, TurnContext, TurnState};
use futures::StreamExt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Drives one chat's turns: applies events to the state machine and executes
/// the resulting effects against the store and the RAG service
pub struct ChatRuntime<S, R>
where
    S: ConversationStore + 'static,
    R: RagService + 'static,
{
    chat_id: String,
    state: TurnState,
    store: Arc<S>,
    rag: Arc<R>,
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<ViewEvent>,
    view_tx: watch::Sender<TurnView>,
    /// Cancels the I/O of the turn in flight; a child of `shutdown`
    turn_cancel: Option<CancellationToken>,
    shutdown: CancellationToken,
}

impl<S, R> ChatRuntime<S, R>
where
    S: ConversationStore + 'static,
    R: RagService + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chat_id: impl Into<String>,
        store: Arc<S>,
        rag: Arc<R>,
        event_rx: mpsc::Receiver<Event>,
        event_tx: mpsc::Sender<Event>,
        broadcast_tx: broadcast::Sender<ViewEvent>,
        view_tx: watch::Sender<TurnView>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            chat_id: chat_id.into(),
            state: TurnState::Idle,
            store,
            rag,
            event_rx,
            event_tx,
            broadcast_tx,
            view_tx,
            turn_cancel: None,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(chat_id = %self.chat_id, "Starting chat runtime");

        loop {
            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => {
                    if let Some(token) = self.turn_cancel.take() {
                        tracing::info!(chat_id = %self.chat_id, phase = ?self.state.phase(), "Abandoning turn in flight");
                        token.cancel();
                    }
                    break;
                }

                Some(event) = self.event_rx.recv() => {
                    self.process_event(event).await;
                }

                else => break,
            }
        }

        tracing::info!(chat_id = %self.chat_id, "Chat runtime stopped");
    }

    async fn process_event(&mut self, event: Event) {
        let name = event.name();

        let from = self.state.phase();
        let result = match step(std::mem::take(&mut self.state), event) {
            Ok(r) => r,
            Err(rejected) => {
                self.state = *rejected.state;
                match rejected.error {
                    e @ (TransitionError::TurnInFlight | TransitionError::EmptyInput) => {
                        tracing::debug!(chat_id = %self.chat_id, event = name, reason = %e, "Ignoring submission");
                    }
                    e @ TransitionError::InvalidTransition(_) => {
                        tracing::warn!(chat_id = %self.chat_id, event = name, error = %e, "Rejected event");
                    }
                }
                return;
            }
        };

        self.state = result.new_state;
        if from != self.state.phase() {
            tracing::debug!(
                chat_id = %self.chat_id,
                event = name,
                from = ?from,
                to = ?self.state.phase(),
                "Phase changed"
            );
            if let TurnState::Streaming { context, .. } = &self.state {
                tracing::debug!(
                    chat_id = %self.chat_id,
                    tools = ?context.source_tool_ids,
                    references = context.references.len(),
                    "Context ready"
                );
            }
        }

        for effect in result.effects {
            if let Err(e) = self.execute_effect(effect).await {
                tracing::error!(chat_id = %self.chat_id, error = %e, "Effect failed");
                self.publish(ViewEvent::Error { message: e });
            }
        }
    }

    #[allow(clippy::too_many_lines)]
    async fn execute_effect(&mut self, effect: Effect) -> Result<(), String> {
        match effect {
            Effect::AppendMessage { message } => {
                self.store
                    .append_message(&self.chat_id, message.clone())
                    .await?;
                self.publish(ViewEvent::MessageAppended { message });
                Ok(())
            }

            Effect::BuildContext { query, tool_ids } => {
                let token = self.shutdown.child_token();
                self.turn_cancel = Some(token.clone());

                let store = self.store.clone();
                let rag = self.rag.clone();
                let chat_id = self.chat_id.clone();
                let event_tx = self.event_tx.clone();

                spawn_turn_task(token, "context request", async move {
                    let history = match store.messages(&chat_id).await {
                        Ok(messages) => qa_pairs(&messages),
                        Err(e) => {
                            let error = RagError::context_build(format!("Failed to load history: {e}"));
                            let _ = event_tx.send(Event::ContextFailed { error }).await;
                            return;
                        }
                    };

                    let request = BuildContextRequest {
                        query,
                        chats: history,
                        user_id: rag.user_id().to_string(),
                        tools: tool_ids.clone(),
                    };

                    let event = match rag.build_context(&request).await {
                        Ok(response) => Event::ContextBuilt {
                            context: TurnContext {
                                stand_alone_query: response.stand_alone_query,
                                context_text: response.context,
                                references: response.references,
                                source_tool_ids: tool_ids,
                            },
                        },
                        Err(error) => Event::ContextFailed { error },
                    };
                    let _ = event_tx.send(event).await;
                });
                Ok(())
            }

            Effect::OpenStream { query, context } => {
                let token = self.turn_token();
                let rag = self.rag.clone();
                let event_tx = self.event_tx.clone();

                spawn_turn_task(token, "answer stream", async move {
                    let request = StreamRequest {
                        query,
                        context,
                        user_id: rag.user_id().to_string(),
                    };

                    let mut chunks = match rag.open_stream(&request).await {
                        Ok(chunks) => chunks,
                        Err(error) => {
                            let _ = event_tx.send(Event::StreamFailed { error }).await;
                            return;
                        }
                    };

                    // Forward in arrival order; the runtime applies them one at a time
                    while let Some(chunk) = chunks.next().await {
                        let event = match chunk {
                            Ok(data) => Event::StreamChunk { data },
                            Err(error) => {
                                let _ = event_tx.send(Event::StreamFailed { error }).await;
                                return;
                            }
                        };
                        if event_tx.send(event).await.is_err() {
                            return;
                        }
                    }

                    let _ = event_tx.send(Event::StreamClosed).await;
                });
                Ok(())
            }

            Effect::ScoreResponse {
                stand_alone_query,
                answer,
            } => {
                let token = self.turn_token();
                let rag = self.rag.clone();
                let event_tx = self.event_tx.clone();

                spawn_turn_task(token, "scoring request", async move {
                    let request = EvaluateRequest {
                        stand_alone_query,
                        answer,
                        user_id: rag.user_id().to_string(),
                    };

                    let event = match rag.evaluate_response(&request).await {
                        Ok(response) => Event::ScoreReceived {
                            score: response.response_score,
                            similar_queries: response.similar_queries,
                        },
                        Err(error) => Event::ScoringFailed { error },
                    };
                    let _ = event_tx.send(event).await;
                });
                Ok(())
            }

            Effect::PublishView => {
                if !self.shutdown.is_cancelled() {
                    let state = &self.state;
                    self.view_tx.send_modify(|view| view.update(state));
                }
                Ok(())
            }

            Effect::NotifyFailure { error } => {
                self.turn_cancel = None;
                tracing::error!(
                    chat_id = %self.chat_id,
                    kind = %error.kind,
                    status = ?error.status,
                    error = %error.message,
                    "Turn failed"
                );
                self.publish(ViewEvent::TurnFailed { error });
                Ok(())
            }

            Effect::NotifyTurnComplete { similar_queries } => {
                self.turn_cancel = None;
                tracing::info!(
                    chat_id = %self.chat_id,
                    similar_queries = similar_queries.len(),
                    "Turn complete"
                );
                self.publish(ViewEvent::TurnCompleted { similar_queries });
                Ok(())
            }
        }
    }

    /// Token of the turn in flight, created on demand
    fn turn_token(&mut self) -> CancellationToken {
        self.turn_cancel
            .get_or_insert_with(|| self.shutdown.child_token())
            .clone()
    }

    fn publish(&self, event: ViewEvent) {
        if self.shutdown.is_cancelled() {
            return;
        }
        // No receivers is fine
        let _ = self.broadcast_tx.send(event);
    }
}

/// Run a turn's I/O in the background, abandoning it when the turn is cancelled
fn spawn_turn_task<F>(token: CancellationToken, what: &'static str, work: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            biased;

            () = token.cancelled() => {
                tracing::debug!(task = what, "Turn cancelled");
            }

            () = work => {}
        }
    });
}
