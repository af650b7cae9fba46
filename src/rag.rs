//! RAG service abstraction
//!
//! The three remote calls one chat turn makes: context building, answer
//! streaming and relevance scoring.

mod client;
mod error;
mod history;
mod types;

pub use client::HttpRagService;
pub use error::RagError;
#[cfg(test)]
pub use error::RagErrorKind;
pub use history::qa_pairs;
pub use types::*;

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;

/// Raw `data` payloads of the answer stream, in arrival order
pub type ChunkStream = BoxStream<'static, Result<String, RagError>>;

/// Common interface for the retrieval-augmented generation service
#[async_trait]
pub trait RagService: Send + Sync {
    /// Rewrite the query into a standalone one and retrieve its context
    async fn build_context(
        &self,
        request: &BuildContextRequest,
    ) -> Result<BuildContextResponse, RagError>;

    /// Open the answer stream. The returned stream ends on normal close.
    async fn open_stream(&self, request: &StreamRequest) -> Result<ChunkStream, RagError>;

    /// Score a finished answer against the standalone query
    async fn evaluate_response(
        &self,
        request: &EvaluateRequest,
    ) -> Result<EvaluateResponse, RagError>;

    /// Identifier sent as `userId` with every request
    fn user_id(&self) -> &str;
}

#[async_trait]
impl<T: RagService + ?Sized> RagService for Arc<T> {
    async fn build_context(
        &self,
        request: &BuildContextRequest,
    ) -> Result<BuildContextResponse, RagError> {
        (**self).build_context(request).await
    }

    async fn open_stream(&self, request: &StreamRequest) -> Result<ChunkStream, RagError> {
        (**self).open_stream(request).await
    }

    async fn evaluate_response(
        &self,
        request: &EvaluateRequest,
    ) -> Result<EvaluateResponse, RagError> {
        (**self).evaluate_response(request).await
    }

    fn user_id(&self) -> &str {
        (**self).user_id()
    }
}

/// Logging wrapper for RAG services
pub struct LoggingService {
    inner: Arc<dyn RagService>,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn RagService>) -> Self {
        Self { inner }
    }
}

fn log_failure(endpoint: &str, duration: std::time::Duration, error: &RagError) {
    tracing::error!(
        endpoint,
        duration_ms = %duration.as_millis(),
        kind = %error.kind,
        status = ?error.status,
        error = %error.message,
        "RAG request failed"
    );
}

#[async_trait]
impl RagService for LoggingService {
    async fn build_context(
        &self,
        request: &BuildContextRequest,
    ) -> Result<BuildContextResponse, RagError> {
        let start = std::time::Instant::now();
        let result = self.inner.build_context(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::info!(
                    endpoint = "build_context",
                    duration_ms = %duration.as_millis(),
                    history_pairs = request.chats.len(),
                    tools = ?request.tools,
                    rewritten = response.stand_alone_query != response.query,
                    docs = response.docs.len(),
                    references = response.references.len(),
                    "Context built"
                );
            }
            Err(e) => log_failure("build_context", duration, e),
        }

        result
    }

    async fn open_stream(&self, request: &StreamRequest) -> Result<ChunkStream, RagError> {
        let start = std::time::Instant::now();
        let result = self.inner.open_stream(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(_) => {
                tracing::info!(
                    endpoint = "stream",
                    duration_ms = %duration.as_millis(),
                    context_len = request.context.len(),
                    "Answer stream opened"
                );
            }
            Err(e) => log_failure("stream", duration, e),
        }

        result
    }

    async fn evaluate_response(
        &self,
        request: &EvaluateRequest,
    ) -> Result<EvaluateResponse, RagError> {
        let start = std::time::Instant::now();
        let result = self.inner.evaluate_response(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::info!(
                    endpoint = "evaluate_response",
                    duration_ms = %duration.as_millis(),
                    score = response.response_score,
                    similar_queries = response.similar_queries.len(),
                    "Response evaluated"
                );
            }
            Err(e) => log_failure("evaluate_response", duration, e),
        }

        result
    }

    fn user_id(&self) -> &str {
        self.inner.user_id()
    }
}
