//! HTTP client for the RAG service
//!
//! `/build_context` and `/evaluate_response` are plain JSON calls;
//! `/stream` is a server-sent-events response whose `data` fields are
//! answer chunks.

use super::{
    BuildContextRequest, BuildContextResponse, ChunkStream, EvaluateRequest, EvaluateResponse,
    RagError, RagService, StreamRequest,
};
use crate::config::ClientConfig;
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

const EVENT_STREAM_MIME: &str = "text/event-stream";

/// RAG service reached over HTTP
pub struct HttpRagService {
    client: Client,
    config: ClientConfig,
}

impl HttpRagService {
    pub fn new(config: ClientConfig) -> Result<Self, RagError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| RagError::network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn post_json<B, T>(
        &self,
        path: &str,
        body: &B,
        failure: fn(String) -> RagError,
    ) -> Result<T, RagError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.config.endpoint(path))
            .timeout(self.config.request_timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(path, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(failure(format!("/{path} returned {status}: {body}"))
                .with_status(status.as_u16()));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| failure(format!("Invalid /{path} response: {e}")))
    }
}

fn transport_error(path: &str, error: &reqwest::Error) -> RagError {
    if error.is_timeout() {
        RagError::network(format!("/{path} timed out: {error}"))
    } else {
        RagError::network(format!("Failed to reach /{path}: {error}"))
    }
}

#[async_trait]
impl RagService for HttpRagService {
    async fn build_context(
        &self,
        request: &BuildContextRequest,
    ) -> Result<BuildContextResponse, RagError> {
        self.post_json("build_context", request, RagError::context_build)
            .await
    }

    async fn open_stream(&self, request: &StreamRequest) -> Result<ChunkStream, RagError> {
        let response = self
            .client
            .post(self.config.endpoint("stream"))
            .header(ACCEPT, EVENT_STREAM_MIME)
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error("stream", &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::stream(format!("/stream returned {status}: {body}"))
                .with_status(status.as_u16()));
        }

        if let Some(content_type) = response.headers().get(CONTENT_TYPE) {
            let content_type = content_type.to_str().unwrap_or_default();
            if !content_type.starts_with(EVENT_STREAM_MIME) {
                return Err(RagError::stream(format!(
                    "Expected {EVENT_STREAM_MIME} from /stream, got {content_type}"
                )));
            }
        }

        let idle_timeout = self.config.stream_idle_timeout;
        let events = response.bytes_stream().eventsource();

        // Yields each event's data until the server closes; the first
        // transport error or idle timeout ends the stream after reporting it.
        let chunks = futures::stream::unfold(Some(events), move |events| async move {
            let mut events = events?;
            match tokio::time::timeout(idle_timeout, events.next()).await {
                Ok(Some(Ok(event))) => Some((Ok(event.data), Some(events))),
                Ok(Some(Err(e))) => Some((Err(RagError::stream(format!("SSE stream error: {e}"))), None)),
                Ok(None) => None,
                Err(_) => Some((
                    Err(RagError::stream(format!(
                        "SSE stream idle for {}s",
                        idle_timeout.as_secs()
                    ))),
                    None,
                )),
            }
        });

        Ok(chunks.boxed())
    }

    async fn evaluate_response(
        &self,
        request: &EvaluateRequest,
    ) -> Result<EvaluateResponse, RagError> {
        let mut response: EvaluateResponse = self
            .post_json("evaluate_response", request, RagError::scoring)
            .await?;

        if !response.response_score.is_finite() {
            return Err(RagError::scoring(format!(
                "Invalid response_score: {}",
                response.response_score
            )));
        }

        let clamped = response.response_score.clamp(0.0, 1.0);
        if (clamped - response.response_score).abs() > f64::EPSILON {
            tracing::warn!(score = response.response_score, "Relevance score outside [0, 1], clamping");
        }
        response.response_score = clamped;
        Ok(response)
    }

    fn user_id(&self) -> &str {
        &self.config.user_id
    }
}
