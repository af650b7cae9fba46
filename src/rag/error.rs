//! RAG service error types

use thiserror::Error;

/// Remote call failure with classification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RagError {
    pub kind: RagErrorKind,
    pub message: String,
    /// HTTP status, when the service answered at all
    pub status: Option<u16>,
}

impl RagError {
    pub fn new(kind: RagErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn context_build(message: impl Into<String>) -> Self {
        Self::new(RagErrorKind::ContextBuild, message)
    }

    pub fn stream(message: impl Into<String>) -> Self {
        Self::new(RagErrorKind::Stream, message)
    }

    pub fn scoring(message: impl Into<String>) -> Self {
        Self::new(RagErrorKind::Scoring, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(RagErrorKind::Network, message)
    }
}

/// Which part of the turn failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RagErrorKind {
    /// `/build_context` answered non-2xx or with an unreadable body
    ContextBuild,
    /// `/stream` refused, or the stream broke after opening
    Stream,
    /// `/evaluate_response` answered non-2xx or with an unreadable body
    Scoring,
    /// Request never reached the service
    Network,
}

impl RagErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ContextBuild => "context_build",
            Self::Stream => "stream",
            Self::Scoring => "scoring",
            Self::Network => "network",
        }
    }
}

impl std::fmt::Display for RagErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
