//! Wire types for the RAG service endpoints
//!
//! Field names are part of the service contract and must not change.

use crate::store::References;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One answered exchange from the chat history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

/// Body of `POST /build_context`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildContextRequest {
    pub query: String,
    pub chats: Vec<QaPair>,
    #[serde(rename = "userId")]
    pub user_id: String,
    pub tools: Vec<String>,
}

/// Response of `POST /build_context`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BuildContextResponse {
    #[serde(default)]
    pub query: String,
    pub stand_alone_query: String,
    #[serde(default)]
    pub docs: Vec<Map<String, Value>>,
    #[serde(default)]
    pub references: References,
    pub context: String,
    #[allow(dead_code)] // Echo of the request's userId
    #[serde(rename = "userId", default)]
    pub user_id: String,
}

/// Body of `POST /stream`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamRequest {
    pub query: String,
    pub context: String,
    #[serde(rename = "userId")]
    pub user_id: String,
}

/// Body of `POST /evaluate_response`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluateRequest {
    pub stand_alone_query: String,
    pub answer: String,
    #[serde(rename = "userId")]
    pub user_id: String,
}

/// Response of `POST /evaluate_response`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EvaluateResponse {
    #[serde(default)]
    pub similar_queries: Vec<String>,
    pub response_score: f64,
    #[allow(dead_code)] // Echo of the request's userId
    #[serde(rename = "userId", default)]
    pub user_id: String,
}
