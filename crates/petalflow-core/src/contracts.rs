//! Contracts for external collaborators
//!
//! The runtime executor, provider adapters, and approval frontends live
//! outside this crate; the core only defines what it expects of them. The
//! compiler emits node configs that an `LlmClient` implementation consumes,
//! and `human` nodes block on a `HumanHandler`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;

/// A chat message in a completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `system`, `user`, `assistant`, or `tool`
    pub role: String,
    pub content: String,
}

/// Completion request assembled by the runtime from an LLM node's config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub provider: String,
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// Inline tool references the model may call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Completion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

/// Contract for LLM provider adapters
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Provider id, e.g. `anthropic`
    fn name(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;
}

/// A pending human-approval request from a `human` node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanRequest {
    pub node_id: String,
    /// The upstream output awaiting approval
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

/// Decision returned by the approval frontend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanResponse {
    pub approved: bool,
    /// Optional replacement payload when the reviewer edits the output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Contract for human-in-the-loop frontends
#[async_trait]
pub trait HumanHandler: Send + Sync {
    async fn request(&self, request: HumanRequest) -> Result<HumanResponse>;
}
