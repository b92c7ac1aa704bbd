//! Tool adapter contracts
//!
//! Adapters carry the actual transport to a tool (HTTP call, subprocess
//! exchange, MCP tools/call). The service resolves them through an
//! `AdapterFactory`, invokes, and always closes them afterwards. Adapter
//! implementations live outside the core; only the contracts are here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::tools::ToolRegistration;

/// One action invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeRequest {
    pub tool: String,
    pub action: String,
    pub inputs: serde_json::Value,
    /// Stored config, with real secret values
    #[serde(default)]
    pub config: BTreeMap<String, String>,
}

/// Successful invocation result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeResult {
    pub outputs: serde_json::Value,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub duration_ms: u64,
}

/// Failure classification for invocations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvokeErrorCode {
    Transport,
    Timeout,
    Validation,
    NotFound,
}

/// Structured invocation error
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[error("{code:?}: {message}")]
pub struct InvokeError {
    pub code: InvokeErrorCode,
    pub message: String,
    pub retryable: bool,
}

impl InvokeError {
    pub fn transport(message: impl Into<String>, retryable: bool) -> Self {
        Self {
            code: InvokeErrorCode::Transport,
            message: message.into(),
            retryable,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            code: InvokeErrorCode::Timeout,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            code: InvokeErrorCode::Validation,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            code: InvokeErrorCode::NotFound,
            message: message.into(),
            retryable: false,
        }
    }

    /// HTTP status the daemon maps this failure to
    pub fn http_status(&self) -> u16 {
        match self.code {
            InvokeErrorCode::Transport => 502,
            InvokeErrorCode::Timeout => 504,
            InvokeErrorCode::Validation => 400,
            InvokeErrorCode::NotFound => 404,
        }
    }
}

/// Transport-level handle for invoking a tool's actions
#[async_trait]
pub trait ToolAdapter: Send + Sync {
    async fn invoke(&self, request: InvokeRequest) -> std::result::Result<InvokeResult, InvokeError>;

    /// Release transport resources; called once after every invocation
    async fn close(&self);
}

/// Resolves an adapter for a registration
#[async_trait]
pub trait AdapterFactory: Send + Sync {
    async fn adapter_for(&self, registration: &ToolRegistration) -> Result<Box<dyn ToolAdapter>>;
}
