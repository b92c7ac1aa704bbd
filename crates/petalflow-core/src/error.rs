//! Error types for PetalFlow Core

use thiserror::Error;

use crate::diagnostics::Diagnostic;

/// Result type alias using PetalFlow Error
pub type Result<T> = std::result::Result<T, Error>;

/// PetalFlow error types
#[derive(Error, Debug)]
pub enum Error {
    /// The compiler hit an invariant the workflow validator should have caught
    #[error("Compile error: {0}")]
    Compile(String),

    /// A tool registration failed validation; carries per-field diagnostics
    #[error("Registration validation failed: {}", format_diagnostics(.0))]
    Registration(Vec<Diagnostic>),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Transport error: {message}")]
    Transport { message: String, retryable: bool },

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Store error: {0}")]
    Store(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yml::Error),
}

impl Error {
    /// Transport errors may be retried by the caller; nothing else is
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport { retryable: true, .. })
    }
}

fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| format!("{}: {}", d.code, d.message))
        .collect::<Vec<_>>()
        .join("; ")
}
