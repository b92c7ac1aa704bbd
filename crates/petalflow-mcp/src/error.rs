//! Error type shared by transports and sessions

use thiserror::Error;

/// Failures surfaced by MCP transports and sessions
#[derive(Debug, Error)]
pub enum McpError {
    #[error("i/o failure talking to the MCP server: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed JSON-RPC payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The server answered with a JSON-RPC error object
    #[error("server rejected '{method}' ({code}): {message}")]
    Rejected {
        method: String,
        code: i64,
        message: String,
    },

    #[error("connection closed by the MCP server")]
    Disconnected,

    #[error("http exchange failed: {0}")]
    Http(String),
}

impl McpError {
    /// Whether retrying the same call could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, McpError::Io(_) | McpError::Http(_) | McpError::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_display_names_the_method() {
        let error = McpError::Rejected {
            method: "tools/call".to_string(),
            code: -32601,
            message: "unknown tool".to_string(),
        };
        let text = error.to_string();
        assert!(text.contains("tools/call"));
        assert!(text.contains("-32601"));
        assert!(text.contains("unknown tool"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(McpError::Disconnected.is_retryable());
        assert!(
            !McpError::Rejected {
                method: "ping".to_string(),
                code: -1,
                message: "no".to_string()
            }
            .is_retryable()
        );
    }
}
