//! MCP transports
//!
//! A transport carries one JSON-RPC exchange at a time: `exchange` sends a
//! request and blocks until its reply arrives, `notify` fires a message
//! that expects no reply. Sessions stay transport-agnostic; picking stdio
//! vs HTTP happens where the tool's manifest is known.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::error::McpError;

/// One-request-at-a-time JSON-RPC carrier
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and wait for its reply
    async fn exchange(&mut self, request: Value) -> Result<Value, McpError>;

    /// Fire a notification; no reply expected
    async fn notify(&mut self, message: Value) -> Result<(), McpError>;

    /// Tear down the connection
    async fn shutdown(&mut self) -> Result<(), McpError>;
}

/// Subprocess transport: newline-framed JSON on stdin/stdout
///
/// The server's stderr is inherited so its logs stay visible. Server-
/// initiated notifications (frames without an `id`) are drained and
/// dropped while waiting for a reply; nothing in this engine subscribes
/// to them.
pub struct StdioTransport {
    child: Child,
    stdin: ChildStdin,
    replies: Lines<BufReader<ChildStdout>>,
}

impl StdioTransport {
    pub async fn spawn(
        command: &str,
        args: &[String],
        env: &BTreeMap<String, String>,
    ) -> Result<Self, McpError> {
        let mut child = Command::new(command)
            .args(args)
            .envs(env)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take().ok_or(McpError::Disconnected)?;
        let stdout = child.stdout.take().ok_or(McpError::Disconnected)?;

        Ok(Self {
            child,
            stdin,
            replies: BufReader::new(stdout).lines(),
        })
    }

    /// Whether the child process is still running
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    async fn write_frame(&mut self, message: &Value) -> Result<(), McpError> {
        let mut frame = serde_json::to_vec(message)?;
        frame.push(b'\n');
        self.stdin.write_all(&frame).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    /// Next reply frame, skipping server-initiated notifications
    async fn read_reply(&mut self) -> Result<Value, McpError> {
        while let Some(line) = self.replies.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let frame: Value = serde_json::from_str(&line)?;
            if frame.get("id").is_some() {
                return Ok(frame);
            }
        }
        Err(McpError::Disconnected)
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn exchange(&mut self, request: Value) -> Result<Value, McpError> {
        self.write_frame(&request).await?;
        self.read_reply().await
    }

    async fn notify(&mut self, message: Value) -> Result<(), McpError> {
        self.write_frame(&message).await
    }

    async fn shutdown(&mut self) -> Result<(), McpError> {
        self.child.kill().await?;
        Ok(())
    }
}

/// HTTP transport: each exchange is one POST, the response body is the reply
pub struct HttpTransport {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }

    async fn post(&self, message: &Value) -> Result<reqwest::Response, McpError> {
        self.client
            .post(&self.endpoint)
            .json(message)
            .send()
            .await
            .map_err(|e| McpError::Http(e.to_string()))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn exchange(&mut self, request: Value) -> Result<Value, McpError> {
        let response = self.post(&request).await?;
        response
            .json()
            .await
            .map_err(|e| McpError::Http(e.to_string()))
    }

    async fn notify(&mut self, message: Value) -> Result<(), McpError> {
        self.post(&message).await?;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), McpError> {
        Ok(())
    }
}
