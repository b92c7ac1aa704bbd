//! MCP session driver
//!
//! A session owns its transport and walks the protocol lifecycle: handshake
//! (`initialize` + the initialized notification), then tool listing and
//! invocation. Every call funnels through one JSON-RPC round trip that
//! unwraps the result envelope, so the per-method code is just typed
//! decoding.

use serde_json::Value;
use tracing::debug;

use crate::error::McpError;
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId, methods};
use crate::transport::Transport;
use crate::{McpTool, PROTOCOL_VERSION, ServerCapabilities, ToolCallResult};

/// Identity this engine advertises during the handshake
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    pub name: String,
    pub version: String,
}

/// What the server reported about itself at initialize time
#[derive(Debug, Clone)]
pub struct ServerIdentity {
    pub name: String,
    pub version: String,
    pub capabilities: ServerCapabilities,
}

/// A connected MCP session
pub struct McpSession<T: Transport> {
    transport: T,
    next_id: u64,
    server: Option<ServerIdentity>,
}

impl<T: Transport> McpSession<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            next_id: 0,
            server: None,
        }
    }

    /// The server identity, once the handshake has run
    pub fn server(&self) -> Option<&ServerIdentity> {
        self.server.as_ref()
    }

    /// Run the capability handshake
    pub async fn initialize(&mut self, client: ClientIdentity) -> Result<ServerIdentity, McpError> {
        let params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": client.name,
                "version": client.version
            }
        });

        let result = self.rpc(methods::INITIALIZE, Some(params)).await?;
        let reported: InitializeResult = serde_json::from_value(result)?;

        // The handshake completes once the client confirms
        let confirmation = JsonRpcNotification::new(methods::INITIALIZED);
        self.transport
            .notify(serde_json::to_value(&confirmation)?)
            .await?;

        let identity = ServerIdentity {
            name: reported.server_info.name,
            version: reported.server_info.version,
            capabilities: reported.capabilities,
        };
        debug!(server = %identity.name, "mcp handshake complete");
        self.server = Some(identity.clone());
        Ok(identity)
    }

    /// Tools the server advertises
    pub async fn list_tools(&mut self) -> Result<Vec<McpTool>, McpError> {
        let result = self.rpc(methods::TOOLS_LIST, None).await?;
        if result.is_null() {
            return Ok(Vec::new());
        }
        let listing: ToolListing = serde_json::from_value(result)?;
        Ok(listing.tools)
    }

    /// Invoke one tool by name
    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: Value,
    ) -> Result<ToolCallResult, McpError> {
        let params = serde_json::json!({
            "name": name,
            "arguments": arguments
        });
        let result = self.rpc(methods::TOOLS_CALL, Some(params)).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Liveness check; servers answer with an empty result
    pub async fn ping(&mut self) -> Result<(), McpError> {
        self.rpc(methods::PING, None).await.map(|_| ())
    }

    /// Tear down the underlying transport
    pub async fn shutdown(&mut self) -> Result<(), McpError> {
        self.transport.shutdown().await
    }

    /// One JSON-RPC round trip, with the result envelope unwrapped
    async fn rpc(&mut self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        self.next_id += 1;
        let mut request = JsonRpcRequest::new(RequestId::Number(self.next_id as i64), method);
        if let Some(params) = params {
            request = request.with_params(params);
        }

        let raw = self.transport.exchange(serde_json::to_value(&request)?).await?;
        let reply: JsonRpcResponse = serde_json::from_value(raw)?;

        if let Some(error) = reply.error {
            return Err(McpError::Rejected {
                method: method.to_string(),
                code: error.code,
                message: error.message,
            });
        }
        Ok(reply.result.unwrap_or(Value::Null))
    }
}

#[derive(Debug, serde::Deserialize)]
struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    #[allow(dead_code)]
    protocol_version: String,
    #[serde(default)]
    capabilities: ServerCapabilities,
    #[serde(rename = "serverInfo")]
    server_info: ReportedServer,
}

#[derive(Debug, serde::Deserialize)]
struct ReportedServer {
    name: String,
    #[serde(default)]
    version: String,
}

#[derive(Debug, serde::Deserialize)]
struct ToolListing {
    #[serde(default)]
    tools: Vec<McpTool>,
}
