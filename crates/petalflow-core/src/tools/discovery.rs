//! MCP discovery
//!
//! Builds a manifest from a live MCP server: initialize, tools/list, then
//! convert each advertised tool into an action with typed ports. The
//! service merges the registration's overlay over the result and re-runs
//! manifest validation before anything is persisted.

use std::time::Duration;
use tracing::debug;

use petalflow_mcp::{
    ClientIdentity, HttpTransport, McpSession, McpTool, StdioTransport, Transport,
};

use crate::error::{Error, Result};
use crate::registry::{PortDef, PortType};
use crate::tools::ToolRegistration;
use crate::tools::manifest::{ActionSpec, MANIFEST_VERSION, ToolManifest};

/// Discover a fresh manifest from the registration's MCP server
///
/// The transport block of the existing manifest tells us how to reach the
/// server and is carried over into the result; everything else is rebuilt
/// from what the server advertises.
pub async fn discover_manifest(
    registration: &ToolRegistration,
    timeout: Duration,
) -> Result<ToolManifest> {
    let transport = &registration.manifest.transport;

    let discovery = async {
        if let Some(command) = &transport.command {
            let stdio = StdioTransport::spawn(command, &transport.args, &transport.env)
                .await
                .map_err(|e| Error::Transport {
                    message: format!("failed to start MCP server: {}", e),
                    retryable: false,
                })?;
            let mut session = McpSession::new(stdio);
            let result = discover_with(&mut session, registration).await;
            let _ = session.shutdown().await;
            result
        } else if let Some(endpoint) = &transport.endpoint {
            let mut session = McpSession::new(HttpTransport::new(endpoint));
            discover_with(&mut session, registration).await
        } else {
            Err(Error::Transport {
                message: "mcp transport has neither command nor endpoint".to_string(),
                retryable: false,
            })
        }
    };

    match tokio::time::timeout(timeout, discovery).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(timeout.as_secs())),
    }
}

async fn discover_with<T: Transport>(
    session: &mut McpSession<T>,
    registration: &ToolRegistration,
) -> Result<ToolManifest> {
    let server = session
        .initialize(ClientIdentity {
            name: "petalflow".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
        .await
        .map_err(|e| Error::Transport {
            message: format!("MCP initialize failed: {}", e),
            retryable: true,
        })?;

    let tools = session.list_tools().await.map_err(|e| Error::Transport {
        message: format!("MCP tools/list failed: {}", e),
        retryable: true,
    })?;
    debug!(tool = %registration.name, count = tools.len(), "mcp discovery complete");

    let mut manifest = ToolManifest {
        manifest_version: MANIFEST_VERSION.to_string(),
        transport: registration.manifest.transport.clone(),
        ..Default::default()
    };
    manifest.tool.name = registration.name.clone();
    manifest.tool.version = server.version;
    manifest.tool.description = registration.manifest.tool.description.clone();

    for tool in tools {
        let (name, action) = action_from_tool(&tool);
        manifest.actions.insert(name, action);
    }

    Ok(manifest)
}

/// Convert one advertised MCP tool into an action spec
fn action_from_tool(tool: &McpTool) -> (String, ActionSpec) {
    // Server names may carry dashes; action names are identifiers
    let name = tool.name.replace('-', "_").to_lowercase();

    let outputs = match &tool.output_schema {
        Some(schema) => ports_from_schema(schema),
        None => vec![PortDef::new("output", PortType::Object)],
    };

    let action = ActionSpec {
        inputs: ports_from_schema(&tool.input_schema),
        outputs,
        description: tool.description.clone(),
        llm_callable: Some(true),
        mode: None,
    };
    (name, action)
}

/// Flatten a JSON schema object into typed ports
fn ports_from_schema(schema: &serde_json::Value) -> Vec<PortDef> {
    let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) else {
        return Vec::new();
    };
    let required: Vec<&str> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    // BTreeMap-sorted for deterministic port order
    let mut names: Vec<&String> = properties.keys().collect();
    names.sort();

    names
        .into_iter()
        .map(|name| {
            let port_type = properties[name]
                .get("type")
                .and_then(|t| t.as_str())
                .map(port_type_from_json)
                .unwrap_or(PortType::Any);
            let mut port = PortDef::new(name, port_type);
            if required.contains(&name.as_str()) {
                port = port.required();
            }
            port
        })
        .collect()
}

fn port_type_from_json(json_type: &str) -> PortType {
    match json_type {
        "string" => PortType::String,
        "number" | "integer" => PortType::Number,
        "boolean" => PortType::Boolean,
        "object" | "array" => PortType::Object,
        _ => PortType::Any,
    }
}
