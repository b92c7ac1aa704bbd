//! Health probing
//!
//! Each transport gets an appropriate probe: subprocess liveness for stdio,
//! endpoint reachability for HTTP, an initialize + tools/list ping for MCP,
//! and an explicit URL when the manifest pins the endpoint strategy. Probes
//! are cancellable (future drop) and bounded by the caller's timeout.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::debug;

use crate::tools::manifest::{HealthStrategy, TransportSpec, TransportType};
use crate::tools::{ToolRegistration, ToolStatus};

/// Outcome of one probe
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub status: ToolStatus,
    /// Failure detail when the probe did not succeed
    pub message: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    fn ready() -> Self {
        Self {
            status: ToolStatus::Ready,
            message: None,
            checked_at: Utc::now(),
        }
    }

    fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Unhealthy,
            message: Some(message.into()),
            checked_at: Utc::now(),
        }
    }
}

/// Probe a registration with the strategy its manifest implies
pub async fn probe(registration: &ToolRegistration, timeout: Duration) -> HealthReport {
    let strategy = resolve_strategy(registration);
    debug!(tool = %registration.name, ?strategy, "running health probe");

    let probe_future = run_probe(registration, strategy);
    match tokio::time::timeout(timeout, probe_future).await {
        Ok(report) => report,
        Err(_) => HealthReport::unhealthy(format!(
            "health probe timed out after {}s",
            timeout.as_secs()
        )),
    }
}

/// Manifest hint wins; otherwise the transport decides
fn resolve_strategy(registration: &ToolRegistration) -> HealthStrategy {
    if let Some(health) = &registration.manifest.health {
        return health.strategy;
    }
    match registration.manifest.transport.transport_type {
        TransportType::Stdio => HealthStrategy::Process,
        TransportType::Http => HealthStrategy::Connection,
        TransportType::Mcp => HealthStrategy::Ping,
        TransportType::Native => HealthStrategy::Process,
    }
}

async fn run_probe(registration: &ToolRegistration, strategy: HealthStrategy) -> HealthReport {
    match strategy {
        HealthStrategy::Process => probe_process(&registration.manifest.transport).await,
        HealthStrategy::Connection => {
            match &registration.manifest.transport.endpoint {
                Some(endpoint) => probe_url(endpoint).await,
                None => HealthReport::unhealthy("no transport endpoint to probe"),
            }
        }
        HealthStrategy::Endpoint => {
            let url = registration
                .manifest
                .health
                .as_ref()
                .and_then(|h| h.endpoint.as_deref());
            match url {
                Some(url) => probe_url(url).await,
                None => HealthReport::unhealthy("endpoint strategy without a health endpoint"),
            }
        }
        HealthStrategy::Ping => probe_mcp(registration).await,
    }
}

/// Native tools are in-process; stdio tools must spawn and stay up
async fn probe_process(transport: &TransportSpec) -> HealthReport {
    if transport.transport_type == TransportType::Native {
        return HealthReport::ready();
    }

    let Some(command) = &transport.command else {
        return HealthReport::unhealthy("no command configured");
    };

    let spawned = tokio::process::Command::new(command)
        .args(&transport.args)
        .envs(&transport.env)
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .kill_on_drop(true)
        .spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => return HealthReport::unhealthy(format!("failed to spawn '{}': {}", command, e)),
    };

    // Give the process a moment to fail fast on bad config
    tokio::time::sleep(Duration::from_millis(200)).await;

    let report = match child.try_wait() {
        Ok(None) => HealthReport::ready(),
        Ok(Some(status)) => {
            HealthReport::unhealthy(format!("process exited immediately with {}", status))
        }
        Err(e) => HealthReport::unhealthy(format!("failed to poll process: {}", e)),
    };

    let _ = child.kill().await;
    report
}

/// Reachability: any HTTP response below 500 counts as alive
async fn probe_url(url: &str) -> HealthReport {
    let client = reqwest::Client::new();
    match client.get(url).send().await {
        Ok(response) if response.status().is_server_error() => {
            HealthReport::unhealthy(format!("endpoint returned {}", response.status()))
        }
        Ok(_) => HealthReport::ready(),
        Err(e) => HealthReport::unhealthy(format!("endpoint unreachable: {}", e)),
    }
}

#[cfg(feature = "mcp")]
async fn probe_mcp(registration: &ToolRegistration) -> HealthReport {
    use petalflow_mcp::{ClientIdentity, HttpTransport, McpSession, StdioTransport};

    let transport = &registration.manifest.transport;
    let identity = ClientIdentity {
        name: "petalflow".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    if let Some(command) = &transport.command {
        let stdio = match StdioTransport::spawn(command, &transport.args, &transport.env).await {
            Ok(stdio) => stdio,
            Err(e) => {
                return HealthReport::unhealthy(format!("failed to start MCP server: {}", e));
            }
        };
        let mut session = McpSession::new(stdio);
        let report = mcp_handshake(&mut session, identity).await;
        let _ = session.shutdown().await;
        report
    } else if let Some(endpoint) = &transport.endpoint {
        let mut session = McpSession::new(HttpTransport::new(endpoint));
        mcp_handshake(&mut session, identity).await
    } else {
        HealthReport::unhealthy("mcp transport has neither command nor endpoint")
    }
}

#[cfg(feature = "mcp")]
async fn mcp_handshake<T: petalflow_mcp::Transport>(
    session: &mut petalflow_mcp::McpSession<T>,
    identity: petalflow_mcp::ClientIdentity,
) -> HealthReport {
    if let Err(e) = session.initialize(identity).await {
        return HealthReport::unhealthy(format!("MCP initialize failed: {}", e));
    }
    match session.list_tools().await {
        Ok(_) => HealthReport::ready(),
        Err(e) => HealthReport::unhealthy(format!("MCP tools/list failed: {}", e)),
    }
}

#[cfg(not(feature = "mcp"))]
async fn probe_mcp(_registration: &ToolRegistration) -> HealthReport {
    HealthReport::unhealthy("mcp support is not compiled in")
}
