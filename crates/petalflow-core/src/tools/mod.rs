//! Tool registration subsystem
//!
//! External services (HTTP endpoints, local subprocesses, MCP servers,
//! in-process natives) are registered here, validated, health-probed, and
//! projected into node-type entries the compiler resolves against.

pub mod adapter;
#[cfg(feature = "mcp")]
pub mod discovery;
pub mod health;
pub mod manifest;
pub mod overlay;
pub mod projection;
pub mod secrets;
pub mod service;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::tools::manifest::ToolManifest;
use crate::tools::overlay::McpOverlay;

/// Where a tool's implementation lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolOrigin {
    /// In-process native implementation
    Native,
    /// Remote HTTP endpoint
    Http,
    /// Local subprocess speaking line-delimited JSON
    Stdio,
    /// Model Context Protocol server
    Mcp,
}

/// Derived tool status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    /// Last probe succeeded
    Ready,
    /// Last probe failed
    Unhealthy,
    /// Registered but not probed since the last change
    Unverified,
    /// Explicitly disabled; excluded from projection
    Disabled,
}

/// A persisted tool registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRegistration {
    pub name: String,
    pub origin: ToolOrigin,
    pub manifest: ToolManifest,
    /// Configured values, keyed by manifest config field name. Holds real
    /// secret values in the store; reads go through the masking pass.
    #[serde(default)]
    pub config: BTreeMap<String, String>,
    /// MCP-only adjustment document, merged over discovery results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay: Option<McpOverlay>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub status: ToolStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_health_check: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

impl ToolRegistration {
    pub fn new(name: impl Into<String>, origin: ToolOrigin, manifest: ToolManifest) -> Self {
        Self {
            name: name.into(),
            origin,
            manifest,
            config: BTreeMap::new(),
            overlay: None,
            enabled: true,
            status: ToolStatus::Unverified,
            last_health_check: None,
        }
    }

    pub fn with_config(mut self, config: BTreeMap<String, String>) -> Self {
        self.config = config;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        if !enabled {
            self.status = ToolStatus::Disabled;
        }
        self
    }
}
