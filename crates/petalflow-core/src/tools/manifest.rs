//! Tool manifest schema and validation
//!
//! A manifest is the typed description of a tool: transport, actions with
//! typed ports, config field specs, and health hints. Validation is a
//! composition of independent checks; every check runs, and errors
//! short-circuit persistence at the service layer.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::diagnostics::{Diagnostic, registration as codes};
use crate::registry::{PortDef, ToolMode};
use crate::tools::ToolRegistration;
use crate::workflow::is_valid_identifier;

/// The only manifest version this engine accepts
pub const MANIFEST_VERSION: &str = "1.0";

/// Typed description of a registered tool
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolManifest {
    #[serde(default)]
    pub manifest_version: String,
    #[serde(default)]
    pub tool: ToolInfo,
    #[serde(default)]
    pub transport: TransportSpec,
    #[serde(default)]
    pub actions: BTreeMap<String, ActionSpec>,
    #[serde(default)]
    pub config: BTreeMap<String, FieldSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthSpec>,
}

impl ToolManifest {
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_yaml(yaml: &str) -> crate::error::Result<Self> {
        Ok(serde_yml::from_str(yaml)?)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
}

/// Transport kind for reaching the tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    #[default]
    Native,
    Http,
    Stdio,
    Mcp,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransportSpec {
    #[serde(rename = "type", default)]
    pub transport_type: TransportType,
    /// Base URL, for http transports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Launch command, for stdio transports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Transport-level execution mode hint applied to every action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ToolMode>,
}

/// One invocable action of a tool
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionSpec {
    #[serde(default)]
    pub inputs: Vec<PortDef>,
    #[serde(default)]
    pub outputs: Vec<PortDef>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_callable: Option<bool>,
    /// Per-action execution mode hint; overrides the transport-level hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ToolMode>,
}

impl ActionSpec {
    /// The explicit mode hint for this action, if any
    pub fn mode_hint(&self, transport: &TransportSpec) -> Option<ToolMode> {
        self.mode.or(transport.mode)
    }
}

/// Config field declaration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(rename = "type", default)]
    pub field_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub sensitive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// Health probing hints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSpec {
    pub strategy: HealthStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unhealthy_threshold: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStrategy {
    /// Subprocess liveness
    Process,
    /// Endpoint reachability of the transport endpoint
    Connection,
    /// MCP initialize + tools/list
    Ping,
    /// Explicit URL from the health spec
    Endpoint,
}

/// Allowed config field types in manifest v1
const V1_FIELD_TYPES: &[&str] = &["string", "number", "boolean", "secret"];

/// Schema conformance: version pin, tool identity, transport consistency
pub fn check_schema(manifest: &ToolManifest) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    if manifest.manifest_version != MANIFEST_VERSION {
        diagnostics.push(
            Diagnostic::error(
                codes::SCHEMA_INVALID,
                format!(
                    "unsupported manifest_version '{}' (expected '{}')",
                    manifest.manifest_version, MANIFEST_VERSION
                ),
            )
            .with_field("manifest_version"),
        );
    }

    if manifest.tool.name.is_empty() {
        diagnostics.push(
            Diagnostic::error(codes::SCHEMA_INVALID, "tool.name is required").with_field("tool.name"),
        );
    }

    if manifest.actions.is_empty() {
        diagnostics.push(
            Diagnostic::error(codes::SCHEMA_INVALID, "manifest declares no actions")
                .with_field("actions"),
        );
    }

    match manifest.transport.transport_type {
        TransportType::Http => {
            if manifest.transport.endpoint.is_none() {
                diagnostics.push(
                    Diagnostic::error(
                        codes::SCHEMA_INVALID,
                        "http transport requires an endpoint",
                    )
                    .with_field("transport.endpoint"),
                );
            }
        }
        TransportType::Stdio => {
            if manifest.transport.command.is_none() {
                diagnostics.push(
                    Diagnostic::error(
                        codes::SCHEMA_INVALID,
                        "stdio transport requires a command",
                    )
                    .with_field("transport.command"),
                );
            }
        }
        TransportType::Mcp => {
            if manifest.transport.command.is_none() && manifest.transport.endpoint.is_none() {
                diagnostics.push(
                    Diagnostic::error(
                        codes::SCHEMA_INVALID,
                        "mcp transport requires a command or an endpoint",
                    )
                    .with_field("transport"),
                );
            }
        }
        TransportType::Native => {}
    }

    diagnostics
}

/// v1 type-system well-formedness: action names, port names, field types
pub fn check_types(manifest: &ToolManifest) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for (action_name, action) in &manifest.actions {
        if !is_valid_identifier(action_name) {
            diagnostics.push(
                Diagnostic::error(
                    codes::TYPE_INVALID,
                    format!("action name '{}' is not a valid identifier", action_name),
                )
                .with_field(format!("actions.{}", action_name)),
            );
        }

        for (direction, ports) in [("inputs", &action.inputs), ("outputs", &action.outputs)] {
            let mut seen = BTreeSet::new();
            for port in ports {
                if port.name.is_empty() {
                    diagnostics.push(
                        Diagnostic::error(
                            codes::TYPE_INVALID,
                            format!("action '{}' has an unnamed {} port", action_name, direction),
                        )
                        .with_field(format!("actions.{}.{}", action_name, direction)),
                    );
                } else if !seen.insert(port.name.as_str()) {
                    diagnostics.push(
                        Diagnostic::error(
                            codes::TYPE_INVALID,
                            format!(
                                "action '{}' declares duplicate {} port '{}'",
                                action_name, direction, port.name
                            ),
                        )
                        .with_field(format!("actions.{}.{}", action_name, direction)),
                    );
                }
            }
        }
    }

    for (field_name, field) in &manifest.config {
        if !field.field_type.is_empty() && !V1_FIELD_TYPES.contains(&field.field_type.as_str()) {
            diagnostics.push(
                Diagnostic::error(
                    codes::TYPE_INVALID,
                    format!(
                        "config field '{}' has unknown type '{}'",
                        field_name, field.field_type
                    ),
                )
                .with_field(format!("config.{}", field_name)),
            );
        }
    }

    diagnostics
}

/// Config completeness: every required field populated or defaulted
pub fn check_config_completeness(registration: &ToolRegistration) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for (field_name, field) in &registration.manifest.config {
        if field.required
            && field.default.is_none()
            && !registration.config.contains_key(field_name)
        {
            diagnostics.push(
                Diagnostic::error(
                    codes::CONFIG_INCOMPLETE,
                    format!("required config field '{}' is not set", field_name),
                )
                .with_field(format!("config.{}", field_name)),
            );
        }
    }

    diagnostics
}

/// Sensitive fields may only be written through the secret path
pub fn check_sensitive_fields(
    manifest: &ToolManifest,
    plain_config: &BTreeMap<String, String>,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for (field_name, field) in &manifest.config {
        if field.sensitive && plain_config.contains_key(field_name) {
            diagnostics.push(
                Diagnostic::error(
                    codes::SENSITIVE_IN_PLAIN_CONFIG,
                    format!(
                        "sensitive field '{}' must be supplied through the secret path",
                        field_name
                    ),
                )
                .with_field(format!("config.{}", field_name)),
            );
        }
    }

    diagnostics
}

/// Full manifest validation: schema conformance then type well-formedness
pub fn validate_manifest(manifest: &ToolManifest) -> Vec<Diagnostic> {
    let mut diagnostics = check_schema(manifest);
    diagnostics.extend(check_types(manifest));
    diagnostics
}

/// Full registration validation as run before persistence
pub fn validate_registration(registration: &ToolRegistration) -> Vec<Diagnostic> {
    let mut diagnostics = validate_manifest(&registration.manifest);
    diagnostics.extend(check_config_completeness(registration));
    diagnostics
}
