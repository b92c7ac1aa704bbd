//! MCP overlay documents
//!
//! An overlay adjusts what MCP discovery returns: renaming actions,
//! pinning execution modes, overriding schemas and descriptions, adding
//! config fields, and configuring health. It is merged over the discovered
//! manifest on every refresh, so a re-discovery never loses operator edits.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::registry::{PortDef, ToolMode};
use crate::tools::manifest::{FieldSpec, HealthSpec, ToolManifest};

/// The only overlay version this engine accepts
pub const OVERLAY_VERSION: &str = "1.0";

/// MCP-specific adjustment document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpOverlay {
    #[serde(default)]
    pub overlay_version: String,
    /// Rename map: discovered action name -> exposed action name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub group_actions: BTreeMap<String, String>,
    /// Exposed action name -> pinned execution mode
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub action_modes: BTreeMap<String, ToolMode>,
    /// Exposed action name -> replacement input ports
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub input_overrides: BTreeMap<String, Vec<PortDef>>,
    /// Exposed action name -> replacement output ports
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub output_schemas: BTreeMap<String, Vec<PortDef>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub description_overrides: BTreeMap<String, String>,
    /// Config field additions and overrides
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, OverlayConfigField>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthSpec>,
}

impl McpOverlay {
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_yaml(yaml: &str) -> crate::error::Result<Self> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Config fields whose value should be seeded from an environment
    /// variable: (field name, env var name)
    pub fn env_seeds(&self) -> Vec<(String, String)> {
        self.config
            .iter()
            .filter_map(|(name, field)| {
                field.env_var.as_ref().map(|var| (name.clone(), var.clone()))
            })
            .collect()
    }
}

/// A config field contributed by an overlay
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverlayConfigField {
    #[serde(flatten)]
    pub field: FieldSpec,
    /// Environment variable to seed the value from at refresh time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_var: Option<String>,
}

/// Merge an overlay over a freshly discovered manifest
///
/// Renames run first, so every other override addresses actions by their
/// exposed name.
pub fn apply_overlay(manifest: &ToolManifest, overlay: &McpOverlay) -> ToolManifest {
    let mut merged = manifest.clone();

    if !overlay.group_actions.is_empty() {
        let mut renamed = BTreeMap::new();
        for (name, action) in std::mem::take(&mut merged.actions) {
            let exposed = overlay.group_actions.get(&name).cloned().unwrap_or(name);
            renamed.insert(exposed, action);
        }
        merged.actions = renamed;
    }

    for (name, mode) in &overlay.action_modes {
        if let Some(action) = merged.actions.get_mut(name) {
            action.mode = Some(*mode);
        }
    }

    for (name, inputs) in &overlay.input_overrides {
        if let Some(action) = merged.actions.get_mut(name) {
            action.inputs = inputs.clone();
        }
    }

    for (name, outputs) in &overlay.output_schemas {
        if let Some(action) = merged.actions.get_mut(name) {
            action.outputs = outputs.clone();
        }
    }

    for (name, description) in &overlay.description_overrides {
        if let Some(action) = merged.actions.get_mut(name) {
            action.description = description.clone();
        }
    }

    for (name, overlay_field) in &overlay.config {
        merged.config.insert(name.clone(), overlay_field.field.clone());
    }

    if let Some(health) = &overlay.health {
        merged.health = Some(health.clone());
    }

    merged
}
