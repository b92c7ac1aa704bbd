//! Node-type projection
//!
//! A one-way function from registration snapshots to node-type entries: each
//! enabled registration yields one `NodeTypeDef` per action, typed
//! `tool.action`. The registry never writes back into registrations.

use crate::registry::{NodePorts, NodeTypeDef, category, resolve_tool_mode};
use crate::tools::ToolRegistration;
use crate::tools::manifest::ToolManifest;

/// Project registrations into the tool-derived node-type set
pub fn project_registrations(registrations: &[ToolRegistration]) -> Vec<NodeTypeDef> {
    let mut entries = Vec::new();

    for registration in registrations {
        if !registration.enabled {
            continue;
        }

        let manifest = &registration.manifest;
        for (action_name, action) in &manifest.actions {
            let ports = NodePorts {
                // Bytes-typed ports pass through verbatim so standalone
                // inference sees them
                inputs: action.inputs.clone(),
                outputs: action.outputs.clone(),
            };
            let mode = resolve_tool_mode(action.mode_hint(&manifest.transport), &ports);

            let mut def = NodeTypeDef::new(
                format!("{}.{}", registration.name, action_name),
                category::TOOL,
            )
            .with_tool_mode(Some(mode))
            .with_config_schema(config_schema(manifest));
            def.ports = ports;
            entries.push(def);
        }
    }

    entries
}

/// Node config schema surfacing the manifest's config field specs as a
/// `tool_config` block
fn config_schema(manifest: &ToolManifest) -> serde_json::Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();

    for (name, field) in &manifest.config {
        let json_type = match field.field_type.as_str() {
            "number" => "number",
            "boolean" => "boolean",
            // secrets are strings on the wire
            _ => "string",
        };

        let mut spec = serde_json::Map::new();
        spec.insert("type".to_string(), json_type.into());
        if field.sensitive {
            spec.insert("sensitive".to_string(), true.into());
        }
        if let Some(default) = &field.default {
            spec.insert("default".to_string(), default.clone().into());
        }
        properties.insert(name.clone(), spec.into());

        if field.required {
            required.push(serde_json::Value::from(name.clone()));
        }
    }

    let mut tool_config = serde_json::Map::new();
    tool_config.insert("type".to_string(), "object".into());
    tool_config.insert("properties".to_string(), properties.into());
    if !required.is_empty() {
        tool_config.insert("required".to_string(), required.into());
    }

    serde_json::json!({
        "type": "object",
        "properties": {
            "tool_config": serde_json::Value::Object(tool_config)
        }
    })
}
