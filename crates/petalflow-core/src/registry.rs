//! Node-type registry
//!
//! The catalog of node types the compiler and graph validator resolve
//! against. Built-in types are installed at construction; tool-derived
//! entries (`tool.action`) are rebuilt by the tool service's projection
//! after every registration change.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value type carried on a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortType {
    String,
    Bytes,
    Object,
    Number,
    Boolean,
    Any,
}

/// A named, typed port on a node type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDef {
    pub name: String,
    #[serde(rename = "type")]
    pub port_type: PortType,
    #[serde(default)]
    pub required: bool,
}

impl PortDef {
    pub fn new(name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            name: name.into(),
            port_type,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Input and output port sets of a node type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePorts {
    #[serde(default)]
    pub inputs: Vec<PortDef>,
    #[serde(default)]
    pub outputs: Vec<PortDef>,
}

impl NodePorts {
    /// Any port, in or out, carrying bytes
    pub fn has_bytes_port(&self) -> bool {
        self.inputs
            .iter()
            .chain(self.outputs.iter())
            .any(|p| p.port_type == PortType::Bytes)
    }
}

/// How a tool-derived node type executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolMode {
    /// Passed inline to an LLM node's `tools` config and invoked by the model
    FunctionCall,
    /// A separate pipeline node, wired before the LLM node
    Standalone,
}

/// Registry entry describing a node type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeTypeDef {
    /// Type identifier: a built-in name or `tool.action`
    #[serde(rename = "type")]
    pub node_type: String,
    pub category: String,
    #[serde(default)]
    pub is_tool: bool,
    /// Execution mode for tool types; None means "infer from ports"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_mode: Option<ToolMode>,
    #[serde(default)]
    pub ports: NodePorts,
    /// JSON schema for the node's config block
    #[serde(default)]
    pub config_schema: serde_json::Value,
    /// True when the output port set is config-defined (conditional branches)
    #[serde(default)]
    pub dynamic_outputs: bool,
}

impl NodeTypeDef {
    pub fn new(node_type: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            category: category.into(),
            is_tool: false,
            tool_mode: None,
            ports: NodePorts::default(),
            config_schema: serde_json::Value::Null,
            dynamic_outputs: false,
        }
    }

    pub fn with_ports(mut self, inputs: Vec<PortDef>, outputs: Vec<PortDef>) -> Self {
        self.ports = NodePorts { inputs, outputs };
        self
    }

    pub fn with_tool_mode(mut self, mode: Option<ToolMode>) -> Self {
        self.is_tool = true;
        self.tool_mode = mode;
        self
    }

    pub fn with_config_schema(mut self, schema: serde_json::Value) -> Self {
        self.config_schema = schema;
        self
    }

    pub fn with_dynamic_outputs(mut self) -> Self {
        self.dynamic_outputs = true;
        self
    }

    /// Trigger nodes accept no inbound edges
    pub fn is_trigger(&self) -> bool {
        self.category == category::TRIGGER
    }
}

/// Node type categories
pub mod category {
    pub const CORE: &str = "core";
    pub const CONTROL: &str = "control";
    pub const TRIGGER: &str = "trigger";
    pub const TOOL: &str = "tool";
}

/// Built-in node type names
pub mod builtin {
    pub const LLM_PROMPT: &str = "llm_prompt";
    pub const LLM_ROUTER: &str = "llm_router";
    pub const MERGE: &str = "merge";
    pub const CONDITIONAL: &str = "conditional";
    pub const HUMAN: &str = "human";
    pub const WEBHOOK_TRIGGER: &str = "webhook_trigger";
}

/// Resolve the execution mode for a tool entry: explicit wins, otherwise a
/// bytes port anywhere means standalone
pub fn resolve_tool_mode(explicit: Option<ToolMode>, ports: &NodePorts) -> ToolMode {
    match explicit {
        Some(mode) => mode,
        None if ports.has_bytes_port() => ToolMode::Standalone,
        None => ToolMode::FunctionCall,
    }
}

/// Process-wide catalog of node types
///
/// Reads are lock-free snapshots by clone; the tool-derived subset is swapped
/// under a single write lock so readers never observe a partial projection.
pub struct NodeTypeRegistry {
    types: RwLock<BTreeMap<String, NodeTypeDef>>,
}

impl Default for NodeTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeTypeRegistry {
    /// Create a registry with the built-in node types installed
    pub fn new() -> Self {
        let registry = Self {
            types: RwLock::new(BTreeMap::new()),
        };
        for def in builtin_defs() {
            registry.register(def);
        }
        registry
    }

    /// Create an empty registry (no built-ins); used by tests
    pub fn empty() -> Self {
        Self {
            types: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register or overwrite a node type
    pub fn register(&self, def: NodeTypeDef) {
        self.types.write().insert(def.node_type.clone(), def);
    }

    /// Remove a node type
    pub fn delete(&self, node_type: &str) -> bool {
        self.types.write().remove(node_type).is_some()
    }

    /// Look up a node type
    pub fn get(&self, node_type: &str) -> Option<NodeTypeDef> {
        self.types.read().get(node_type).cloned()
    }

    /// All registered types, sorted by type name
    pub fn list(&self) -> Vec<NodeTypeDef> {
        self.types.read().values().cloned().collect()
    }

    /// Resolved execution mode for a tool type
    pub fn tool_mode(&self, node_type: &str) -> Option<ToolMode> {
        let types = self.types.read();
        let def = types.get(node_type)?;
        if !def.is_tool {
            return None;
        }
        Some(resolve_tool_mode(def.tool_mode, &def.ports))
    }

    /// Whether a tool reference resolves: `tool.action` exactly; an
    /// undotted name matches an action-less tool entry or any action under
    /// that base name
    pub fn has_tool(&self, reference: &str) -> bool {
        let types = self.types.read();
        if types.get(reference).is_some_and(|d| d.is_tool) {
            return true;
        }
        if reference.contains('.') {
            return false;
        }
        let prefix = format!("{}.", reference);
        types
            .iter()
            .any(|(name, def)| def.is_tool && name.starts_with(&prefix))
    }

    /// All `tool.action` references under a base tool name, sorted
    pub fn tool_action_refs(&self, tool_name: &str) -> Vec<String> {
        let prefix = format!("{}.", tool_name);
        self.types
            .read()
            .iter()
            .filter(|(name, def)| def.is_tool && name.starts_with(&prefix))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Replace the whole tool-derived subset atomically
    pub fn replace_tool_entries(&self, entries: Vec<NodeTypeDef>) {
        let mut types = self.types.write();
        types.retain(|_, def| !def.is_tool);
        for def in entries {
            types.insert(def.node_type.clone(), def);
        }
    }
}

fn builtin_defs() -> Vec<NodeTypeDef> {
    vec![
        NodeTypeDef::new(builtin::LLM_PROMPT, category::CORE)
            .with_ports(
                vec![
                    PortDef::new("input", PortType::String),
                    PortDef::new("context", PortType::String),
                ],
                vec![PortDef::new("output", PortType::String)],
            )
            .with_config_schema(serde_json::json!({
                "type": "object",
                "properties": {
                    "provider": {"type": "string"},
                    "model": {"type": "string"},
                    "system_prompt": {"type": "string"},
                    "prompt_template": {"type": "string"},
                    "temperature": {"type": "number"},
                    "max_tokens": {"type": "integer"},
                    "output_key": {"type": "string"},
                    "tools": {"type": "array", "items": {"type": "string"}},
                    "tool_config": {"type": "object"}
                },
                "required": ["provider", "model"]
            })),
        NodeTypeDef::new(builtin::LLM_ROUTER, category::CORE)
            .with_ports(
                vec![PortDef::new("input", PortType::String)],
                vec![PortDef::new("output", PortType::String)],
            )
            .with_config_schema(serde_json::json!({
                "type": "object",
                "properties": {
                    "provider": {"type": "string"},
                    "model": {"type": "string"},
                    "system_prompt": {"type": "string"}
                },
                "required": ["provider", "model"]
            })),
        NodeTypeDef::new(builtin::MERGE, category::CONTROL)
            .with_ports(
                vec![PortDef::new("input", PortType::Any)],
                vec![PortDef::new("output", PortType::Object)],
            )
            .with_config_schema(serde_json::json!({
                "type": "object",
                "properties": {
                    "strategy": {"type": "string"}
                }
            })),
        NodeTypeDef::new(builtin::CONDITIONAL, category::CONTROL)
            .with_ports(vec![PortDef::new("input", PortType::Any)], Vec::new())
            .with_dynamic_outputs()
            .with_config_schema(serde_json::json!({
                "type": "object",
                "properties": {
                    "conditions": {"type": "object"},
                    "default": {"type": "string"},
                    "evaluation_order": {"type": "string"},
                    "pass_through": {"type": "boolean"}
                },
                "required": ["conditions"]
            })),
        NodeTypeDef::new(builtin::HUMAN, category::CORE)
            .with_ports(
                vec![PortDef::new("input", PortType::Any).required()],
                vec![PortDef::new("output", PortType::Any)],
            )
            .with_config_schema(serde_json::json!({
                "type": "object",
                "properties": {
                    "prompt": {"type": "string"},
                    "timeout_seconds": {"type": "integer"}
                }
            })),
        NodeTypeDef::new(builtin::WEBHOOK_TRIGGER, category::TRIGGER).with_ports(
            Vec::new(),
            vec![PortDef::new("output", PortType::Object)],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool_def(name: &str, mode: Option<ToolMode>) -> NodeTypeDef {
        NodeTypeDef::new(name, category::TOOL).with_tool_mode(mode)
    }

    #[test]
    fn test_builtins_installed() {
        let registry = NodeTypeRegistry::new();
        assert!(registry.get(builtin::LLM_PROMPT).is_some());
        assert!(registry.get(builtin::CONDITIONAL).unwrap().dynamic_outputs);
        assert!(registry.get(builtin::WEBHOOK_TRIGGER).unwrap().is_trigger());
    }

    #[test]
    fn test_has_tool_dotted_and_undotted() {
        let registry = NodeTypeRegistry::new();
        registry.register(tool_def("search.query", Some(ToolMode::FunctionCall)));

        assert!(registry.has_tool("search.query"));
        assert!(registry.has_tool("search"));
        assert!(!registry.has_tool("search.missing"));
        assert!(!registry.has_tool("missing"));
        // Built-ins never resolve as tools
        assert!(!registry.has_tool(builtin::LLM_PROMPT));
    }

    #[test]
    fn test_tool_action_refs_sorted() {
        let registry = NodeTypeRegistry::new();
        registry.register(tool_def("files.write", None));
        registry.register(tool_def("files.read", None));
        registry.register(tool_def("other.act", None));

        assert_eq!(
            registry.tool_action_refs("files"),
            vec!["files.read".to_string(), "files.write".to_string()]
        );
    }

    #[test]
    fn test_tool_mode_inference_from_bytes_port() {
        let registry = NodeTypeRegistry::new();
        let def = NodeTypeDef::new("loader.fetch", category::TOOL)
            .with_tool_mode(None)
            .with_ports(
                vec![PortDef::new("path", PortType::String)],
                vec![PortDef::new("data", PortType::Bytes)],
            );
        registry.register(def);
        registry.register(tool_def("search.query", None));

        assert_eq!(registry.tool_mode("loader.fetch"), Some(ToolMode::Standalone));
        assert_eq!(registry.tool_mode("search.query"), Some(ToolMode::FunctionCall));
        assert_eq!(registry.tool_mode(builtin::MERGE), None);
    }

    #[test]
    fn test_replace_tool_entries_preserves_builtins() {
        let registry = NodeTypeRegistry::new();
        registry.register(tool_def("old.act", None));

        registry.replace_tool_entries(vec![tool_def("new.act", None)]);

        assert!(registry.get("old.act").is_none());
        assert!(registry.get("new.act").is_some());
        assert!(registry.get(builtin::LLM_PROMPT).is_some());
    }

    #[test]
    fn test_explicit_mode_beats_port_shape() {
        let ports = NodePorts {
            inputs: vec![PortDef::new("data", PortType::Bytes)],
            outputs: Vec::new(),
        };
        assert_eq!(
            resolve_tool_mode(Some(ToolMode::FunctionCall), &ports),
            ToolMode::FunctionCall
        );
        assert_eq!(resolve_tool_mode(None, &ports), ToolMode::Standalone);
    }
}
