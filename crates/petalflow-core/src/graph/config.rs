//! Typed node configs
//!
//! Node configs travel as JSON objects in the graph document; these are the
//! typed forms behind that wire shape. The compiler builds these and
//! serializes them into `NodeDef.config`; the runtime decodes by node type.
//!
//! The conditional variant carries its own output port set (one port per
//! branch), which is why port typing exempts it from static checks.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::graph::NodeDef;
use crate::registry::builtin;

/// Free-form per-tool option map, as authored in the agent spec
pub type ToolConfigMap = BTreeMap<String, BTreeMap<String, serde_json::Value>>;

/// Config for an `llm_prompt` node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmPromptConfig {
    pub system_prompt: String,
    pub prompt_template: String,
    pub provider: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,
    /// Inline function-call tool references
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tool_config: ToolConfigMap,
}

/// Config for an `llm_router` node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmRouterConfig {
    pub system_prompt: String,
    pub provider: String,
    pub model: String,
}

/// Config for a `merge` node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
}

/// Config for a `conditional` node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionalConfig {
    /// Branch name -> condition expression
    pub conditions: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation_order: Option<String>,
    #[serde(default)]
    pub pass_through: bool,
}

impl ConditionalConfig {
    /// The output ports this node exposes: one per branch
    pub fn branch_ports(&self) -> Vec<&str> {
        self.conditions.keys().map(String::as_str).collect()
    }
}

/// Config for a `human` approval node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HumanConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

/// Config for a standalone tool node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolNodeConfig {
    /// Input port name -> argument template
    pub args_template: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_config: Option<BTreeMap<String, serde_json::Value>>,
}

/// A node config decoded by node type
#[derive(Debug, Clone, PartialEq)]
pub enum NodeConfig {
    LlmPrompt(LlmPromptConfig),
    LlmRouter(LlmRouterConfig),
    Merge(MergeConfig),
    Conditional(ConditionalConfig),
    Human(HumanConfig),
    Tool(ToolNodeConfig),
    /// Node types this crate does not model; config passes through verbatim
    Other(serde_json::Value),
}

impl NodeConfig {
    /// Decode a node's config according to its type
    pub fn for_node(node: &NodeDef) -> Result<Self> {
        let config = node.config.clone();
        let decoded = match node.node_type.as_str() {
            builtin::LLM_PROMPT => Self::LlmPrompt(serde_json::from_value(config)?),
            builtin::LLM_ROUTER => Self::LlmRouter(serde_json::from_value(config)?),
            builtin::MERGE => Self::Merge(from_value_or_default(config)?),
            builtin::CONDITIONAL => Self::Conditional(serde_json::from_value(config)?),
            builtin::HUMAN => Self::Human(from_value_or_default(config)?),
            node_type if node_type.contains('.') => Self::Tool(serde_json::from_value(config)?),
            _ => Self::Other(config),
        };
        Ok(decoded)
    }

    /// The wire form stored in `NodeDef.config`
    pub fn to_value(&self) -> Result<serde_json::Value> {
        let value = match self {
            Self::LlmPrompt(config) => serde_json::to_value(config)?,
            Self::LlmRouter(config) => serde_json::to_value(config)?,
            Self::Merge(config) => serde_json::to_value(config)?,
            Self::Conditional(config) => serde_json::to_value(config)?,
            Self::Human(config) => serde_json::to_value(config)?,
            Self::Tool(config) => serde_json::to_value(config)?,
            Self::Other(value) => value.clone(),
        };
        Ok(value)
    }
}

/// Merge and human nodes are valid with no config at all
fn from_value_or_default<T: Default + serde::de::DeserializeOwned>(
    value: serde_json::Value,
) -> Result<T> {
    if value.is_null() {
        Ok(T::default())
    } else {
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_prompt_wire_form_omits_empty_fields() {
        let config = LlmPromptConfig {
            system_prompt: "You are a Writer.".to_string(),
            prompt_template: "Write {{.topic}}".to_string(),
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4".to_string(),
            ..Default::default()
        };

        let json = serde_json::to_value(&config).unwrap();
        assert!(json.get("temperature").is_none());
        assert!(json.get("tools").is_none());
        assert!(json.get("tool_config").is_none());
        assert_eq!(json["provider"], "anthropic");
    }

    #[test]
    fn test_round_trip_by_node_type() {
        let config = NodeConfig::Conditional(ConditionalConfig {
            conditions: [("next".to_string(), "x > 1".to_string())].into(),
            default: Some("_skip".to_string()),
            evaluation_order: Some("first_match".to_string()),
            pass_through: true,
        });

        let node = NodeDef::new("gate", builtin::CONDITIONAL)
            .with_config(config.to_value().unwrap());
        let decoded = NodeConfig::for_node(&node).unwrap();
        assert_eq!(decoded, config);
    }

    #[test]
    fn test_conditional_branch_ports() {
        let config = ConditionalConfig {
            conditions: [
                ("approve".to_string(), "score > 7".to_string()),
                ("reject".to_string(), "score <= 7".to_string()),
            ]
            .into(),
            ..Default::default()
        };
        assert_eq!(config.branch_ports(), vec!["approve", "reject"]);
    }

    #[test]
    fn test_configless_merge_decodes_to_default() {
        let node = NodeDef::new("m", builtin::MERGE);
        let decoded = NodeConfig::for_node(&node).unwrap();
        assert_eq!(decoded, NodeConfig::Merge(MergeConfig::default()));
    }

    #[test]
    fn test_tool_node_config_by_dotted_type() {
        let node = NodeDef::new("t1__files_read", "files.read").with_config(serde_json::json!({
            "args_template": {"path": "{{.path}}"},
            "tool_name": "files",
            "action_name": "read"
        }));

        match NodeConfig::for_node(&node).unwrap() {
            NodeConfig::Tool(config) => {
                assert_eq!(config.args_template["path"], "{{.path}}");
                assert_eq!(config.tool_name.as_deref(), Some("files"));
            }
            other => panic!("expected tool config, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_passes_through() {
        let node = NodeDef::new("x", "webhook_trigger")
            .with_config(serde_json::json!({"path": "/hooks/in"}));
        match NodeConfig::for_node(&node).unwrap() {
            NodeConfig::Other(value) => assert_eq!(value["path"], "/hooks/in"),
            other => panic!("expected passthrough, got {:?}", other),
        }
    }
}
