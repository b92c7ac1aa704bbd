//! Agent-workflow document model
//!
//! The high-level description of agents, tasks, and an execution strategy
//! that the compiler translates into a graph. Documents arrive as JSON
//! (canonical) or YAML; both parse into the same types.
//!
//! Fields are lenient at parse time (`#[serde(default)]`) so the validator
//! can report every problem in one pass instead of failing on the first
//! missing key.

pub mod validate;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::error::Result;

/// Identifier rule for agent and task keys
static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("identifier regex"));

/// Maximum identifier length
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Providers the engine knows how to drive
pub const KNOWN_PROVIDERS: &[&str] = &[
    "anthropic", "openai", "google", "cohere", "mistral", "groq", "ollama",
];

/// Check an agent/task key against the identifier rule
pub fn is_valid_identifier(id: &str) -> bool {
    id.len() <= MAX_IDENTIFIER_LEN && IDENTIFIER_RE.is_match(id)
}

/// Execution strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Sequential,
    Parallel,
    Hierarchical,
    Custom,
}

impl Strategy {
    /// Parse the document form; None for anything outside the set
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sequential" => Some(Self::Sequential),
            "parallel" => Some(Self::Parallel),
            "hierarchical" => Some(Self::Hierarchical),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

/// The top-level agent-workflow document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentWorkflow {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub agents: BTreeMap<String, AgentSpec>,
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskSpec>,
    #[serde(default)]
    pub execution: ExecutionSpec,
}

impl AgentWorkflow {
    /// Parse from canonical JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse from an already-decoded JSON value
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Parse from operator-authored YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// The parsed strategy, if it is one of the known set
    pub fn strategy(&self) -> Option<Strategy> {
        Strategy::parse(&self.execution.strategy)
    }
}

/// A configured role + provider + model bundle that executes tasks
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentSpec {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub goal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backstory: Option<String>,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<AgentConfig>,
    /// Tool references, `tool` or `tool.action`, in declaration order
    #[serde(default)]
    pub tools: Vec<String>,
    /// Per-tool option maps, keyed by tool base name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tool_config: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
}

/// Provider-specific agent options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// A unit of work assigned to one agent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskSpec {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub agent: String,
    #[serde(default)]
    pub expected_output: String,
    /// Promotes the task output under a stable variable name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,
    /// Parameter name -> template expression
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, String>,
    /// Task ids whose output feeds this task's context port
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
    /// `"human"` inserts an approval gate after the LLM node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<String>,
}

impl TaskSpec {
    /// Whether this task carries a human-approval gate
    pub fn has_human_review(&self) -> bool {
        self.review.as_deref() == Some("human")
    }
}

/// The execution block: strategy plus strategy-specific fields
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionSpec {
    #[serde(default)]
    pub strategy: String,
    /// Ordered task list, required for `sequential`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub task_order: Vec<String>,
    /// Optional merge behavior for `parallel`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_strategy: Option<String>,
    /// Required for `hierarchical`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_agent: Option<String>,
    /// Per-task dependency declarations for `custom`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tasks: BTreeMap<String, CustomTaskSpec>,
}

/// Dependency declaration for one task under the `custom` strategy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomTaskSpec {
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// Split a tool reference into base name and optional action
pub fn split_tool_ref(reference: &str) -> (&str, Option<&str>) {
    match reference.split_once('.') {
        Some((base, action)) => (base, Some(action)),
        None => (reference, None),
    }
}
