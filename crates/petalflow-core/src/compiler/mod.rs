//! Agent-to-graph compiler
//!
//! Translates a validated agent workflow into a `GraphDefinition`. The
//! compiler is a structural translator: it maps each task to nodes, resolves
//! tool references against the registry snapshot, rewrites user templates to
//! the runtime envelope form, and applies the strategy topology.
//!
//! Determinism: maps iterate in sorted key order throughout, and the edge
//! list is sorted at the end, so output is independent of document insertion
//! order. The compile timestamp in metadata is the only varying field.

mod strategy;

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::graph::config::{LlmPromptConfig, NodeConfig, ToolNodeConfig};
use crate::graph::{EdgeDef, GraphDefinition, NodeDef};
use crate::registry::{NodeTypeRegistry, ToolMode, builtin};
use crate::template;
use crate::workflow::{AgentSpec, AgentWorkflow, TaskSpec, split_tool_ref};

/// Version stamped into `metadata.compiler_version`
pub const COMPILER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Compile a workflow against a registry snapshot
///
/// The workflow is expected to have passed validation; invariants the
/// validator should have caught surface here as `Error::Compile`.
pub fn compile(workflow: &AgentWorkflow, registry: &NodeTypeRegistry) -> Result<GraphDefinition> {
    let strategy = workflow
        .strategy()
        .ok_or_else(|| Error::Compile(format!("unknown strategy '{}'", workflow.execution.strategy)))?;

    let plans = plan_tasks(workflow, registry)?;
    let output_nodes: BTreeMap<String, String> = plans
        .iter()
        .map(|(name, plan)| (name.clone(), plan.output_node.clone()))
        .collect();

    let mut graph = GraphDefinition {
        id: workflow.id.clone(),
        version: workflow.version.clone(),
        ..Default::default()
    };

    for plan in plans.values() {
        emit_task_nodes(workflow, registry, plan, &output_nodes, &mut graph)?;
    }

    emit_reference_edges(workflow, &plans, &output_nodes, &mut graph);
    strategy::apply(strategy, workflow, &plans, &output_nodes, &mut graph)?;

    graph.metadata.insert("source_kind".to_string(), workflow.kind.clone());
    graph.metadata.insert(
        "compiled_at".to_string(),
        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
    );
    graph
        .metadata
        .insert("compiler_version".to_string(), COMPILER_VERSION.to_string());

    graph.sort_edges();
    graph.edges.dedup();
    Ok(graph)
}

/// Node placement for one task, computed before any node is emitted so
/// template rewriting can see every task's output node
pub(crate) struct TaskPlan {
    pub name: String,
    pub agent_name: String,
    /// Primary node, `task__agent`, type `llm_prompt`
    pub llm_node: String,
    /// Standalone tool nodes, declaration order
    pub standalone: Vec<StandalonePlan>,
    /// Function-call references embedded in the LLM node config
    pub inline_tools: Vec<String>,
    /// First standalone node, or the LLM node
    pub start_node: String,
    /// The hitl node when review is human, otherwise the LLM node
    pub output_node: String,
    pub hitl_node: Option<String>,
}

pub(crate) struct StandalonePlan {
    pub reference: String,
    pub node_id: String,
}

fn plan_tasks(
    workflow: &AgentWorkflow,
    registry: &NodeTypeRegistry,
) -> Result<BTreeMap<String, TaskPlan>> {
    let mut plans = BTreeMap::new();

    for (name, task) in &workflow.tasks {
        let agent = workflow.agents.get(&task.agent).ok_or_else(|| {
            Error::Compile(format!(
                "task '{}' references undefined agent '{}'",
                name, task.agent
            ))
        })?;

        let (standalone_refs, inline_tools) = resolve_tool_refs(agent, registry);

        let llm_node = format!("{}__{}", name, task.agent);
        let standalone: Vec<StandalonePlan> = standalone_refs
            .into_iter()
            .map(|reference| StandalonePlan {
                node_id: format!("{}__{}", name, reference.replace('.', "_")),
                reference,
            })
            .collect();

        let hitl_node = task
            .has_human_review()
            .then(|| format!("{}__hitl", llm_node));

        let start_node = standalone
            .first()
            .map(|s| s.node_id.clone())
            .unwrap_or_else(|| llm_node.clone());
        let output_node = hitl_node.clone().unwrap_or_else(|| llm_node.clone());

        plans.insert(
            name.clone(),
            TaskPlan {
                name: name.clone(),
                agent_name: task.agent.clone(),
                llm_node,
                standalone,
                inline_tools,
                start_node,
                output_node,
                hitl_node,
            },
        );
    }

    Ok(plans)
}

/// Expand and classify an agent's tool references
///
/// Undotted references expand to every registered action of the tool, in the
/// registry's sorted order. References the registry cannot resolve fall back
/// to function_call; the validator has already reported them.
fn resolve_tool_refs(
    agent: &AgentSpec,
    registry: &NodeTypeRegistry,
) -> (Vec<String>, Vec<String>) {
    let mut standalone = Vec::new();
    let mut inline = Vec::new();

    for reference in &agent.tools {
        let expanded = if !reference.contains('.') {
            let actions = registry.tool_action_refs(reference);
            if actions.is_empty() {
                vec![reference.clone()]
            } else {
                actions
            }
        } else {
            vec![reference.clone()]
        };

        for resolved in expanded {
            match registry.tool_mode(&resolved) {
                Some(ToolMode::Standalone) => standalone.push(resolved),
                _ => inline.push(resolved),
            }
        }
    }

    (standalone, inline)
}

fn emit_task_nodes(
    workflow: &AgentWorkflow,
    registry: &NodeTypeRegistry,
    plan: &TaskPlan,
    output_nodes: &BTreeMap<String, String>,
    graph: &mut GraphDefinition,
) -> Result<()> {
    let task = &workflow.tasks[&plan.name];
    let agent = &workflow.agents[&plan.agent_name];

    // Standalone tool pipeline, chained in declaration order
    for (index, stage) in plan.standalone.iter().enumerate() {
        let config = NodeConfig::Tool(standalone_config(registry, agent, &stage.reference));
        graph.nodes.push(
            NodeDef::new(&stage.node_id, &stage.reference).with_config(config.to_value()?),
        );
        if index > 0 {
            graph.edges.push(EdgeDef::new(
                &plan.standalone[index - 1].node_id,
                "output",
                &stage.node_id,
                "input",
            ));
        }
    }

    // Last pipeline stage feeds the LLM node's context port
    if let Some(last) = plan.standalone.last() {
        graph.edges.push(EdgeDef::new(
            &last.node_id,
            "output",
            &plan.llm_node,
            "context",
        ));
    }

    let llm = NodeConfig::LlmPrompt(llm_config(task, agent, plan, output_nodes));
    graph.nodes.push(
        NodeDef::new(&plan.llm_node, builtin::LLM_PROMPT).with_config(llm.to_value()?),
    );

    if let Some(hitl) = &plan.hitl_node {
        graph.nodes.push(NodeDef::new(hitl, builtin::HUMAN));
        graph
            .edges
            .push(EdgeDef::new(&plan.llm_node, "output", hitl, "input"));
    }

    Ok(())
}

/// The LLM node's system prompt, composed from the agent and task specs
fn system_prompt(agent: &AgentSpec, task: &TaskSpec) -> String {
    let mut prompt = format!("You are a {}.\n\nGoal: {}", agent.role, agent.goal);
    if let Some(backstory) = &agent.backstory {
        prompt.push_str(&format!("\n\nBackstory: {}", backstory));
    }
    prompt.push_str(&format!("\n\nExpected output: {}", task.expected_output));
    prompt
}

fn llm_config(
    task: &TaskSpec,
    agent: &AgentSpec,
    plan: &TaskPlan,
    output_nodes: &BTreeMap<String, String>,
) -> LlmPromptConfig {
    let agent_options = agent.config.as_ref();
    LlmPromptConfig {
        system_prompt: system_prompt(agent, task),
        prompt_template: template::rewrite(&task.description, output_nodes),
        provider: agent.provider.clone(),
        model: agent.model.clone(),
        temperature: agent_options.and_then(|c| c.temperature),
        max_tokens: agent_options.and_then(|c| c.max_tokens),
        output_key: task.output_key.clone(),
        tools: plan.inline_tools.clone(),
        tool_config: agent.tool_config.clone(),
    }
}

fn standalone_config(
    registry: &NodeTypeRegistry,
    agent: &AgentSpec,
    reference: &str,
) -> ToolNodeConfig {
    // Identity template over the node type's declared input ports
    let mut args_template = BTreeMap::new();
    if let Some(def) = registry.get(reference) {
        for port in &def.ports.inputs {
            args_template.insert(port.name.clone(), format!("{{{{.{}}}}}", port.name));
        }
    }

    let mut config = ToolNodeConfig {
        args_template,
        ..Default::default()
    };

    let (tool_name, action) = split_tool_ref(reference);
    if let Some(action_name) = action {
        config.tool_name = Some(tool_name.to_string());
        config.action_name = Some(action_name.to_string());
        config.tool_config = agent.tool_config.get(tool_name).cloned();
    }

    config
}

/// Wire `{{tasks.REF.output}}` input references and `context` entries as
/// predecessor edges. Unresolved references are skipped; validation has
/// already surfaced them.
fn emit_reference_edges(
    workflow: &AgentWorkflow,
    plans: &BTreeMap<String, TaskPlan>,
    output_nodes: &BTreeMap<String, String>,
    graph: &mut GraphDefinition,
) {
    for (name, task) in &workflow.tasks {
        let Some(plan) = plans.get(name) else { continue };

        for (param, expression) in &task.inputs {
            for reference in template::extract_task_refs(expression) {
                if let Some(source) = output_nodes.get(&reference) {
                    graph
                        .edges
                        .push(EdgeDef::new(source, "output", &plan.start_node, param));
                }
            }
        }

        for entry in &task.context {
            if let Some(source) = output_nodes.get(entry) {
                graph
                    .edges
                    .push(EdgeDef::new(source, "output", &plan.start_node, "context"));
            }
        }
    }
}
