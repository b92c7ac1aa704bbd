//! Strategy topologies
//!
//! Each strategy maps the per-task node plans onto a concrete edge topology
//! and decides the graph entry.

use std::collections::BTreeMap;

use crate::compiler::TaskPlan;
use crate::error::{Error, Result};
use crate::graph::config::{ConditionalConfig, LlmRouterConfig, MergeConfig, NodeConfig};
use crate::graph::{EdgeDef, GraphDefinition, NodeDef};
use crate::registry::builtin;
use crate::template;
use crate::workflow::{AgentWorkflow, Strategy};

pub(crate) fn apply(
    strategy: Strategy,
    workflow: &AgentWorkflow,
    plans: &BTreeMap<String, TaskPlan>,
    output_nodes: &BTreeMap<String, String>,
    graph: &mut GraphDefinition,
) -> Result<()> {
    match strategy {
        Strategy::Sequential => sequential(workflow, plans, graph),
        Strategy::Parallel => parallel(workflow, plans, graph),
        Strategy::Hierarchical => hierarchical(workflow, plans, graph),
        Strategy::Custom => custom(workflow, plans, output_nodes, graph),
    }
}

/// Chain tasks in declared order; entry is the first task's start node
fn sequential(
    workflow: &AgentWorkflow,
    plans: &BTreeMap<String, TaskPlan>,
    graph: &mut GraphDefinition,
) -> Result<()> {
    let order = &workflow.execution.task_order;

    let mut resolved = Vec::with_capacity(order.len());
    for name in order {
        let plan = plans
            .get(name)
            .ok_or_else(|| Error::Compile(format!("task_order references undefined task '{}'", name)))?;
        resolved.push(plan);
    }

    for window in resolved.windows(2) {
        graph.edges.push(EdgeDef::new(
            &window[0].output_node,
            "output",
            &window[1].start_node,
            "input",
        ));
    }

    if let Some(first) = resolved.first() {
        graph.entry = Some(first.start_node.clone());
    }

    Ok(())
}

/// Fan every task into a synthetic merge node; entry is left to the runtime
fn parallel(
    workflow: &AgentWorkflow,
    plans: &BTreeMap<String, TaskPlan>,
    graph: &mut GraphDefinition,
) -> Result<()> {
    let merge_id = format!("{}__merge", workflow.id);

    let mut node = NodeDef::new(&merge_id, builtin::MERGE);
    if workflow.execution.merge_strategy.is_some() {
        let config = NodeConfig::Merge(MergeConfig {
            strategy: workflow.execution.merge_strategy.clone(),
        });
        node = node.with_config(config.to_value()?);
    }
    graph.nodes.push(node);

    for plan in plans.values() {
        graph
            .edges
            .push(EdgeDef::new(&plan.output_node, "output", &merge_id, "input"));
    }

    Ok(())
}

/// A manager router node delegates to every task and collects results
fn hierarchical(
    workflow: &AgentWorkflow,
    plans: &BTreeMap<String, TaskPlan>,
    graph: &mut GraphDefinition,
) -> Result<()> {
    let manager_name = workflow
        .execution
        .manager_agent
        .as_deref()
        .ok_or_else(|| Error::Compile("hierarchical strategy without manager_agent".to_string()))?;
    let manager = workflow.agents.get(manager_name).ok_or_else(|| {
        Error::Compile(format!("manager_agent '{}' is not defined", manager_name))
    })?;

    let manager_id = format!("{}__manager__{}", workflow.id, manager_name);
    let config = NodeConfig::LlmRouter(LlmRouterConfig {
        system_prompt: format!("You are a {}.\n\nGoal: {}", manager.role, manager.goal),
        provider: manager.provider.clone(),
        model: manager.model.clone(),
    });
    graph.nodes.push(
        NodeDef::new(&manager_id, builtin::LLM_ROUTER).with_config(config.to_value()?),
    );
    graph.entry = Some(manager_id.clone());

    for plan in plans.values() {
        graph
            .edges
            .push(EdgeDef::new(&manager_id, "output", &plan.start_node, "input"));
        graph
            .edges
            .push(EdgeDef::new(&plan.output_node, "output", &manager_id, "input"));
    }

    Ok(())
}

/// Explicit dependency DAG, with conditional gates where declared
fn custom(
    workflow: &AgentWorkflow,
    plans: &BTreeMap<String, TaskPlan>,
    output_nodes: &BTreeMap<String, String>,
    graph: &mut GraphDefinition,
) -> Result<()> {
    // Conditionals created this pass, so multiple deps can share one gate
    let mut conditionals: BTreeMap<String, (usize, ConditionalConfig)> = BTreeMap::new();

    for (name, spec) in &workflow.execution.tasks {
        let Some(plan) = plans.get(name) else { continue };
        let condition = spec.condition.as_deref().filter(|c| !c.is_empty());

        for dep in &spec.depends_on {
            let Some(dep_output) = output_nodes.get(dep) else { continue };

            match condition {
                None => {
                    graph.edges.push(EdgeDef::new(
                        dep_output,
                        "output",
                        &plan.start_node,
                        "input",
                    ));
                }
                Some(expression) => {
                    let cond_id = format!("{}__cond__{}", dep, name);
                    let rewritten = template::rewrite_condition(expression, output_nodes);

                    if let Some((index, config)) = conditionals.get_mut(&cond_id) {
                        // Same gate already emitted; add the branch if new
                        config
                            .conditions
                            .entry(plan.start_node.clone())
                            .or_insert(rewritten);
                        graph.nodes[*index].config =
                            NodeConfig::Conditional(config.clone()).to_value()?;
                    } else {
                        let config = ConditionalConfig {
                            conditions: [(plan.start_node.clone(), rewritten)].into(),
                            default: Some("_skip".to_string()),
                            evaluation_order: Some("first_match".to_string()),
                            pass_through: true,
                        };
                        graph.nodes.push(
                            NodeDef::new(&cond_id, builtin::CONDITIONAL)
                                .with_config(NodeConfig::Conditional(config.clone()).to_value()?),
                        );
                        conditionals.insert(cond_id.clone(), (graph.nodes.len() - 1, config));

                        graph
                            .edges
                            .push(EdgeDef::new(dep_output, "output", &cond_id, "input"));
                    }

                    graph.edges.push(EdgeDef::new(
                        &cond_id,
                        &plan.start_node,
                        &plan.start_node,
                        "input",
                    ));
                }
            }
        }
    }

    // Entry: first task in sorted order with no dependencies
    for (name, plan) in plans {
        let has_deps = workflow
            .execution
            .tasks
            .get(name)
            .is_some_and(|s| !s.depends_on.is_empty());
        if !has_deps {
            graph.entry = Some(plan.start_node.clone());
            break;
        }
    }

    Ok(())
}
