//! Workflow document validation
//!
//! A single fail-soft pass: every rule runs, every finding is collected, and
//! the caller decides whether errors abort. The validator never mutates the
//! document or the registry.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::diagnostics::{Diagnostic, workflow as codes};
use crate::registry::NodeTypeRegistry;
use crate::template;
use crate::workflow::{
    AgentWorkflow, KNOWN_PROVIDERS, Strategy, is_valid_identifier, split_tool_ref,
};

/// Validate an agent workflow against the node-type registry
pub fn validate(workflow: &AgentWorkflow, registry: &NodeTypeRegistry) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    check_identifiers(workflow, &mut diagnostics);
    check_agents(workflow, registry, &mut diagnostics);
    check_tasks(workflow, &mut diagnostics);
    check_execution(workflow, &mut diagnostics);
    check_references(workflow, &mut diagnostics);

    diagnostics
}

fn check_identifiers(workflow: &AgentWorkflow, diagnostics: &mut Vec<Diagnostic>) {
    if !workflow.id.is_empty() && !is_valid_identifier(&workflow.id) {
        diagnostics.push(
            Diagnostic::error(
                codes::INVALID_ID_FORMAT,
                format!("workflow id '{}' is not a valid identifier", workflow.id),
            )
            .with_path("$.id"),
        );
    }

    for key in workflow.agents.keys() {
        if !is_valid_identifier(key) {
            diagnostics.push(
                Diagnostic::error(
                    codes::INVALID_ID_FORMAT,
                    format!("agent key '{}' is not a valid identifier", key),
                )
                .with_path(format!("$.agents.{}", key)),
            );
        }
    }

    for key in workflow.tasks.keys() {
        if !is_valid_identifier(key) {
            diagnostics.push(
                Diagnostic::error(
                    codes::INVALID_ID_FORMAT,
                    format!("task key '{}' is not a valid identifier", key),
                )
                .with_path(format!("$.tasks.{}", key)),
            );
        }
    }
}

fn check_agents(
    workflow: &AgentWorkflow,
    registry: &NodeTypeRegistry,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for (name, agent) in &workflow.agents {
        let required = [
            ("role", &agent.role),
            ("goal", &agent.goal),
            ("provider", &agent.provider),
            ("model", &agent.model),
        ];
        for (field, value) in required {
            if value.is_empty() {
                diagnostics.push(
                    Diagnostic::error(
                        codes::MISSING_REQUIRED,
                        format!("agent '{}' is missing required field '{}'", name, field),
                    )
                    .with_path(format!("$.agents.{}.{}", name, field)),
                );
            }
        }

        if !agent.provider.is_empty() && !KNOWN_PROVIDERS.contains(&agent.provider.as_str()) {
            diagnostics.push(
                Diagnostic::error(
                    codes::INVALID_PROVIDER,
                    format!("agent '{}' uses unknown provider '{}'", name, agent.provider),
                )
                .with_path(format!("$.agents.{}.provider", name)),
            );
        }

        for reference in &agent.tools {
            if !registry.has_tool(reference) {
                diagnostics.push(
                    Diagnostic::error(
                        codes::UNKNOWN_TOOL,
                        format!("agent '{}' references unknown tool '{}'", name, reference),
                    )
                    .with_path(format!("$.agents.{}.tools", name)),
                );
            }
        }

        check_tool_config(name, agent, registry, diagnostics);
    }
}

/// `tool_config` keys must name a registered tool, and each option must be a
/// field the tool's config schema declares
fn check_tool_config(
    agent_name: &str,
    agent: &crate::workflow::AgentSpec,
    registry: &NodeTypeRegistry,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for (tool_name, options) in &agent.tool_config {
        if !registry.has_tool(tool_name) {
            diagnostics.push(
                Diagnostic::error(
                    codes::UNKNOWN_TOOL,
                    format!(
                        "agent '{}' configures unknown tool '{}'",
                        agent_name, tool_name
                    ),
                )
                .with_path(format!("$.agents.{}.tool_config.{}", agent_name, tool_name)),
            );
            continue;
        }

        let Some(allowed) = tool_config_fields(registry, tool_name) else {
            continue;
        };
        for option in options.keys() {
            if !allowed.contains(option) {
                diagnostics.push(
                    Diagnostic::error(
                        codes::UNKNOWN_TOOL,
                        format!(
                            "agent '{}' sets unknown config field '{}' on tool '{}'",
                            agent_name, option, tool_name
                        ),
                    )
                    .with_path(format!(
                        "$.agents.{}.tool_config.{}.{}",
                        agent_name, tool_name, option
                    )),
                );
            }
        }
    }
}

/// Field names declared by the tool's `tool_config` schema block, from any
/// of its projected actions
fn tool_config_fields(registry: &NodeTypeRegistry, tool_name: &str) -> Option<BTreeSet<String>> {
    let action_ref = registry.tool_action_refs(tool_name).into_iter().next()?;
    let def = registry.get(&action_ref)?;
    let fields = def
        .config_schema
        .get("properties")?
        .get("tool_config")?
        .get("properties")?
        .as_object()?
        .keys()
        .cloned()
        .collect();
    Some(fields)
}

fn check_tasks(workflow: &AgentWorkflow, diagnostics: &mut Vec<Diagnostic>) {
    for (name, task) in &workflow.tasks {
        let required = [
            ("description", &task.description),
            ("agent", &task.agent),
            ("expected_output", &task.expected_output),
        ];
        for (field, value) in required {
            if value.is_empty() {
                diagnostics.push(
                    Diagnostic::error(
                        codes::MISSING_REQUIRED,
                        format!("task '{}' is missing required field '{}'", name, field),
                    )
                    .with_path(format!("$.tasks.{}.{}", name, field)),
                );
            }
        }

        if !task.agent.is_empty() && !workflow.agents.contains_key(&task.agent) {
            diagnostics.push(
                Diagnostic::error(
                    codes::UNDEFINED_AGENT,
                    format!("task '{}' references undefined agent '{}'", name, task.agent),
                )
                .with_path(format!("$.tasks.{}.agent", name)),
            );
        }
    }
}

fn check_execution(workflow: &AgentWorkflow, diagnostics: &mut Vec<Diagnostic>) {
    let execution = &workflow.execution;

    if execution.strategy.is_empty() {
        diagnostics.push(
            Diagnostic::error(
                codes::MISSING_REQUIRED,
                "execution is missing required field 'strategy'",
            )
            .with_path("$.execution.strategy"),
        );
        return;
    }

    let Some(strategy) = Strategy::parse(&execution.strategy) else {
        diagnostics.push(
            Diagnostic::error(
                codes::INVALID_STRATEGY,
                format!("unknown execution strategy '{}'", execution.strategy),
            )
            .with_path("$.execution.strategy"),
        );
        return;
    };

    match strategy {
        Strategy::Sequential => check_task_order(workflow, diagnostics),
        Strategy::Hierarchical => {
            match &execution.manager_agent {
                Some(manager) if workflow.agents.contains_key(manager) => {}
                Some(manager) => diagnostics.push(
                    Diagnostic::error(
                        codes::UNDEFINED_AGENT,
                        format!("manager_agent '{}' is not a defined agent", manager),
                    )
                    .with_path("$.execution.manager_agent"),
                ),
                None => diagnostics.push(
                    Diagnostic::error(
                        codes::MISSING_REQUIRED,
                        "hierarchical strategy requires 'manager_agent'",
                    )
                    .with_path("$.execution.manager_agent"),
                ),
            }
        }
        Strategy::Custom => check_custom(workflow, diagnostics),
        Strategy::Parallel => {}
    }
}

fn check_task_order(workflow: &AgentWorkflow, diagnostics: &mut Vec<Diagnostic>) {
    let order = &workflow.execution.task_order;

    if order.is_empty() {
        diagnostics.push(
            Diagnostic::error(
                codes::MISSING_TASK_ORDER,
                "sequential strategy requires a non-empty 'task_order'",
            )
            .with_path("$.execution.task_order"),
        );
        return;
    }

    for task in order {
        if !workflow.tasks.contains_key(task) {
            diagnostics.push(
                Diagnostic::error(
                    codes::MISSING_TASK_ORDER,
                    format!("task_order references undefined task '{}'", task),
                )
                .with_path("$.execution.task_order"),
            );
        }
    }

    for task in workflow.tasks.keys() {
        if !order.contains(task) {
            diagnostics.push(
                Diagnostic::error(
                    codes::MISSING_TASK_ORDER,
                    format!("task_order omits defined task '{}'", task),
                )
                .with_path("$.execution.task_order"),
            );
        }
    }
}

fn check_custom(workflow: &AgentWorkflow, diagnostics: &mut Vec<Diagnostic>) {
    let declared = &workflow.execution.tasks;

    // Dependencies must name defined tasks
    for (task, spec) in declared {
        for dep in &spec.depends_on {
            if !workflow.tasks.contains_key(dep) {
                diagnostics.push(
                    Diagnostic::error(
                        codes::UNRESOLVED_REF,
                        format!("task '{}' depends on undefined task '{}'", task, dep),
                    )
                    .with_path(format!("$.execution.tasks.{}.depends_on", task)),
                );
            }
        }
    }

    // Cycle detection over the depends_on relation (Kahn's algorithm)
    if let Some(cycle_members) = find_cycle(declared) {
        diagnostics.push(
            Diagnostic::error(
                codes::CYCLE_DETECTED,
                format!(
                    "dependency cycle involving: {}",
                    cycle_members.join(", ")
                ),
            )
            .with_path("$.execution.tasks"),
        );
    }

    // Every defined task must appear in the execution block
    let mut referenced: BTreeSet<&str> = declared.keys().map(String::as_str).collect();
    for spec in declared.values() {
        for dep in &spec.depends_on {
            referenced.insert(dep.as_str());
        }
    }
    for task in workflow.tasks.keys() {
        if !referenced.contains(task.as_str()) {
            diagnostics.push(
                Diagnostic::error(
                    codes::ORPHAN_TASK,
                    format!("task '{}' is not referenced by the execution block", task),
                )
                .with_path(format!("$.tasks.{}", task)),
            );
        }
    }
}

/// Kahn's algorithm; returns the tasks left unprocessed when a cycle exists
fn find_cycle(declared: &BTreeMap<String, crate::workflow::CustomTaskSpec>) -> Option<Vec<String>> {
    let mut in_degree: BTreeMap<&str, usize> = declared.keys().map(|k| (k.as_str(), 0)).collect();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for (task, spec) in declared {
        for dep in &spec.depends_on {
            if declared.contains_key(dep) {
                *in_degree.get_mut(task.as_str())? += 1;
                dependents.entry(dep.as_str()).or_default().push(task);
            }
        }
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(k, _)| *k)
        .collect();
    let mut processed = 0usize;

    while let Some(task) = queue.pop_front() {
        processed += 1;
        if let Some(next) = dependents.get(task) {
            for dependent in next {
                let degree = in_degree.get_mut(dependent)?;
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(dependent);
                }
            }
        }
    }

    if processed == declared.len() {
        None
    } else {
        let remaining = in_degree
            .iter()
            .filter(|(_, d)| **d > 0)
            .map(|(k, _)| k.to_string())
            .collect();
        Some(remaining)
    }
}

/// `{{tasks.X.output}}` references and `context` entries must name defined
/// tasks
fn check_references(workflow: &AgentWorkflow, diagnostics: &mut Vec<Diagnostic>) {
    for (name, task) in &workflow.tasks {
        for (param, expression) in &task.inputs {
            for reference in template::extract_task_refs(expression) {
                if !workflow.tasks.contains_key(&reference) {
                    diagnostics.push(
                        Diagnostic::error(
                            codes::UNRESOLVED_REF,
                            format!(
                                "task '{}' input '{}' references undefined task '{}'",
                                name, param, reference
                            ),
                        )
                        .with_path(format!("$.tasks.{}.inputs.{}", name, param)),
                    );
                }
            }
        }

        for entry in &task.context {
            if !workflow.tasks.contains_key(entry) {
                diagnostics.push(
                    Diagnostic::error(
                        codes::UNRESOLVED_REF,
                        format!("task '{}' context references undefined task '{}'", name, entry),
                    )
                    .with_path(format!("$.tasks.{}.context", name)),
                );
            }
        }
    }
}
