//! Graph validation
//!
//! Two entry points: `validate_structure` needs only the graph document;
//! `validate_with_registry` adds the checks that require the node-type
//! catalog. Both are pure and return diagnostics in detection order.
//!
//! Expression syntax checking is pluggable so this module never depends on
//! the expression evaluator.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::diagnostics::{Diagnostic, conditional as cn, graph as gr};
use crate::graph::GraphDefinition;
use crate::registry::{NodeTypeRegistry, ToolMode, builtin};

/// Pluggable syntax check for conditional expressions
pub type ExpressionCheck = dyn Fn(&str) -> Result<(), String> + Send + Sync;

/// Branch names the runtime reserves for its own envelope keys
const RESERVED_BRANCH_NAMES: &[&str] = &["error", "_metadata"];

/// Structural validation: no registry required
pub fn validate_structure(
    graph: &GraphDefinition,
    expression_check: Option<&ExpressionCheck>,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let node_ids = check_duplicates(graph, &mut diagnostics);
    check_endpoints(graph, &node_ids, &mut diagnostics);
    check_cycles(graph, &node_ids, &mut diagnostics);
    check_orphans(graph, &mut diagnostics);
    check_entry(graph, &node_ids, &mut diagnostics);
    check_conditionals(graph, expression_check, &mut diagnostics);

    diagnostics
}

/// Structural checks plus the registry-aware rules
pub fn validate_with_registry(
    graph: &GraphDefinition,
    registry: &NodeTypeRegistry,
    expression_check: Option<&ExpressionCheck>,
) -> Vec<Diagnostic> {
    let mut diagnostics = validate_structure(graph, expression_check);

    for node in &graph.nodes {
        let Some(def) = registry.get(&node.node_type) else {
            diagnostics.push(Diagnostic::error(
                gr::UNKNOWN_NODE_TYPE,
                format!("node '{}' has unknown type '{}'", node.id, node.node_type),
            ));
            continue;
        };

        // Function-call tools never appear as standalone nodes
        if def.is_tool && registry.tool_mode(&node.node_type) == Some(ToolMode::FunctionCall) {
            diagnostics.push(Diagnostic::error(
                gr::FUNCTION_CALL_AS_NODE,
                format!(
                    "node '{}' uses function-call tool '{}' as a standalone node",
                    node.id, node.node_type
                ),
            ));
        }

        if def.is_trigger() && graph.edges.iter().any(|e| e.target == node.id) {
            diagnostics.push(Diagnostic::error(
                gr::TRIGGER_WITH_INBOUND,
                format!("trigger node '{}' has inbound edges", node.id),
            ));
        }

        // Source handles must be declared output ports, unless the type's
        // output set is config-defined
        if !def.dynamic_outputs {
            let outputs: BTreeSet<&str> =
                def.ports.outputs.iter().map(|p| p.name.as_str()).collect();
            for edge in graph.edges.iter().filter(|e| e.source == node.id) {
                if !outputs.contains(edge.source_handle.as_str()) {
                    diagnostics.push(Diagnostic::error(
                        gr::UNKNOWN_SOURCE_HANDLE,
                        format!(
                            "edge from '{}' uses undeclared output port '{}'",
                            node.id, edge.source_handle
                        ),
                    ));
                }
            }
        }
    }

    diagnostics
}

fn check_duplicates<'a>(
    graph: &'a GraphDefinition,
    diagnostics: &mut Vec<Diagnostic>,
) -> BTreeSet<&'a str> {
    let mut seen = BTreeSet::new();
    for node in &graph.nodes {
        if !seen.insert(node.id.as_str()) {
            diagnostics.push(Diagnostic::error(
                gr::DUPLICATE_NODE_ID,
                format!("duplicate node id '{}'", node.id),
            ));
        }
    }
    seen
}

fn check_endpoints(
    graph: &GraphDefinition,
    node_ids: &BTreeSet<&str>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for edge in &graph.edges {
        for endpoint in [&edge.source, &edge.target] {
            if !node_ids.contains(endpoint.as_str()) {
                diagnostics.push(Diagnostic::error(
                    gr::UNKNOWN_ENDPOINT,
                    format!(
                        "edge {} -> {} references unknown node '{}'",
                        edge.source, edge.target, endpoint
                    ),
                ));
            }
        }
    }
}

/// Kahn's algorithm over edges whose endpoints both resolve
fn check_cycles(
    graph: &GraphDefinition,
    node_ids: &BTreeSet<&str>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let mut in_degree: BTreeMap<&str, usize> = node_ids.iter().map(|id| (*id, 0)).collect();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for edge in &graph.edges {
        if node_ids.contains(edge.source.as_str()) && node_ids.contains(edge.target.as_str()) {
            if let Some(degree) = in_degree.get_mut(edge.target.as_str()) {
                *degree += 1;
            }
            dependents
                .entry(edge.source.as_str())
                .or_default()
                .push(edge.target.as_str());
        }
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut processed = 0usize;

    while let Some(id) = queue.pop_front() {
        processed += 1;
        for dependent in dependents.get(id).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(dependent);
                }
            }
        }
    }

    if processed < node_ids.len() {
        let members: Vec<&str> = in_degree
            .iter()
            .filter(|(_, d)| **d > 0)
            .map(|(id, _)| *id)
            .collect();
        diagnostics.push(Diagnostic::error(
            gr::CYCLE,
            format!("graph contains a cycle involving: {}", members.join(", ")),
        ));
    }
}

/// Orphan warning; a single-node graph is legitimately edge-free
fn check_orphans(graph: &GraphDefinition, diagnostics: &mut Vec<Diagnostic>) {
    if graph.nodes.len() <= 1 {
        return;
    }
    for node in &graph.nodes {
        let connected = graph
            .edges
            .iter()
            .any(|e| e.source == node.id || e.target == node.id);
        if !connected {
            diagnostics.push(Diagnostic::warning(
                gr::ORPHAN_NODE,
                format!("node '{}' is not connected to any edge", node.id),
            ));
        }
    }
}

fn check_entry(
    graph: &GraphDefinition,
    node_ids: &BTreeSet<&str>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if let Some(entry) = &graph.entry {
        if !node_ids.contains(entry.as_str()) {
            diagnostics.push(Diagnostic::error(
                gr::UNKNOWN_ENTRY,
                format!("entry references non-existent node '{}'", entry),
            ));
        }
    }
}

fn check_conditionals(
    graph: &GraphDefinition,
    expression_check: Option<&ExpressionCheck>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for node in &graph.nodes {
        if node.node_type != builtin::CONDITIONAL {
            continue;
        }

        let conditions = node
            .config
            .get("conditions")
            .and_then(|c| c.as_object())
            .filter(|c| !c.is_empty());

        let Some(conditions) = conditions else {
            diagnostics.push(Diagnostic::error(
                cn::NO_CONDITIONS,
                format!("conditional node '{}' declares no conditions", node.id),
            ));
            continue;
        };

        for (branch, expression) in conditions {
            if RESERVED_BRANCH_NAMES.contains(&branch.as_str()) {
                diagnostics.push(Diagnostic::error(
                    cn::RESERVED_BRANCH_NAME,
                    format!(
                        "conditional node '{}' uses reserved branch name '{}'",
                        node.id, branch
                    ),
                ));
            }

            if let (Some(check), Some(expression)) = (expression_check, expression.as_str()) {
                if let Err(reason) = check(expression) {
                    diagnostics.push(Diagnostic::error(
                        cn::BAD_EXPRESSION,
                        format!(
                            "conditional node '{}' branch '{}' has invalid expression: {}",
                            node.id, branch, reason
                        ),
                    ));
                }
            }

            let has_downstream = graph
                .edges
                .iter()
                .any(|e| e.source == node.id && e.source_handle == *branch);
            if !has_downstream {
                diagnostics.push(Diagnostic::warning(
                    cn::BRANCH_NO_DOWNSTREAM,
                    format!(
                        "conditional node '{}' branch '{}' has no downstream edge",
                        node.id, branch
                    ),
                ));
            }
        }

        if node.config.get("default").and_then(|d| d.as_str()).is_none() {
            diagnostics.push(Diagnostic::warning(
                cn::NO_DEFAULT,
                format!("conditional node '{}' has no default branch", node.id),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeDef, NodeDef};
    use crate::registry::{NodeTypeDef, PortDef, PortType, category};

    fn graph(nodes: Vec<NodeDef>, edges: Vec<EdgeDef>) -> GraphDefinition {
        GraphDefinition {
            id: "g".to_string(),
            version: "1".to_string(),
            nodes,
            edges,
            ..Default::default()
        }
    }

    fn codes_of(diagnostics: &[Diagnostic]) -> Vec<&str> {
        diagnostics.iter().map(|d| d.code.as_str()).collect()
    }

    #[test]
    fn test_clean_graph() {
        let g = graph(
            vec![NodeDef::new("a", "llm_prompt"), NodeDef::new("b", "llm_prompt")],
            vec![EdgeDef::new("a", "output", "b", "input")],
        );
        assert!(validate_structure(&g, None).is_empty());
    }

    #[test]
    fn test_unknown_endpoint() {
        let g = graph(
            vec![NodeDef::new("a", "llm_prompt")],
            vec![EdgeDef::new("a", "output", "missing", "input")],
        );
        assert!(codes_of(&validate_structure(&g, None)).contains(&gr::UNKNOWN_ENDPOINT));
    }

    #[test]
    fn test_duplicate_node_id() {
        let g = graph(
            vec![NodeDef::new("a", "llm_prompt"), NodeDef::new("a", "merge")],
            Vec::new(),
        );
        assert!(codes_of(&validate_structure(&g, None)).contains(&gr::DUPLICATE_NODE_ID));
    }

    #[test]
    fn test_cycle_detected() {
        let g = graph(
            vec![NodeDef::new("a", "llm_prompt"), NodeDef::new("b", "llm_prompt")],
            vec![
                EdgeDef::new("a", "output", "b", "input"),
                EdgeDef::new("b", "output", "a", "input"),
            ],
        );
        assert!(codes_of(&validate_structure(&g, None)).contains(&gr::CYCLE));
    }

    #[test]
    fn test_orphan_warning_skipped_for_single_node() {
        let single = graph(vec![NodeDef::new("a", "llm_prompt")], Vec::new());
        assert!(validate_structure(&single, None).is_empty());

        let double = graph(
            vec![
                NodeDef::new("a", "llm_prompt"),
                NodeDef::new("b", "llm_prompt"),
                NodeDef::new("c", "llm_prompt"),
            ],
            vec![EdgeDef::new("a", "output", "b", "input")],
        );
        let diagnostics = validate_structure(&double, None);
        let orphan = diagnostics.iter().find(|d| d.code == gr::ORPHAN_NODE).unwrap();
        assert!(!orphan.is_error());
        assert!(orphan.message.contains("'c'"));
    }

    #[test]
    fn test_bad_entry() {
        let mut g = graph(vec![NodeDef::new("a", "llm_prompt")], Vec::new());
        g.entry = Some("nope".to_string());
        assert!(codes_of(&validate_structure(&g, None)).contains(&gr::UNKNOWN_ENTRY));
    }

    fn conditional_node(config: serde_json::Value) -> GraphDefinition {
        graph(
            vec![
                NodeDef::new("src", "llm_prompt"),
                NodeDef::new("cond", "conditional").with_config(config),
                NodeDef::new("dst", "llm_prompt"),
            ],
            vec![
                EdgeDef::new("src", "output", "cond", "input"),
                EdgeDef::new("cond", "dst", "dst", "input"),
            ],
        )
    }

    #[test]
    fn test_conditional_missing_conditions() {
        let g = conditional_node(serde_json::json!({}));
        assert!(codes_of(&validate_structure(&g, None)).contains(&cn::NO_CONDITIONS));
    }

    #[test]
    fn test_conditional_reserved_branch() {
        let g = conditional_node(serde_json::json!({
            "conditions": {"error": "x > 1"},
            "default": "_skip"
        }));
        assert!(codes_of(&validate_structure(&g, None)).contains(&cn::RESERVED_BRANCH_NAME));
    }

    #[test]
    fn test_conditional_no_default_warns() {
        let g = conditional_node(serde_json::json!({
            "conditions": {"dst": "x > 1"}
        }));
        let diagnostics = validate_structure(&g, None);
        let warning = diagnostics.iter().find(|d| d.code == cn::NO_DEFAULT).unwrap();
        assert!(!warning.is_error());
    }

    #[test]
    fn test_conditional_branch_without_downstream_warns() {
        let g = conditional_node(serde_json::json!({
            "conditions": {"elsewhere": "x > 1"},
            "default": "_skip"
        }));
        assert!(codes_of(&validate_structure(&g, None)).contains(&cn::BRANCH_NO_DOWNSTREAM));
    }

    #[test]
    fn test_conditional_expression_check_plugged_in() {
        let g = conditional_node(serde_json::json!({
            "conditions": {"dst": "x ==="},
            "default": "_skip"
        }));
        let check: Box<ExpressionCheck> = Box::new(|expr: &str| {
            if expr.contains("===") {
                Err("unexpected token".to_string())
            } else {
                Ok(())
            }
        });
        assert!(codes_of(&validate_structure(&g, Some(&*check))).contains(&cn::BAD_EXPRESSION));
    }

    #[test]
    fn test_registry_unknown_type() {
        let g = graph(vec![NodeDef::new("a", "mystery")], Vec::new());
        let diagnostics = validate_with_registry(&g, &NodeTypeRegistry::new(), None);
        assert!(codes_of(&diagnostics).contains(&gr::UNKNOWN_NODE_TYPE));
    }

    #[test]
    fn test_registry_bad_source_handle() {
        let g = graph(
            vec![NodeDef::new("a", "llm_prompt"), NodeDef::new("b", "llm_prompt")],
            vec![EdgeDef::new("a", "result", "b", "input")],
        );
        let diagnostics = validate_with_registry(&g, &NodeTypeRegistry::new(), None);
        assert!(codes_of(&diagnostics).contains(&gr::UNKNOWN_SOURCE_HANDLE));
    }

    #[test]
    fn test_registry_conditional_source_handles_exempt() {
        let registry = NodeTypeRegistry::new();
        let g = graph(
            vec![
                NodeDef::new("cond", "conditional").with_config(serde_json::json!({
                    "conditions": {"dst": "x > 1"},
                    "default": "_skip"
                })),
                NodeDef::new("dst", "llm_prompt"),
            ],
            vec![EdgeDef::new("cond", "dst", "dst", "input")],
        );
        let diagnostics = validate_with_registry(&g, &registry, None);
        assert!(!codes_of(&diagnostics).contains(&gr::UNKNOWN_SOURCE_HANDLE));
    }

    #[test]
    fn test_registry_function_call_tool_as_node() {
        let registry = NodeTypeRegistry::new();
        registry.register(
            NodeTypeDef::new("search.query", category::TOOL)
                .with_tool_mode(Some(ToolMode::FunctionCall))
                .with_ports(Vec::new(), vec![PortDef::new("output", PortType::Object)]),
        );

        let g = graph(vec![NodeDef::new("s", "search.query")], Vec::new());
        let diagnostics = validate_with_registry(&g, &registry, None);
        assert!(codes_of(&diagnostics).contains(&gr::FUNCTION_CALL_AS_NODE));
    }

    #[test]
    fn test_registry_trigger_inbound() {
        let g = graph(
            vec![
                NodeDef::new("hook", "webhook_trigger"),
                NodeDef::new("a", "llm_prompt"),
            ],
            vec![EdgeDef::new("a", "output", "hook", "input")],
        );
        let diagnostics = validate_with_registry(&g, &NodeTypeRegistry::new(), None);
        assert!(codes_of(&diagnostics).contains(&gr::TRIGGER_WITH_INBOUND));
    }
}
