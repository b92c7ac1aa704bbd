//! Template placeholder grammar
//!
//! User-authored documents reference values in two forms:
//!
//! ```text
//! {{input.query}}              workflow input field
//! {{tasks.research.output}}    another task's output, optional sub-path
//! ```
//!
//! The compiler rewrites these to the runtime envelope form (`{{.query}}`,
//! `{{.research__researcher_output}}`). The grammar lives here so the
//! compiler, the validators, and the edge extractor stay in agreement.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static INPUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*input\.([A-Za-z][A-Za-z0-9_]*)\s*\}\}").expect("input placeholder regex")
});

static TASK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*tasks\.([a-z][a-z0-9_]*)\.output((?:\.[A-Za-z0-9_]+)*)\s*\}\}")
        .expect("task placeholder regex")
});

static CONDITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"tasks\.([a-z][a-z0-9_]*)\.output((?:\.[A-Za-z0-9_]+)*)")
        .expect("condition reference regex")
});

/// Task names referenced via `{{tasks.X.output}}`, distinct, in order of
/// first appearance
pub fn extract_task_refs(template: &str) -> Vec<String> {
    let mut refs = Vec::new();
    for captures in TASK_RE.captures_iter(template) {
        let name = captures[1].to_string();
        if !refs.contains(&name) {
            refs.push(name);
        }
    }
    refs
}

/// True if the template contains any placeholder the rewriter acts on
pub fn has_placeholders(template: &str) -> bool {
    INPUT_RE.is_match(template) || TASK_RE.is_match(template)
}

/// Rewrite user placeholders to the runtime envelope form
///
/// `output_nodes` maps task name to that task's output node id. References
/// to tasks absent from the map are left intact; the workflow validator has
/// already reported them.
pub fn rewrite(template: &str, output_nodes: &BTreeMap<String, String>) -> String {
    let pass_one = INPUT_RE.replace_all(template, "{{.$1}}");

    TASK_RE
        .replace_all(&pass_one, |captures: &regex::Captures| {
            let task = &captures[1];
            let sub_path = &captures[2];
            match output_nodes.get(task) {
                Some(node_id) => format!("{{{{.{}_output{}}}}}", node_id, sub_path),
                None => captures[0].to_string(),
            }
        })
        .into_owned()
}

/// Rewrite a condition expression
///
/// Conditions use the bare form `tasks.T.output[.SUB]` (no braces); it maps
/// to `NODEID_output[.SUB]`. Unknown tasks are left intact.
pub fn rewrite_condition(expression: &str, output_nodes: &BTreeMap<String, String>) -> String {
    CONDITION_RE
        .replace_all(expression, |captures: &regex::Captures| {
            let task = &captures[1];
            let sub_path = &captures[2];
            match output_nodes.get(task) {
                Some(node_id) => format!("{}_output{}", node_id, sub_path),
                None => captures[0].to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_rewrite_input_placeholder() {
        let result = rewrite("Summarize {{input.topic}} briefly", &BTreeMap::new());
        assert_eq!(result, "Summarize {{.topic}} briefly");
    }

    #[test]
    fn test_rewrite_task_placeholder() {
        let result = rewrite(
            "Use {{tasks.research.output}}",
            &nodes(&[("research", "research__researcher")]),
        );
        assert_eq!(result, "Use {{.research__researcher_output}}");
    }

    #[test]
    fn test_rewrite_task_placeholder_with_sub_path() {
        let result = rewrite(
            "Score: {{tasks.review.output.score}}",
            &nodes(&[("review", "review__critic")]),
        );
        assert_eq!(result, "Score: {{.review__critic_output.score}}");
    }

    #[test]
    fn test_unknown_task_left_intact() {
        let template = "Use {{tasks.ghost.output}}";
        let result = rewrite(template, &nodes(&[("research", "research__r")]));
        assert_eq!(result, template);
    }

    #[test]
    fn test_rewrite_mixed_placeholders() {
        let result = rewrite(
            "{{input.query}} + {{tasks.a.output}}",
            &nodes(&[("a", "a__agent")]),
        );
        assert_eq!(result, "{{.query}} + {{.a__agent_output}}");
    }

    #[test]
    fn test_extract_task_refs_distinct_in_order() {
        let refs = extract_task_refs(
            "{{tasks.b.output}} then {{tasks.a.output}} then {{tasks.b.output.x}}",
        );
        assert_eq!(refs, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_extract_ignores_input_placeholders() {
        let refs = extract_task_refs("{{input.a}} and nothing else");
        assert!(refs.is_empty());
    }

    #[test]
    fn test_rewrite_condition() {
        let result = rewrite_condition(
            "tasks.check.output.approved == true",
            &nodes(&[("check", "check__reviewer")]),
        );
        assert_eq!(result, "check__reviewer_output.approved == true");
    }

    #[test]
    fn test_rewrite_condition_unknown_task_intact() {
        let expression = "tasks.ghost.output > 1";
        let result = rewrite_condition(expression, &BTreeMap::new());
        assert_eq!(result, expression);
    }

    #[test]
    fn test_has_placeholders() {
        assert!(has_placeholders("{{input.x}}"));
        assert!(has_placeholders("{{tasks.t.output}}"));
        assert!(!has_placeholders("plain text {not a placeholder}"));
    }

    #[test]
    fn test_whitespace_tolerant() {
        let result = rewrite("{{ input.q }}", &BTreeMap::new());
        assert_eq!(result, "{{.q}}");
    }
}
