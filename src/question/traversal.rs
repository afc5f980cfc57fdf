//! Tree traversal: `flatten` and answer-driven `filter`.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::error::{OpError, OpResult};
use crate::inputs::Inputs;
use crate::question::model::{QTreeNode, Question, SelectionChange, Validation};

/// Source identity stamped on traversal errors.
const SOURCE: &str = "question";

/// Pre-order list of the non-group nodes of the tree. Group nodes are
/// structural only; their children are visited in place.
pub fn flatten(root: &QTreeNode) -> Vec<&QTreeNode> {
    let mut out = Vec::new();
    fn walk<'a>(node: &'a QTreeNode, out: &mut Vec<&'a QTreeNode>) {
        if !node.data.is_group() {
            out.push(node);
        }
        for child in &node.children {
            walk(child, out);
        }
    }
    walk(root, &mut out);
    out
}

/// Prune the tree down to the named question answered with `value`.
///
/// The matched node comes back `hidden` with only the direct children whose
/// condition passes against the resolved answer. A missing name, a group
/// match, or a value that resolves to no option yields the empty sentinel
/// tree. A match one level below the root is re-wrapped under a shell copy
/// of the root; deeper matches would need the whole ancestor chain
/// reconstructed and are rejected outright.
pub fn filter(root: &QTreeNode, name: &str, value: &Value) -> OpResult<QTreeNode> {
    let Some(path) = find_path(root, name) else {
        return Ok(QTreeNode::empty());
    };
    let matched = *path.last().unwrap_or(&root);

    let answer = match resolve_answer(matched, value)? {
        Some(answer) => answer,
        None => return Ok(QTreeNode::empty()),
    };

    let mut pruned = QTreeNode::new(matched.data.clone());
    pruned.condition = matched.condition.clone();
    pruned.hidden = true;
    for child in &matched.children {
        if condition_passes(child.condition.as_ref(), &answer)? {
            pruned.children.push(child.clone());
        }
    }

    match path.len() - 1 {
        0 => Ok(pruned),
        1 => {
            let mut shell = QTreeNode::new(root.data.clone());
            shell.condition = root.condition.clone();
            shell.children.push(pruned);
            Ok(shell)
        }
        depth => Err(OpError::not_implemented(
            SOURCE,
            format!("pruning a question {depth} levels deep (ancestor chain reconstruction)"),
        )),
    }
}

/// Root-to-match node path, or None when no node carries the name.
fn find_path<'a>(root: &'a QTreeNode, name: &str) -> Option<Vec<&'a QTreeNode>> {
    fn walk<'a>(node: &'a QTreeNode, name: &str, path: &mut Vec<&'a QTreeNode>) -> bool {
        path.push(node);
        if node.name() == Some(name) {
            return true;
        }
        for child in &node.children {
            if walk(child, name, path) {
                return true;
            }
        }
        path.pop();
        false
    }
    let mut path = Vec::new();
    walk(root, name, &mut path).then_some(path)
}

/// Kind-specific answer resolution. `Ok(None)` means the value cannot be
/// mapped onto the question and the caller should return the empty tree.
fn resolve_answer(node: &QTreeNode, value: &Value) -> OpResult<Option<Value>> {
    match &node.data {
        Question::Group(_) => Ok(None),
        Question::Text(_) => Ok(Some(value.clone())),
        Question::SingleSelect(q) => {
            let Some(wanted) = value.as_str() else { return Ok(None) };
            let exact = q.static_options.iter().find(|o| o.id() == wanted);
            let resolved = exact.or_else(|| {
                q.static_options.iter().find(|o| o.id().eq_ignore_ascii_case(wanted))
            });
            Ok(resolved.map(|o| Value::String(o.id().to_owned())))
        }
        Question::MultiSelect(q) => {
            let Some(items) = value.as_array() else { return Ok(None) };
            // Unknown ids are dropped, not errors.
            let selected: BTreeSet<String> = items
                .iter()
                .filter_map(Value::as_str)
                .filter(|id| q.static_options.iter().any(|o| o.id() == *id))
                .map(str::to_owned)
                .collect();
            let final_set = match &q.on_selection_change {
                Some(SelectionChange::Func(react)) => react(&selected, &BTreeSet::new())?,
                Some(SelectionChange::Reference(r)) => {
                    return Err(OpError::assemble(
                        SOURCE,
                        format!("selection reaction for handle {} is detached and cannot run here", r.handle),
                    ));
                }
                None => selected,
            };
            Ok(Some(Value::Array(final_set.into_iter().map(Value::String).collect())))
        }
        Question::Function(_) => Err(OpError::not_implemented(
            SOURCE,
            format!("pruning a function question ({:?})", node.name()),
        )),
    }
}

fn condition_passes(condition: Option<&Validation>, answer: &Value) -> OpResult<bool> {
    match condition {
        None => Ok(true),
        Some(Validation::Rule(rule)) => Ok(rule.passes(answer)),
        Some(Validation::Func(check)) => {
            let verdict = check(answer, &Inputs::default())?;
            Ok(matches!(verdict, Value::Null | Value::Bool(true)))
        }
        Some(Validation::Reference(r)) => Err(OpError::assemble(
            SOURCE,
            format!("condition for handle {} is detached and cannot run here", r.handle),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::model::{
        GroupNode, MultiSelectQuestion, SingleSelectQuestion, TextQuestion,
    };
    use crate::question::validation::ValidationRule;
    use serde_json::json;
    use std::sync::Arc;

    fn text(name: &str) -> QTreeNode {
        QTreeNode::new(Question::Text(TextQuestion {
            name: name.into(),
            title: name.into(),
            password: false,
            default: None,
            placeholder: None,
            prompt: None,
            validation: None,
        }))
    }

    fn single(name: &str, options: &[&str]) -> QTreeNode {
        QTreeNode::new(Question::SingleSelect(SingleSelectQuestion {
            name: name.into(),
            title: name.into(),
            static_options: options.iter().map(|o| (*o).into()).collect(),
            dynamic_options: None,
            default: None,
            placeholder: None,
            prompt: None,
            validation: None,
            return_object: false,
            skip_single_option: false,
        }))
    }

    fn multi(name: &str, options: &[&str], reaction: Option<SelectionChange>) -> QTreeNode {
        QTreeNode::new(Question::MultiSelect(MultiSelectQuestion {
            name: name.into(),
            title: name.into(),
            static_options: options.iter().map(|o| (*o).into()).collect(),
            dynamic_options: None,
            default: None,
            placeholder: None,
            prompt: None,
            validation: None,
            on_selection_change: reaction,
            return_object: false,
        }))
    }

    fn sample_tree() -> QTreeNode {
        QTreeNode::new(Question::Group(GroupNode { name: Some("root".into()) }))
            .child(single("scaffold-kind", &["tab", "bot"]).child(
                text("bot-id").with_condition(Validation::Rule(ValidationRule::equals("bot"))),
            ))
            .child(text("app-name"))
    }

    #[test]
    fn flatten_drops_groups_and_keeps_preorder() {
        let tree = sample_tree();
        let names: Vec<_> = flatten(&tree).iter().map(|n| n.name().unwrap()).collect();
        assert_eq!(names, ["scaffold-kind", "bot-id", "app-name"]);
    }

    #[test]
    fn filter_unknown_name_gives_empty_tree() {
        let out = filter(&sample_tree(), "nope", &json!("x")).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn filter_unresolvable_option_gives_empty_tree() {
        let out = filter(&sample_tree(), "scaffold-kind", &json!("spa")).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn filter_single_select_is_case_insensitive_fallback() {
        let out = filter(&sample_tree(), "scaffold-kind", &json!("BOT")).unwrap();
        // Depth-1 match comes back wrapped under a shell of the root.
        assert_eq!(out.name(), Some("root"));
        let matched = &out.children[0];
        assert!(matched.hidden);
        assert_eq!(matched.name(), Some("scaffold-kind"));
        // The bot-only child survives the condition check.
        assert_eq!(matched.children.len(), 1);
        assert_eq!(matched.children[0].name(), Some("bot-id"));
    }

    #[test]
    fn filter_condition_failure_drops_child() {
        let out = filter(&sample_tree(), "scaffold-kind", &json!("tab")).unwrap();
        assert!(out.children[0].children.is_empty());
    }

    #[test]
    fn filter_root_match_needs_no_shell() {
        let root = single("scaffold-kind", &["tab"]);
        let out = filter(&root, "scaffold-kind", &json!("tab")).unwrap();
        assert!(out.hidden);
        assert_eq!(out.name(), Some("scaffold-kind"));
    }

    #[test]
    fn filter_multi_select_drops_unknown_ids() {
        let keep_unknown = text("needs-unknown")
            .with_condition(Validation::Rule(ValidationRule::contains("unknown-id")));
        let keep_sql =
            text("needs-sql").with_condition(Validation::Rule(ValidationRule::contains("sql")));
        let root = multi("caps", &["sql", "tab"], None).child(keep_unknown).child(keep_sql);

        let out = filter(&root, "caps", &json!(["sql", "unknown-id"])).unwrap();
        assert!(out.hidden);
        // The unknown id was dropped before the children were checked.
        let names: Vec<_> = out.children.iter().map(|c| c.name().unwrap()).collect();
        assert_eq!(names, ["needs-sql"]);
    }

    #[test]
    fn filter_function_question_is_rejected() {
        use crate::question::model::{Dynamic, FunctionQuestion};
        let root = QTreeNode::new(Question::Function(FunctionQuestion {
            name: "compute".into(),
            title: None,
            func: Dynamic::Value(json!(null)),
        }));
        let err = filter(&root, "compute", &json!(1)).unwrap_err();
        assert_eq!(err.name(), "NotImplemented");
    }

    #[test]
    fn filter_deep_match_is_rejected() {
        let tree = QTreeNode::new(Question::Group(GroupNode { name: Some("root".into()) }))
            .child(QTreeNode::new(Question::Group(GroupNode { name: Some("mid".into()) })).child(text("leaf")));
        let err = filter(&tree, "leaf", &json!("x")).unwrap_err();
        assert_eq!(err.name(), "NotImplemented");
    }

    #[test]
    fn filter_reaction_output_is_the_final_answer() {
        let reaction = SelectionChange::Func(Arc::new(|current, _previous| {
            let mut out = current.clone();
            if current.contains("sql") {
                out.insert("function".to_owned());
            }
            Ok(out)
        }));
        let root = multi("caps", &["sql", "function"], Some(reaction)).child(
            text("sql-user")
                .with_condition(Validation::Rule(ValidationRule::contains("function"))),
        );
        let out = filter(&root, "caps", &json!(["sql"])).unwrap();
        // "function" was auto-added by the reaction, so the child condition
        // checking for it passes.
        assert_eq!(out.children.len(), 1);
        assert_eq!(out.children[0].name(), Some("sql-user"));
    }
}
