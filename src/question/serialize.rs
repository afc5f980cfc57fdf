//! Tree serializer: detach closures into registry handles, then emit JSON.

use serde_json::Value;

use crate::error::{OpError, OpResult};
use crate::func::{CustomizedFunc, FuncRegistry};
use crate::question::model::{Dynamic, QTreeNode, Question, SelectionChange, Validation};

impl<T: Clone> Dynamic<T> {
    /// Copy with a live closure parked in `registry` and replaced by its
    /// reference. Literal values and existing references pass through.
    pub fn detach(&self, registry: &FuncRegistry) -> Dynamic<T> {
        match self {
            Dynamic::Func(f) => {
                Dynamic::Reference(registry.register(CustomizedFunc::Local(f.clone())))
            }
            other => other.clone(),
        }
    }
}

impl Validation {
    pub fn detach(&self, registry: &FuncRegistry) -> Validation {
        match self {
            Validation::Func(f) => {
                Validation::Reference(registry.register(CustomizedFunc::Validate(f.clone())))
            }
            other => other.clone(),
        }
    }
}

impl SelectionChange {
    pub fn detach(&self, registry: &FuncRegistry) -> SelectionChange {
        match self {
            SelectionChange::Func(f) => SelectionChange::Reference(
                registry.register(CustomizedFunc::SelectionChange(f.clone())),
            ),
            SelectionChange::Reference(r) => SelectionChange::Reference(*r),
        }
    }
}

/// Deep copy of the tree with every closure-valued field replaced by a
/// `{kind, handle}` reference. The source tree is untouched; its closures
/// stay callable through the registry.
pub fn detach_tree(root: &QTreeNode, registry: &FuncRegistry) -> QTreeNode {
    let data = match &root.data {
        Question::Group(g) => Question::Group(g.clone()),
        Question::Text(q) => {
            let mut q = q.clone();
            q.default = q.default.map(|d| d.detach(registry));
            q.placeholder = q.placeholder.map(|d| d.detach(registry));
            q.prompt = q.prompt.map(|d| d.detach(registry));
            q.validation = q.validation.map(|v| v.detach(registry));
            Question::Text(q)
        }
        Question::SingleSelect(q) => {
            let mut q = q.clone();
            q.dynamic_options = q.dynamic_options.map(|d| d.detach(registry));
            q.default = q.default.map(|d| d.detach(registry));
            q.placeholder = q.placeholder.map(|d| d.detach(registry));
            q.prompt = q.prompt.map(|d| d.detach(registry));
            q.validation = q.validation.map(|v| v.detach(registry));
            Question::SingleSelect(q)
        }
        Question::MultiSelect(q) => {
            let mut q = q.clone();
            q.dynamic_options = q.dynamic_options.map(|d| d.detach(registry));
            q.default = q.default.map(|d| d.detach(registry));
            q.placeholder = q.placeholder.map(|d| d.detach(registry));
            q.prompt = q.prompt.map(|d| d.detach(registry));
            q.validation = q.validation.map(|v| v.detach(registry));
            q.on_selection_change = q.on_selection_change.map(|s| s.detach(registry));
            Question::MultiSelect(q)
        }
        Question::Function(q) => {
            let mut q = q.clone();
            q.func = q.func.detach(registry);
            Question::Function(q)
        }
    };

    QTreeNode {
        data,
        condition: root.condition.as_ref().map(|c| c.detach(registry)),
        children: root.children.iter().map(|c| detach_tree(c, registry)).collect(),
        hidden: root.hidden,
    }
}

/// Detach and serialize in one step, as the operation handlers do before
/// putting a tree on the wire.
pub fn serialize_tree(root: &QTreeNode, registry: &FuncRegistry) -> OpResult<Value> {
    let detached = detach_tree(root, registry);
    serde_json::to_value(&detached)
        .map_err(|e| OpError::assemble("question", format!("tree serialization failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::func::FuncKind;
    use crate::inputs::Inputs;
    use crate::question::model::{MultiSelectQuestion, TextQuestion};
    use serde_json::json;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn closure_heavy_tree() -> QTreeNode {
        let text = QTreeNode::new(Question::Text(TextQuestion {
            name: "app-name".into(),
            title: "Application name".into(),
            password: false,
            default: Some(Dynamic::Func(Arc::new(|inputs: &Inputs| {
                Ok(json!(inputs.answer_str("folder").unwrap_or("my-app")))
            }))),
            placeholder: None,
            prompt: None,
            validation: Some(Validation::Func(Arc::new(|answer, _inputs| {
                if answer.as_str().is_some_and(|s| s.is_empty()) {
                    Ok(json!("name must not be empty"))
                } else {
                    Ok(Value::Null)
                }
            }))),
        }));
        let caps = QTreeNode::new(Question::MultiSelect(MultiSelectQuestion {
            name: "caps".into(),
            title: "Capabilities".into(),
            static_options: vec!["sql".into(), "function".into()],
            dynamic_options: None,
            default: None,
            placeholder: None,
            prompt: None,
            validation: None,
            on_selection_change: Some(SelectionChange::Func(Arc::new(|current, _previous| {
                Ok(current.clone())
            }))),
            return_object: false,
        }));
        QTreeNode::empty().child(text).child(caps)
    }

    #[test]
    fn detach_replaces_closures_and_keeps_structure() {
        let tree = closure_heavy_tree();
        let registry = FuncRegistry::new();
        let wire = serialize_tree(&tree, &registry).unwrap();

        assert_eq!(registry.len(), 3);
        let default = &wire["children"][0]["data"]["default"];
        assert_eq!(default["kind"], json!("LocalFunc"));
        let validation = &wire["children"][0]["data"]["validation"];
        assert_eq!(validation["kind"], json!("ValidateFunc"));
        let reaction = &wire["children"][1]["data"]["onSelectionChange"];
        assert_eq!(reaction["kind"], json!("SelectionChangeFunc"));
        // Literal fields survive untouched.
        assert_eq!(wire["children"][1]["data"]["staticOptions"], json!(["sql", "function"]));
    }

    #[test]
    fn emitted_handles_invoke_the_original_closures() {
        let tree = closure_heavy_tree();
        let registry = FuncRegistry::new();
        let wire = serialize_tree(&tree, &registry).unwrap();

        let default: crate::func::FuncReference =
            serde_json::from_value(wire["children"][0]["data"]["default"].clone()).unwrap();
        let mut inputs = Inputs::default();
        inputs.set_answer("folder", json!("custom"));
        assert_eq!(registry.invoke_local(default, &inputs).unwrap(), json!("custom"));

        let validation: crate::func::FuncReference =
            serde_json::from_value(wire["children"][0]["data"]["validation"].clone()).unwrap();
        assert_eq!(validation.kind, FuncKind::ValidateFunc);
        assert_eq!(
            registry.invoke_validate(validation, &json!(""), &Inputs::default()).unwrap(),
            json!("name must not be empty"),
        );

        let reaction: crate::func::FuncReference = serde_json::from_value(
            wire["children"][1]["data"]["onSelectionChange"].clone(),
        )
        .unwrap();
        let set: BTreeSet<String> = ["sql".to_owned()].into();
        assert_eq!(registry.invoke_selection_change(reaction, &set, &BTreeSet::new()).unwrap(), set);
    }

    #[test]
    fn source_tree_closures_stay_callable_after_detach() {
        let tree = closure_heavy_tree();
        let registry = FuncRegistry::new();
        let _wire = detach_tree(&tree, &registry);

        // The original still carries live closures; serializing it raw fails.
        assert!(serde_json::to_value(&tree).is_err());
    }
}
