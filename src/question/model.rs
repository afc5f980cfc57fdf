//! Question tree model.
//!
//! Every closure-capable field is an enum with a live-closure arm and a
//! serialized-reference arm. The live arm never crosses the wire: attempting
//! to serialize one is an error, and the serializer module detaches closures
//! into registry handles first.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::func::{FuncReference, LocalFunc, SelectionChangeFunc, ValidateFunc};
use crate::question::validation::ValidationRule;

const DETACH_REQUIRED: &str = "live function must be detached before serialization";

/// Field that is either a literal value, a live closure computing the value
/// from the answer bag, or a detached closure reference.
#[derive(Clone)]
pub enum Dynamic<T> {
    Value(T),
    Func(LocalFunc),
    Reference(FuncReference),
}

impl<T: std::fmt::Debug> std::fmt::Debug for Dynamic<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dynamic::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Dynamic::Func(_) => f.write_str("Func(..)"),
            Dynamic::Reference(r) => f.debug_tuple("Reference").field(r).finish(),
        }
    }
}

impl<T: Serialize> Serialize for Dynamic<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Dynamic::Value(v) => v.serialize(serializer),
            Dynamic::Func(_) => Err(serde::ser::Error::custom(DETACH_REQUIRED)),
            Dynamic::Reference(r) => r.serialize(serializer),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Dynamic<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        // A reference is a strict {kind, handle} object; anything else is a
        // literal value.
        if let Ok(r) = FuncReference::deserialize(raw.clone()) {
            return Ok(Dynamic::Reference(r));
        }
        T::deserialize(raw).map(Dynamic::Value).map_err(serde::de::Error::custom)
    }
}

/// Validator or condition: a literal rule, a live closure, or a reference.
#[derive(Clone)]
pub enum Validation {
    Rule(ValidationRule),
    Func(ValidateFunc),
    Reference(FuncReference),
}

impl std::fmt::Debug for Validation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Validation::Rule(r) => f.debug_tuple("Rule").field(r).finish(),
            Validation::Func(_) => f.write_str("Func(..)"),
            Validation::Reference(r) => f.debug_tuple("Reference").field(r).finish(),
        }
    }
}

impl Serialize for Validation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Validation::Rule(r) => r.serialize(serializer),
            Validation::Func(_) => Err(serde::ser::Error::custom(DETACH_REQUIRED)),
            Validation::Reference(r) => r.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Validation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        if let Ok(r) = FuncReference::deserialize(raw.clone()) {
            return Ok(Validation::Reference(r));
        }
        ValidationRule::deserialize(raw)
            .map(Validation::Rule)
            .map_err(serde::de::Error::custom)
    }
}

/// Multi-select reaction: a live closure or a reference.
#[derive(Clone)]
pub enum SelectionChange {
    Func(SelectionChangeFunc),
    Reference(FuncReference),
}

impl std::fmt::Debug for SelectionChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionChange::Func(_) => f.write_str("Func(..)"),
            SelectionChange::Reference(r) => f.debug_tuple("Reference").field(r).finish(),
        }
    }
}

impl Serialize for SelectionChange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SelectionChange::Func(_) => Err(serde::ser::Error::custom(DETACH_REQUIRED)),
            SelectionChange::Reference(r) => r.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for SelectionChange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        FuncReference::deserialize(deserializer).map(SelectionChange::Reference)
    }
}

/// One selectable option: either a bare id or a full item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StaticOption {
    Id(String),
    Item(OptionItem),
}

impl StaticOption {
    pub fn id(&self) -> &str {
        match self {
            StaticOption::Id(id) => id,
            StaticOption::Item(item) => &item.id,
        }
    }
}

impl From<&str> for StaticOption {
    fn from(id: &str) -> Self {
        StaticOption::Id(id.to_owned())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionItem {
    pub id: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupNode {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextQuestion {
    pub name: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub password: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Dynamic<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<Dynamic<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<Dynamic<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<Validation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleSelectQuestion {
    pub name: String,
    pub title: String,
    pub static_options: Vec<StaticOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic_options: Option<Dynamic<Vec<StaticOption>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Dynamic<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<Dynamic<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<Dynamic<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<Validation>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub return_object: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skip_single_option: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiSelectQuestion {
    pub name: String,
    pub title: String,
    pub static_options: Vec<StaticOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic_options: Option<Dynamic<Vec<StaticOption>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Dynamic<Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<Dynamic<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<Dynamic<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<Validation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_selection_change: Option<SelectionChange>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub return_object: bool,
}

/// Question whose "answer" is produced by running a closure server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionQuestion {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub func: Dynamic<Value>,
}

/// All question kinds, tagged on the wire by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Question {
    Group(GroupNode),
    Text(TextQuestion),
    SingleSelect(SingleSelectQuestion),
    MultiSelect(MultiSelectQuestion),
    Function(FunctionQuestion),
}

impl Question {
    pub fn name(&self) -> Option<&str> {
        match self {
            Question::Group(g) => g.name.as_deref(),
            Question::Text(q) => Some(&q.name),
            Question::SingleSelect(q) => Some(&q.name),
            Question::MultiSelect(q) => Some(&q.name),
            Question::Function(q) => Some(&q.name),
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Question::Group(_))
    }
}

/// One node of the question tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QTreeNode {
    pub data: Question,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<Validation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<QTreeNode>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
}

impl QTreeNode {
    pub fn new(data: Question) -> Self {
        Self { data, condition: None, children: Vec::new(), hidden: false }
    }

    /// Sentinel for "no questions": an unnamed group with no children.
    pub fn empty() -> Self {
        Self::new(Question::Group(GroupNode::default()))
    }

    pub fn is_empty(&self) -> bool {
        matches!(&self.data, Question::Group(g) if g.name.is_none()) && self.children.is_empty()
    }

    pub fn with_condition(mut self, condition: Validation) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn child(mut self, node: QTreeNode) -> Self {
        self.children.push(node);
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.data.name()
    }

    /// Checks that no name repeats along any root-to-leaf path.
    pub fn validate_names(&self) -> Result<(), String> {
        fn walk(node: &QTreeNode, path: &mut Vec<String>) -> Result<(), String> {
            let pushed = match node.name() {
                Some(name) => {
                    if path.iter().any(|n| n == name) {
                        return Err(format!("duplicate question name on path: {name}"));
                    }
                    path.push(name.to_owned());
                    true
                }
                None => false,
            };
            for child in &node.children {
                walk(child, path)?;
            }
            if pushed {
                path.pop();
            }
            Ok(())
        }
        walk(self, &mut Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    #[test]
    fn wire_tags_match_the_protocol() {
        let node = text("app-name");
        let v = serde_json::to_value(&node).unwrap();
        assert_eq!(v["data"]["type"], json!("text"));
        assert_eq!(v["data"]["name"], json!("app-name"));
        assert!(v.get("hidden").is_none());
        assert!(v.get("children").is_none());
    }

    #[test]
    fn serializing_a_live_closure_fails() {
        let mut q = text("q");
        if let Question::Text(t) = &mut q.data {
            t.default = Some(Dynamic::Func(Arc::new(|_| Ok(json!("d")))));
        }
        let err = serde_json::to_value(&q).unwrap_err();
        assert!(err.to_string().contains("detached"));
    }

    #[test]
    fn dynamic_deserializes_reference_or_literal() {
        let r: Dynamic<String> = serde_json::from_value(json!({"kind": "LocalFunc", "handle": 3})).unwrap();
        assert!(matches!(r, Dynamic::Reference(_)));
        let v: Dynamic<String> = serde_json::from_value(json!("plain")).unwrap();
        assert!(matches!(v, Dynamic::Value(s) if s == "plain"));
    }

    #[test]
    fn validation_deserializes_rule_or_reference() {
        let rule: Validation = serde_json::from_value(json!({"equals": "yes"})).unwrap();
        assert!(matches!(rule, Validation::Rule(_)));
        let r: Validation = serde_json::from_value(json!({"kind": "ValidateFunc", "handle": 1})).unwrap();
        assert!(matches!(r, Validation::Reference(_)));
    }

    #[test]
    fn empty_sentinel_round_trips() {
        let node = QTreeNode::empty();
        assert!(node.is_empty());
        let back: QTreeNode =
            serde_json::from_value(serde_json::to_value(&node).unwrap()).unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn duplicate_name_on_a_path_is_rejected() {
        let tree = text("a").child(text("b").child(text("a")));
        assert!(tree.validate_names().is_err());

        // Same name on sibling branches is fine.
        let tree = QTreeNode::empty().child(text("x")).child(text("x"));
        assert!(tree.validate_names().is_ok());
    }
}
