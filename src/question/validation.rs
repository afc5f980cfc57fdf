//! Literal validation rules.
//!
//! A rule is a bag of optional checks evaluated against a JSON answer
//! (string or string array). Every present check must pass. A check whose
//! shape does not fit the answer (a length bound against an array, an item
//! bound against a string) fails rather than being skipped.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equals: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contains_all: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contains_any: Option<Vec<String>>,
}

impl ValidationRule {
    /// Convenience constructor for the common equality condition.
    pub fn equals(value: impl Into<Value>) -> Self {
        Self { equals: Some(value.into()), ..Self::default() }
    }

    /// Convenience constructor for the set-membership condition.
    pub fn contains(id: impl Into<String>) -> Self {
        Self { contains: Some(id.into()), ..Self::default() }
    }

    /// True when every present check passes against `answer`.
    pub fn passes(&self, answer: &Value) -> bool {
        let as_str = answer.as_str();
        let as_items: Option<Vec<&str>> = answer
            .as_array()
            .map(|items| items.iter().filter_map(Value::as_str).collect());

        if let Some(expected) = &self.equals {
            if answer != expected {
                return false;
            }
        }
        if let Some(allowed) = &self.one_of {
            match as_str {
                Some(s) if allowed.iter().any(|a| a == s) => {}
                _ => return false,
            }
        }
        if let Some(pattern) = &self.pattern {
            match (Regex::new(pattern), as_str) {
                (Ok(re), Some(s)) if re.is_match(s) => {}
                _ => return false,
            }
        }
        if let Some(min) = self.min_length {
            if as_str.is_none_or(|s| s.chars().count() < min) {
                return false;
            }
        }
        if let Some(max) = self.max_length {
            if as_str.is_none_or(|s| s.chars().count() > max) {
                return false;
            }
        }
        if let Some(min) = self.min_items {
            if as_items.as_ref().is_none_or(|items| items.len() < min) {
                return false;
            }
        }
        if let Some(max) = self.max_items {
            if as_items.as_ref().is_none_or(|items| items.len() > max) {
                return false;
            }
        }
        if let Some(needle) = &self.contains {
            if as_items.as_ref().is_none_or(|items| !items.contains(&needle.as_str())) {
                return false;
            }
        }
        if let Some(all) = &self.contains_all {
            match &as_items {
                Some(items) if all.iter().all(|n| items.contains(&n.as_str())) => {}
                _ => return false,
            }
        }
        if let Some(any) = &self.contains_any {
            match &as_items {
                Some(items) if any.iter().any(|n| items.contains(&n.as_str())) => {}
                _ => return false,
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equals_matches_strings_and_arrays() {
        assert!(ValidationRule::equals("yes").passes(&json!("yes")));
        assert!(!ValidationRule::equals("yes").passes(&json!("no")));
        assert!(ValidationRule::equals(json!(["a", "b"])).passes(&json!(["a", "b"])));
    }

    #[test]
    fn pattern_and_length_apply_to_strings_only() {
        let rule = ValidationRule {
            pattern: Some("^[a-z][a-z0-9-]*$".into()),
            min_length: Some(2),
            max_length: Some(10),
            ..ValidationRule::default()
        };
        assert!(rule.passes(&json!("my-app")));
        assert!(!rule.passes(&json!("A")));
        assert!(!rule.passes(&json!(["my-app"])));
    }

    #[test]
    fn invalid_pattern_never_passes() {
        let rule = ValidationRule { pattern: Some("(".into()), ..ValidationRule::default() };
        assert!(!rule.passes(&json!("anything")));
    }

    #[test]
    fn item_checks_apply_to_string_arrays() {
        let rule = ValidationRule {
            min_items: Some(1),
            contains: Some("sql".into()),
            contains_any: Some(vec!["tab".into(), "bot".into()]),
            ..ValidationRule::default()
        };
        assert!(rule.passes(&json!(["sql", "bot"])));
        assert!(!rule.passes(&json!(["sql"])));
        assert!(!rule.passes(&json!("sql")));
    }

    #[test]
    fn one_of_checks_membership() {
        let rule = ValidationRule {
            one_of: Some(vec!["vs".into(), "cli".into()]),
            ..ValidationRule::default()
        };
        assert!(rule.passes(&json!("cli")));
        assert!(!rule.passes(&json!("web")));
    }

    #[test]
    fn empty_rule_passes_anything() {
        assert!(ValidationRule::default().passes(&json!(null)));
    }
}
