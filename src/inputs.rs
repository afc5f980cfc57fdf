//! Shared answer bag passed into every operation.
//!
//! `Inputs` is the single argument of every server operation: a handful of
//! well-known fields plus an open map of question-name → answer pairs. The
//! open part is kept as raw JSON so the bag can round-trip answers whose
//! shape the bridge does not know about.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Host surface the request originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "vs")]
    Vs,
    #[serde(rename = "vsc")]
    VsCode,
    #[serde(rename = "cli")]
    Cli,
}

impl Default for Platform {
    fn default() -> Self {
        Platform::VsCode
    }
}

/// Lifecycle stage an operation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    Create,
    Debug,
    Provision,
    Deploy,
    Publish,
    CreateTunnel,
    SyncManifest,
}

/// Answer bag for one operation. Known fields are typed; everything else
/// lands in `answers` keyed by question name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inputs {
    pub platform: Platform,
    #[serde(rename = "projectPath", skip_serializing_if = "Option::is_none")]
    pub project_path: Option<PathBuf>,
    #[serde(rename = "correlationId", skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(flatten)]
    pub answers: Map<String, Value>,
}

impl Inputs {
    pub fn new(platform: Platform) -> Self {
        Self { platform, ..Self::default() }
    }

    /// Answer for a question name, if one was recorded.
    pub fn answer(&self, name: &str) -> Option<&Value> {
        self.answers.get(name)
    }

    /// Record an answer, replacing any previous value for the name.
    pub fn set_answer(&mut self, name: impl Into<String>, value: Value) {
        self.answers.insert(name.into(), value);
    }

    /// String answer, if the recorded value is a string.
    pub fn answer_str(&self, name: &str) -> Option<&str> {
        self.answer(name).and_then(Value::as_str)
    }

    /// Multi-select answer as a sorted set of option ids. Non-string array
    /// elements are skipped.
    pub fn answer_set(&self, name: &str) -> Option<BTreeSet<String>> {
        let items = self.answer(name)?.as_array()?;
        Some(items.iter().filter_map(Value::as_str).map(str::to_owned).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_fields_round_trip_through_answers() {
        let raw = json!({
            "platform": "cli",
            "projectPath": "/tmp/app",
            "scaffold-capabilities": ["tab", "bot"],
            "app-name": "demo",
        });
        let inputs: Inputs = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(inputs.platform, Platform::Cli);
        assert_eq!(inputs.answer_str("app-name"), Some("demo"));
        assert_eq!(
            inputs.answer_set("scaffold-capabilities").unwrap(),
            BTreeSet::from(["bot".to_owned(), "tab".to_owned()]),
        );

        let back = serde_json::to_value(&inputs).unwrap();
        assert_eq!(back["scaffold-capabilities"], raw["scaffold-capabilities"]);
        assert_eq!(back["app-name"], raw["app-name"]);
    }

    #[test]
    fn platform_uses_short_wire_names() {
        assert_eq!(serde_json::to_value(Platform::VsCode).unwrap(), json!("vsc"));
        assert_eq!(serde_json::to_value(Platform::Vs).unwrap(), json!("vs"));
    }

    #[test]
    fn platform_is_required_on_the_wire() {
        let err = serde_json::from_value::<Inputs>(json!({"projectPath": "/tmp/app"}));
        assert!(err.is_err());
    }

    #[test]
    fn missing_answer_is_none() {
        let inputs = Inputs::new(Platform::Cli);
        assert!(inputs.answer("nope").is_none());
        assert!(inputs.answer_set("nope").is_none());
    }
}
