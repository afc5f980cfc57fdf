//! Capability traits and their wire-facing config types.
//!
//! The core's business logic never talks to the transport directly; it sees
//! a `Toolbox` of four capability traits (logging, telemetry, tokens, user
//! interaction). Each side of the bridge supplies adapters: outbound ones
//! that forward calls over the connection, or local ones backed by a real
//! logger/UI.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{OpError, OpResult};
use crate::func::FuncRegistry;
use crate::question::{SelectionChange, StaticOption, Validation};

// === Logging ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warning = 3,
    Error = 4,
    Fatal = 5,
}

impl LogLevel {
    /// Wire method suffix for the per-level notification.
    pub fn method_name(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Fatal => "fatal",
        }
    }
}

impl From<LogLevel> for u8 {
    fn from(level: LogLevel) -> u8 {
        level as u8
    }
}

impl TryFrom<u8> for LogLevel {
    type Error = String;

    fn try_from(raw: u8) -> Result<Self, String> {
        match raw {
            0 => Ok(LogLevel::Trace),
            1 => Ok(LogLevel::Debug),
            2 => Ok(LogLevel::Info),
            3 => Ok(LogLevel::Warning),
            4 => Ok(LogLevel::Error),
            5 => Ok(LogLevel::Fatal),
            other => Err(format!("unknown log level {other}")),
        }
    }
}

/// Log sink. `show` surfaces the message to the user; `log` records it.
pub trait LogProvider: Send + Sync {
    fn show(&self, level: LogLevel, message: &str);
    fn log(&self, level: LogLevel, message: &str);

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }
    fn warning(&self, message: &str) {
        self.log(LogLevel::Warning, message);
    }
    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

// === Telemetry ===

pub type TelemetryProperties = HashMap<String, String>;
pub type TelemetryMeasurements = HashMap<String, f64>;

/// Fire-and-forget telemetry sink.
pub trait TelemetryReporter: Send + Sync {
    fn send_event(
        &self,
        name: &str,
        properties: TelemetryProperties,
        measurements: TelemetryMeasurements,
    );
    fn send_error_event(
        &self,
        name: &str,
        properties: TelemetryProperties,
        measurements: TelemetryMeasurements,
    );
    fn send_exception(
        &self,
        error: &OpError,
        properties: TelemetryProperties,
        measurements: TelemetryMeasurements,
    );
}

// === Tokens ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_info: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub subscription_name: String,
    pub subscription_id: String,
    pub tenant_id: String,
}

/// Credential access, served by whichever side owns the sign-in session.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn get_access_token(&self, scopes: Vec<String>) -> OpResult<String>;
    async fn get_json_object(&self, scopes: Vec<String>) -> OpResult<Value>;
    async fn get_status(&self) -> OpResult<TokenStatus>;
    async fn list_subscriptions(&self) -> OpResult<Vec<Subscription>>;
    async fn set_subscription(&self, subscription_id: String) -> OpResult<()>;
    async fn get_selected_subscription(&self) -> OpResult<Option<Subscription>>;
}

// === User interaction ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleSelectConfig {
    pub name: String,
    pub title: String,
    pub options: Vec<StaticOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<Validation>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub return_object: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiSelectConfig {
    pub name: String,
    pub title: String,
    pub options: Vec<StaticOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<Validation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_selection_change: Option<SelectionChange>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub return_object: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputTextConfig {
    pub name: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub password: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<Validation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectFileConfig {
    pub name: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<PathBuf>,
    /// Display-name → extension list, e.g. `{"Archives": ["zip"]}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<HashMap<String, Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<Validation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectFolderConfig {
    pub name: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<Validation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmConfig {
    pub name: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub default: bool,
}

impl SingleSelectConfig {
    pub fn detach(&self, registry: &FuncRegistry) -> Self {
        let mut out = self.clone();
        out.validation = out.validation.map(|v| v.detach(registry));
        out
    }
}

impl MultiSelectConfig {
    pub fn detach(&self, registry: &FuncRegistry) -> Self {
        let mut out = self.clone();
        out.validation = out.validation.map(|v| v.detach(registry));
        out.on_selection_change = out.on_selection_change.map(|s| s.detach(registry));
        out
    }
}

impl InputTextConfig {
    pub fn detach(&self, registry: &FuncRegistry) -> Self {
        let mut out = self.clone();
        out.validation = out.validation.map(|v| v.detach(registry));
        out
    }
}

impl SelectFileConfig {
    pub fn detach(&self, registry: &FuncRegistry) -> Self {
        let mut out = self.clone();
        out.validation = out.validation.map(|v| v.detach(registry));
        out
    }
}

impl SelectFolderConfig {
    pub fn detach(&self, registry: &FuncRegistry) -> Self {
        let mut out = self.clone();
        out.validation = out.validation.map(|v| v.detach(registry));
        out
    }
}

/// Interactive prompts answered by whoever owns the actual UI.
#[async_trait]
pub trait UserInteraction: Send + Sync {
    /// Returns the selected id, or the full item when `return_object` is set.
    async fn select_option(&self, config: SingleSelectConfig) -> OpResult<Value>;
    async fn select_options(&self, config: MultiSelectConfig) -> OpResult<Value>;
    async fn input_text(&self, config: InputTextConfig) -> OpResult<String>;
    async fn select_file(&self, config: SelectFileConfig) -> OpResult<PathBuf>;
    async fn select_files(&self, config: SelectFileConfig) -> OpResult<Vec<PathBuf>>;
    async fn select_folder(&self, config: SelectFolderConfig) -> OpResult<PathBuf>;
    async fn open_url(&self, url: &str) -> OpResult<bool>;
    /// Returns the chosen item, or None when dismissed.
    async fn show_message(
        &self,
        level: MessageLevel,
        message: &str,
        modal: bool,
        items: Vec<String>,
    ) -> OpResult<Option<String>>;
    async fn confirm(&self, config: ConfirmConfig) -> OpResult<bool>;
}

/// The capability bundle handed to the engine.
#[derive(Clone)]
pub struct Toolbox {
    pub logger: Arc<dyn LogProvider>,
    pub telemetry: Arc<dyn TelemetryReporter>,
    pub tokens: Arc<dyn TokenProvider>,
    pub ui: Arc<dyn UserInteraction>,
}

impl std::fmt::Debug for Toolbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Toolbox")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc as StdArc;

    #[test]
    fn log_levels_are_numeric_on_the_wire() {
        assert_eq!(serde_json::to_value(LogLevel::Info).unwrap(), json!(2));
        let back: LogLevel = serde_json::from_value(json!(4)).unwrap();
        assert_eq!(back, LogLevel::Error);
        assert!(serde_json::from_value::<LogLevel>(json!(9)).is_err());
    }

    #[test]
    fn select_config_with_live_validator_must_be_detached() {
        let config = SingleSelectConfig {
            name: "env".into(),
            title: "Environment".into(),
            options: vec!["dev".into(), "prod".into()],
            default: None,
            placeholder: None,
            prompt: None,
            validation: Some(Validation::Func(StdArc::new(|_answer, _inputs| Ok(Value::Null)))),
            return_object: false,
        };
        assert!(serde_json::to_value(&config).is_err());

        let registry = FuncRegistry::new();
        let wire = serde_json::to_value(config.detach(&registry)).unwrap();
        assert_eq!(wire["validation"]["kind"], json!("ValidateFunc"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn multi_select_detaches_the_reaction_too() {
        let config = MultiSelectConfig {
            name: "caps".into(),
            title: "Capabilities".into(),
            options: vec!["tab".into()],
            default: None,
            placeholder: None,
            prompt: None,
            validation: None,
            on_selection_change: Some(SelectionChange::Func(StdArc::new(|current, _previous| {
                Ok(current.clone())
            }))),
            return_object: false,
        };
        let registry = FuncRegistry::new();
        let wire = serde_json::to_value(config.detach(&registry)).unwrap();
        assert_eq!(wire["onSelectionChange"]["kind"], json!("SelectionChangeFunc"));
    }
}
