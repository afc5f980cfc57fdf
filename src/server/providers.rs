//! Outbound capability adapters.
//!
//! Each adapter implements one capability trait by forwarding over the
//! connection: notifications for logging and telemetry, requests for tokens
//! and user interaction. The UI adapter routes closure-valued config fields
//! through the registry first, so validators written next to a prompt keep
//! working across the boundary.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::error::{OpError, OpResult};
use crate::func::FuncRegistry;
use crate::tools::{
    ConfirmConfig, InputTextConfig, LogLevel, LogProvider, MessageLevel, MultiSelectConfig,
    SelectFileConfig, SelectFolderConfig, SingleSelectConfig, Subscription, TelemetryMeasurements,
    TelemetryProperties, TelemetryReporter, TokenProvider, TokenStatus, Toolbox, UserInteraction,
};
use crate::transport::MessageConnection;

/// Full toolbox of wire adapters sharing one connection and one registry.
pub fn wire_toolbox(conn: &Arc<MessageConnection>, registry: &Arc<FuncRegistry>) -> Toolbox {
    Toolbox {
        logger: Arc::new(WireLogger { conn: Arc::clone(conn) }),
        telemetry: Arc::new(WireTelemetry { conn: Arc::clone(conn) }),
        tokens: Arc::new(WireTokenProvider { conn: Arc::clone(conn) }),
        ui: Arc::new(WireUserInteraction {
            conn: Arc::clone(conn),
            registry: Arc::clone(registry),
        }),
    }
}

fn decode<T: DeserializeOwned>(side: &str, value: Value) -> OpResult<T> {
    serde_json::from_value(value)
        .map_err(|e| OpError::assemble(side, format!("malformed capability reply: {e}")))
}

// === Logging ===

pub struct WireLogger {
    conn: Arc<MessageConnection>,
}

impl LogProvider for WireLogger {
    fn show(&self, level: LogLevel, message: &str) {
        let _ = self.conn.send_notification("logger/show", json!([level, message]));
    }

    fn log(&self, level: LogLevel, message: &str) {
        let method = format!("logger/{}", level.method_name());
        let _ = self.conn.send_notification(&method, json!([message]));
    }
}

// === Telemetry ===

pub struct WireTelemetry {
    conn: Arc<MessageConnection>,
}

impl TelemetryReporter for WireTelemetry {
    fn send_event(
        &self,
        name: &str,
        properties: TelemetryProperties,
        measurements: TelemetryMeasurements,
    ) {
        let _ = self
            .conn
            .send_notification("telemetry/send-event", json!([name, properties, measurements]));
    }

    fn send_error_event(
        &self,
        name: &str,
        properties: TelemetryProperties,
        measurements: TelemetryMeasurements,
    ) {
        let _ = self.conn.send_notification(
            "telemetry/send-error-event",
            json!([name, properties, measurements]),
        );
    }

    fn send_exception(
        &self,
        error: &OpError,
        properties: TelemetryProperties,
        measurements: TelemetryMeasurements,
    ) {
        let _ = self.conn.send_notification(
            "telemetry/send-exception",
            json!([error, properties, measurements]),
        );
    }
}

// === Tokens ===

pub struct WireTokenProvider {
    conn: Arc<MessageConnection>,
}

#[async_trait]
impl TokenProvider for WireTokenProvider {
    async fn get_access_token(&self, scopes: Vec<String>) -> OpResult<String> {
        let out = self.conn.send_request("token/get-access-token", json!([scopes])).await?;
        decode(self.conn.side(), out)
    }

    async fn get_json_object(&self, scopes: Vec<String>) -> OpResult<Value> {
        self.conn.send_request("token/get-json-object", json!([scopes])).await
    }

    async fn get_status(&self) -> OpResult<TokenStatus> {
        let out = self.conn.send_request("token/get-status", json!([])).await?;
        decode(self.conn.side(), out)
    }

    async fn list_subscriptions(&self) -> OpResult<Vec<Subscription>> {
        let out = self.conn.send_request("token/list-subscriptions", json!([])).await?;
        decode(self.conn.side(), out)
    }

    async fn set_subscription(&self, subscription_id: String) -> OpResult<()> {
        self.conn.send_request("token/set-subscription", json!([subscription_id])).await?;
        Ok(())
    }

    async fn get_selected_subscription(&self) -> OpResult<Option<Subscription>> {
        let out = self.conn.send_request("token/get-selected-subscription", json!([])).await?;
        decode(self.conn.side(), out)
    }
}

// === User interaction ===

pub struct WireUserInteraction {
    conn: Arc<MessageConnection>,
    registry: Arc<FuncRegistry>,
}

#[async_trait]
impl UserInteraction for WireUserInteraction {
    async fn select_option(&self, config: SingleSelectConfig) -> OpResult<Value> {
        let config = config.detach(&self.registry);
        self.conn.send_request("ui/select-option", json!([config])).await
    }

    async fn select_options(&self, config: MultiSelectConfig) -> OpResult<Value> {
        let config = config.detach(&self.registry);
        self.conn.send_request("ui/select-options", json!([config])).await
    }

    async fn input_text(&self, config: InputTextConfig) -> OpResult<String> {
        let config = config.detach(&self.registry);
        let out = self.conn.send_request("ui/input-text", json!([config])).await?;
        decode(self.conn.side(), out)
    }

    async fn select_file(&self, config: SelectFileConfig) -> OpResult<PathBuf> {
        let config = config.detach(&self.registry);
        let out = self.conn.send_request("ui/select-file", json!([config])).await?;
        decode(self.conn.side(), out)
    }

    async fn select_files(&self, config: SelectFileConfig) -> OpResult<Vec<PathBuf>> {
        let config = config.detach(&self.registry);
        let out = self.conn.send_request("ui/select-files", json!([config])).await?;
        decode(self.conn.side(), out)
    }

    async fn select_folder(&self, config: SelectFolderConfig) -> OpResult<PathBuf> {
        let config = config.detach(&self.registry);
        let out = self.conn.send_request("ui/select-folder", json!([config])).await?;
        decode(self.conn.side(), out)
    }

    async fn open_url(&self, url: &str) -> OpResult<bool> {
        let out = self.conn.send_request("ui/open-url", json!([url])).await?;
        decode(self.conn.side(), out)
    }

    async fn show_message(
        &self,
        level: MessageLevel,
        message: &str,
        modal: bool,
        items: Vec<String>,
    ) -> OpResult<Option<String>> {
        let out = self
            .conn
            .send_request("ui/show-message", json!([level, message, modal, items]))
            .await?;
        decode(self.conn.side(), out)
    }

    async fn confirm(&self, config: ConfirmConfig) -> OpResult<bool> {
        let out = self.conn.send_request("ui/confirm", json!([config])).await?;
        decode(self.conn.side(), out)
    }
}
