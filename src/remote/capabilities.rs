//! Inbound capability handlers for the remote side.
//!
//! The serving core reaches back over the same connection for logging,
//! telemetry, tokens, and prompts. `serve_capabilities` binds those methods
//! to locally supplied trait implementations.

use std::sync::Arc;

use serde_json::Value;

use crate::error::{OpError, OpResult};
use crate::remote::REMOTE_SOURCE;
use crate::tools::{LogLevel, MessageLevel, TelemetryMeasurements, TelemetryProperties, Toolbox};
use crate::transport::{param, MessageConnection};

/// Register the `logger/`, `telemetry/`, `token/`, and `ui/` methods against
/// `toolbox`. Must run before the connection starts listening.
pub fn serve_capabilities(conn: &Arc<MessageConnection>, toolbox: Toolbox) {
    serve_logger(conn, &toolbox);
    serve_telemetry(conn, &toolbox);
    serve_tokens(conn, &toolbox);
    serve_ui(conn, &toolbox);
}

fn serve_logger(conn: &Arc<MessageConnection>, toolbox: &Toolbox) {
    {
        let logger = Arc::clone(&toolbox.logger);
        conn.on_notification("logger/show", move |params| {
            let logger = Arc::clone(&logger);
            async move {
                if let (Ok(level), Ok(message)) = (
                    param::<LogLevel>(REMOTE_SOURCE, &params, 0),
                    param::<String>(REMOTE_SOURCE, &params, 1),
                ) {
                    logger.show(level, &message);
                }
            }
        });
    }
    {
        let logger = Arc::clone(&toolbox.logger);
        conn.on_notification("logger/log", move |params| {
            let logger = Arc::clone(&logger);
            async move {
                if let (Ok(level), Ok(message)) = (
                    param::<LogLevel>(REMOTE_SOURCE, &params, 0),
                    param::<String>(REMOTE_SOURCE, &params, 1),
                ) {
                    logger.log(level, &message);
                }
            }
        });
    }
    for level in [
        LogLevel::Trace,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warning,
        LogLevel::Error,
        LogLevel::Fatal,
    ] {
        let logger = Arc::clone(&toolbox.logger);
        let method = format!("logger/{}", level.method_name());
        conn.on_notification(method, move |params| {
            let logger = Arc::clone(&logger);
            async move {
                if let Ok(message) = param::<String>(REMOTE_SOURCE, &params, 0) {
                    logger.log(level, &message);
                }
            }
        });
    }
}

fn serve_telemetry(conn: &Arc<MessageConnection>, toolbox: &Toolbox) {
    {
        let telemetry = Arc::clone(&toolbox.telemetry);
        conn.on_notification("telemetry/send-event", move |params| {
            let telemetry = Arc::clone(&telemetry);
            async move {
                if let Ok((name, properties, measurements)) = telemetry_params(&params) {
                    telemetry.send_event(&name, properties, measurements);
                }
            }
        });
    }
    {
        let telemetry = Arc::clone(&toolbox.telemetry);
        conn.on_notification("telemetry/send-error-event", move |params| {
            let telemetry = Arc::clone(&telemetry);
            async move {
                if let Ok((name, properties, measurements)) = telemetry_params(&params) {
                    telemetry.send_error_event(&name, properties, measurements);
                }
            }
        });
    }
    {
        let telemetry = Arc::clone(&toolbox.telemetry);
        conn.on_notification("telemetry/send-exception", move |params| {
            let telemetry = Arc::clone(&telemetry);
            async move {
                let error: Result<OpError, _> = param(REMOTE_SOURCE, &params, 0);
                let properties: TelemetryProperties =
                    param(REMOTE_SOURCE, &params, 1).unwrap_or_default();
                let measurements: TelemetryMeasurements =
                    param(REMOTE_SOURCE, &params, 2).unwrap_or_default();
                if let Ok(error) = error {
                    telemetry.send_exception(&error, properties, measurements);
                }
            }
        });
    }
}

fn telemetry_params(
    params: &Value,
) -> OpResult<(String, TelemetryProperties, TelemetryMeasurements)> {
    let name: String = param(REMOTE_SOURCE, params, 0)?;
    let properties: TelemetryProperties = param(REMOTE_SOURCE, params, 1).unwrap_or_default();
    let measurements: TelemetryMeasurements = param(REMOTE_SOURCE, params, 2).unwrap_or_default();
    Ok((name, properties, measurements))
}

fn serve_tokens(conn: &Arc<MessageConnection>, toolbox: &Toolbox) {
    {
        let tokens = Arc::clone(&toolbox.tokens);
        conn.on_request("token/get-access-token", move |params, _token| {
            let tokens = Arc::clone(&tokens);
            async move {
                let scopes: Vec<String> = param(REMOTE_SOURCE, &params, 0)?;
                standardize(tokens.get_access_token(scopes).await?)
            }
        });
    }
    {
        let tokens = Arc::clone(&toolbox.tokens);
        conn.on_request("token/get-json-object", move |params, _token| {
            let tokens = Arc::clone(&tokens);
            async move {
                let scopes: Vec<String> = param(REMOTE_SOURCE, &params, 0)?;
                tokens.get_json_object(scopes).await
            }
        });
    }
    {
        let tokens = Arc::clone(&toolbox.tokens);
        conn.on_request("token/get-status", move |_params, _token| {
            let tokens = Arc::clone(&tokens);
            async move { standardize(tokens.get_status().await?) }
        });
    }
    {
        let tokens = Arc::clone(&toolbox.tokens);
        conn.on_request("token/list-subscriptions", move |_params, _token| {
            let tokens = Arc::clone(&tokens);
            async move { standardize(tokens.list_subscriptions().await?) }
        });
    }
    {
        let tokens = Arc::clone(&toolbox.tokens);
        conn.on_request("token/set-subscription", move |params, _token| {
            let tokens = Arc::clone(&tokens);
            async move {
                let subscription_id: String = param(REMOTE_SOURCE, &params, 0)?;
                tokens.set_subscription(subscription_id).await?;
                Ok(Value::Null)
            }
        });
    }
    {
        let tokens = Arc::clone(&toolbox.tokens);
        conn.on_request("token/get-selected-subscription", move |_params, _token| {
            let tokens = Arc::clone(&tokens);
            async move { standardize(tokens.get_selected_subscription().await?) }
        });
    }
}

fn serve_ui(conn: &Arc<MessageConnection>, toolbox: &Toolbox) {
    {
        let ui = Arc::clone(&toolbox.ui);
        conn.on_request("ui/select-option", move |params, _token| {
            let ui = Arc::clone(&ui);
            async move { ui.select_option(param(REMOTE_SOURCE, &params, 0)?).await }
        });
    }
    {
        let ui = Arc::clone(&toolbox.ui);
        conn.on_request("ui/select-options", move |params, _token| {
            let ui = Arc::clone(&ui);
            async move { ui.select_options(param(REMOTE_SOURCE, &params, 0)?).await }
        });
    }
    {
        let ui = Arc::clone(&toolbox.ui);
        conn.on_request("ui/input-text", move |params, _token| {
            let ui = Arc::clone(&ui);
            async move { standardize(ui.input_text(param(REMOTE_SOURCE, &params, 0)?).await?) }
        });
    }
    {
        let ui = Arc::clone(&toolbox.ui);
        conn.on_request("ui/select-file", move |params, _token| {
            let ui = Arc::clone(&ui);
            async move { standardize(ui.select_file(param(REMOTE_SOURCE, &params, 0)?).await?) }
        });
    }
    {
        let ui = Arc::clone(&toolbox.ui);
        conn.on_request("ui/select-files", move |params, _token| {
            let ui = Arc::clone(&ui);
            async move { standardize(ui.select_files(param(REMOTE_SOURCE, &params, 0)?).await?) }
        });
    }
    {
        let ui = Arc::clone(&toolbox.ui);
        conn.on_request("ui/select-folder", move |params, _token| {
            let ui = Arc::clone(&ui);
            async move { standardize(ui.select_folder(param(REMOTE_SOURCE, &params, 0)?).await?) }
        });
    }
    {
        let ui = Arc::clone(&toolbox.ui);
        conn.on_request("ui/open-url", move |params, _token| {
            let ui = Arc::clone(&ui);
            async move {
                let url: String = param(REMOTE_SOURCE, &params, 0)?;
                standardize(ui.open_url(&url).await?)
            }
        });
    }
    {
        let ui = Arc::clone(&toolbox.ui);
        conn.on_request("ui/show-message", move |params, _token| {
            let ui = Arc::clone(&ui);
            async move {
                let level: MessageLevel = param(REMOTE_SOURCE, &params, 0)?;
                let message: String = param(REMOTE_SOURCE, &params, 1)?;
                let modal: bool = param(REMOTE_SOURCE, &params, 2)?;
                let items: Vec<String> = param(REMOTE_SOURCE, &params, 3).unwrap_or_default();
                standardize(ui.show_message(level, &message, modal, items).await?)
            }
        });
    }
    {
        let ui = Arc::clone(&toolbox.ui);
        conn.on_request("ui/confirm", move |params, _token| {
            let ui = Arc::clone(&ui);
            async move { standardize(ui.confirm(param(REMOTE_SOURCE, &params, 0)?).await?) }
        });
    }
}

fn standardize<T: serde::Serialize>(value: T) -> OpResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| OpError::assemble(REMOTE_SOURCE, format!("result serialization failed: {e}")))
}
