//! Typed application errors and their wire representation.
//!
//! Exactly two error kinds cross the connection: a user error (invalid input
//! or user action) and a system error (internal failure). Anything else is
//! wrapped into a generic system error before it is sent. The full typed
//! error travels in the `data` field of the JSON-RPC error object so the far
//! side can reconstruct it instead of seeing an opaque failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// JSON-RPC error code used for all application-level failures.
pub const REQUEST_FAILED: i64 = -32000;

/// Error name used when a closure handle cannot be resolved.
pub const FUNC_NOT_FOUND: &str = "FuncNotFound";

/// Result alias used across the crate.
pub type OpResult<T> = Result<T, OpError>;

/// Error caused by invalid input or a user action.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[error("[{source_name}.{name}] {message}")]
#[serde(rename_all = "camelCase")]
pub struct UserError {
    /// Component that raised the error (display identity).
    #[serde(rename = "source")]
    pub source_name: String,
    pub name: String,
    /// Diagnostic message.
    pub message: String,
    /// Message suitable for showing to the user, distinct from `message`.
    pub display_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_link: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// Internal failure.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[error("[{source_name}.{name}] {message}")]
#[serde(rename_all = "camelCase")]
pub struct SystemError {
    #[serde(rename = "source")]
    pub source_name: String,
    pub name: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_link: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// The two application error kinds that may cross the boundary.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "errorType", rename_all = "camelCase")]
pub enum OpError {
    #[error(transparent)]
    User(UserError),
    #[error(transparent)]
    System(SystemError),
}

impl UserError {
    pub fn new(
        source: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
        display_message: impl Into<String>,
    ) -> Self {
        Self {
            source_name: source.into(),
            name: name.into(),
            message: message.into(),
            display_message: display_message.into(),
            help_link: None,
            timestamp: Utc::now(),
            stack: None,
        }
    }

    pub fn with_help_link(mut self, link: impl Into<String>) -> Self {
        self.help_link = Some(link.into());
        self
    }
}

impl SystemError {
    pub fn new(
        source: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source_name: source.into(),
            name: name.into(),
            message: message.into(),
            issue_link: None,
            timestamp: Utc::now(),
            stack: None,
        }
    }

    pub fn with_issue_link(mut self, link: impl Into<String>) -> Self {
        self.issue_link = Some(link.into());
        self
    }
}

impl OpError {
    /// Generic system error for failures that are not already typed.
    pub fn assemble(source: impl Into<String>, message: impl Into<String>) -> Self {
        OpError::System(SystemError::new(source, "UnhandledError", message))
    }

    /// Raised when a closure handle is missing from the registry (stale
    /// registry, wrong process, or post-reset reuse). Carries the handle for
    /// diagnostics.
    pub fn func_not_found(source: impl Into<String>, handle: u64) -> Self {
        OpError::System(SystemError::new(
            source,
            FUNC_NOT_FOUND,
            format!("no registered function for handle {handle}"),
        ))
    }

    /// Explicit unsupported-path error.
    pub fn not_implemented(source: impl Into<String>, what: impl Into<String>) -> Self {
        OpError::System(SystemError::new(
            source,
            "NotImplemented",
            format!("not implemented: {}", what.into()),
        ))
    }

    pub fn source_name(&self) -> &str {
        match self {
            OpError::User(e) => &e.source_name,
            OpError::System(e) => &e.source_name,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            OpError::User(e) => &e.name,
            OpError::System(e) => &e.name,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            OpError::User(e) => &e.message,
            OpError::System(e) => &e.message,
        }
    }
}

/// JSON-RPC 2.0 error object. `data`, when present, carries the full typed
/// [`OpError`] so the far side can reconstruct it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResponseError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl From<&OpError> for ResponseError {
    fn from(err: &OpError) -> Self {
        ResponseError {
            code: REQUEST_FAILED,
            message: err.to_string(),
            data: serde_json::to_value(err).ok(),
        }
    }
}

impl ResponseError {
    /// Reconstruct the typed error; failures without a typed payload are
    /// wrapped into a generic error tagged with the invoking side's identity.
    pub fn into_op_error(self, invoking_side: &str) -> OpError {
        if let Some(data) = self.data {
            if let Ok(err) = serde_json::from_value::<OpError>(data) {
                return err;
            }
        }
        OpError::assemble(invoking_side, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_round_trip_preserves_identity_fields() {
        let mut original = SystemError::new("scaffold-server", "ProvisionFailed", "boom");
        original.stack = Some("at provision_resources".into());
        let err = OpError::System(original.clone());

        let wire = ResponseError::from(&err);
        assert_eq!(wire.code, REQUEST_FAILED);
        let back = wire.into_op_error("client");

        match back {
            OpError::System(e) => {
                assert_eq!(e.source_name, original.source_name);
                assert_eq!(e.name, original.name);
                assert_eq!(e.message, original.message);
                assert_eq!(e.timestamp, original.timestamp);
                assert_eq!(e.stack, original.stack);
            }
            OpError::User(_) => panic!("kind changed across the wire"),
        }
    }

    #[test]
    fn user_error_keeps_display_message() {
        let err = OpError::User(
            UserError::new("cli", "InvalidPath", "path does not exist: /x", "Pick a real folder")
                .with_help_link("https://example.test/help"),
        );
        let back = ResponseError::from(&err).into_op_error("client");
        match back {
            OpError::User(e) => {
                assert_eq!(e.display_message, "Pick a real folder");
                assert_eq!(e.help_link.as_deref(), Some("https://example.test/help"));
            }
            OpError::System(_) => panic!("kind changed across the wire"),
        }
    }

    #[test]
    fn untyped_failure_is_tagged_with_invoking_side() {
        let wire = ResponseError { code: REQUEST_FAILED, message: "socket closed".into(), data: None };
        let err = wire.into_op_error("scaffold-remote");
        assert_eq!(err.source_name(), "scaffold-remote");
        assert_eq!(err.name(), "UnhandledError");
    }

    #[test]
    fn func_not_found_carries_handle() {
        let err = OpError::func_not_found("func", 100);
        assert_eq!(err.name(), FUNC_NOT_FOUND);
        assert!(err.message().contains("100"));
    }
}
