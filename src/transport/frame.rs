//! JSON-RPC 2.0 frame types.
//!
//! Frames are written by hand rather than pulled from an RPC framework: both
//! sides of the bridge issue requests, so the usual client/server split does
//! not apply. Params are positional JSON arrays throughout.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{OpError, ResponseError};

pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl RequestFrame {
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self { jsonrpc: JSONRPC_VERSION.to_owned(), id, method: method.into(), params }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub jsonrpc: String,
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

impl ResponseFrame {
    pub fn success(id: u64, result: Value) -> Self {
        Self { jsonrpc: JSONRPC_VERSION.to_owned(), id, result: Some(result), error: None }
    }

    pub fn failure(id: u64, err: &OpError) -> Self {
        Self { jsonrpc: JSONRPC_VERSION.to_owned(), id, result: None, error: Some(err.into()) }
    }

    pub fn protocol_failure(id: u64, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id,
            result: None,
            error: Some(ResponseError { code, message: message.into(), data: None }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationFrame {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl NotificationFrame {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self { jsonrpc: JSONRPC_VERSION.to_owned(), method: method.into(), params }
    }
}

/// Any inbound frame. Variant order matters: a request carries both `id` and
/// `method`, a response only `id`, a notification only `method`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Request(RequestFrame),
    Response(ResponseFrame),
    Notification(NotificationFrame),
}

/// Decode positional parameter `index`. A missing position reads as `null`,
/// so optional trailing params deserialize into `Option`s.
pub fn param<T: serde::de::DeserializeOwned>(side: &str, params: &Value, index: usize) -> Result<T, OpError> {
    let raw = params.get(index).cloned().unwrap_or(Value::Null);
    serde_json::from_value(raw)
        .map_err(|e| OpError::assemble(side, format!("invalid parameter {index}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn frames_classify_by_field_shape() {
        let req: Message = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"method":"server/create-project","params":[{}]}"#,
        )
        .unwrap();
        assert!(matches!(req, Message::Request(_)));

        let resp: Message =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":"/tmp/app"}"#).unwrap();
        assert!(matches!(resp, Message::Response(_)));

        let note: Message =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"logger/log","params":[2,"hi"]}"#)
                .unwrap();
        assert!(matches!(note, Message::Notification(_)));
    }

    #[test]
    fn error_response_round_trips() {
        let err = OpError::assemble("scaffold-server", "boom");
        let frame = ResponseFrame::failure(7, &err);
        let line = serde_json::to_string(&frame).unwrap();
        let back: Message = serde_json::from_str(&line).unwrap();
        match back {
            Message::Response(r) => {
                assert_eq!(r.id, 7);
                let roundtripped = r.error.unwrap().into_op_error("x");
                assert_eq!(roundtripped, err);
            }
            _ => panic!("classified wrong"),
        }
    }

    #[test]
    fn param_decodes_positionally() {
        let params = json!(["hello", 7]);
        let s: String = param("t", &params, 0).unwrap();
        assert_eq!(s, "hello");
        let n: u64 = param("t", &params, 1).unwrap();
        assert_eq!(n, 7);
        let missing: Option<String> = param("t", &params, 5).unwrap();
        assert!(missing.is_none());
        let err = param::<u64>("t", &params, 0).unwrap_err();
        assert_eq!(err.source_name(), "t");
    }

    #[test]
    fn missing_params_default_to_null() {
        let req: RequestFrame =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":3,"method":"server/get-questions"}"#)
                .unwrap();
        assert_eq!(req.params, json!(null));
    }
}
