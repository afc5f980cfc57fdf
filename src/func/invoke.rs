//! Wire facility for invoking detached closures.
//!
//! Both façades register the same three inbound methods against their own
//! registry, and either side holding a `FuncReference` calls back with
//! [`invoke_remote`].

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::error::{OpError, OpResult};
use crate::func::{FuncKind, FuncReference, FuncRegistry, FUNC_SOURCE};
use crate::inputs::Inputs;
use crate::transport::{param, MessageConnection};

pub const INVOKE_LOCAL: &str = "func/invoke-local-func";
pub const INVOKE_VALIDATE: &str = "func/invoke-validate-func";
pub const INVOKE_SELECTION_CHANGE: &str = "func/invoke-selection-change-func";

/// Register the three invoke methods on `conn`, resolving against
/// `registry`. Params are positional: the reference first, then the
/// closure's own arguments.
pub fn register_invoke_handlers(conn: &Arc<MessageConnection>, registry: &Arc<FuncRegistry>) {
    {
        let registry = Arc::clone(registry);
        conn.on_request(INVOKE_LOCAL, move |params, _token| {
            let registry = Arc::clone(&registry);
            async move {
                let reference: FuncReference = param(FUNC_SOURCE, &params, 0)?;
                let inputs: Inputs = param(FUNC_SOURCE, &params, 1)?;
                registry.invoke_local(reference, &inputs)
            }
        });
    }
    {
        let registry = Arc::clone(registry);
        conn.on_request(INVOKE_VALIDATE, move |params, _token| {
            let registry = Arc::clone(&registry);
            async move {
                let reference: FuncReference = param(FUNC_SOURCE, &params, 0)?;
                let answer: Value = param(FUNC_SOURCE, &params, 1)?;
                let previous: Inputs = param(FUNC_SOURCE, &params, 2)?;
                registry.invoke_validate(reference, &answer, &previous)
            }
        });
    }
    {
        let registry = Arc::clone(registry);
        conn.on_request(INVOKE_SELECTION_CHANGE, move |params, _token| {
            let registry = Arc::clone(&registry);
            async move {
                let reference: FuncReference = param(FUNC_SOURCE, &params, 0)?;
                let current: BTreeSet<String> = param(FUNC_SOURCE, &params, 1)?;
                let previous: BTreeSet<String> = param(FUNC_SOURCE, &params, 2)?;
                let out = registry.invoke_selection_change(reference, &current, &previous)?;
                serde_json::to_value(out)
                    .map_err(|e| OpError::assemble(FUNC_SOURCE, e.to_string()))
            }
        });
    }
}

/// Invoke a closure parked on the other side. `args` are the closure's own
/// positional arguments, without the leading reference.
pub async fn invoke_remote(
    conn: &MessageConnection,
    reference: FuncReference,
    args: Vec<Value>,
) -> OpResult<Value> {
    let method = match reference.kind {
        FuncKind::LocalFunc => INVOKE_LOCAL,
        FuncKind::ValidateFunc => INVOKE_VALIDATE,
        FuncKind::SelectionChangeFunc => INVOKE_SELECTION_CHANGE,
    };
    let mut params = vec![json!(reference)];
    params.extend(args);
    conn.send_request(method, Value::Array(params)).await
}
