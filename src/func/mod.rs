//! Closure registry and handle indirection.
//!
//! Question trees embed live closures (dynamic defaults, validators,
//! selection reactions). Closures cannot cross a process boundary, so before
//! a tree is serialized each closure is parked in a registry and replaced by
//! a small reference `{ kind, handle }`. The far side later invokes the
//! closure by sending the reference back over a dedicated wire method.
//!
//! Each connection owns its own registry. Handles start at 1 and the table
//! is cleared when the connection's read loop ends, so a stale reference
//! from an earlier connection can never resolve against a new one.

pub mod invoke;

pub use invoke::{
    invoke_remote, register_invoke_handlers, INVOKE_LOCAL, INVOKE_SELECTION_CHANGE,
    INVOKE_VALIDATE,
};

use std::collections::{BTreeSet, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{OpError, OpResult};
use crate::inputs::Inputs;

/// Source identity stamped on errors raised by the invoker itself.
pub const FUNC_SOURCE: &str = "func";

/// Dynamic value producer. Receives the current answer bag.
pub type LocalFunc = Arc<dyn Fn(&Inputs) -> OpResult<Value> + Send + Sync>;

/// Answer validator. `Ok(Value::Null)` means valid; any string value is the
/// validation failure message.
pub type ValidateFunc = Arc<dyn Fn(&Value, &Inputs) -> OpResult<Value> + Send + Sync>;

/// Multi-select reaction. Receives (current, previous) selection sets and
/// returns the adjusted selection.
pub type SelectionChangeFunc =
    Arc<dyn Fn(&BTreeSet<String>, &BTreeSet<String>) -> OpResult<BTreeSet<String>> + Send + Sync>;

/// Discriminates the three closure shapes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FuncKind {
    LocalFunc,
    ValidateFunc,
    SelectionChangeFunc,
}

/// Wire stand-in for a registered closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FuncReference {
    pub kind: FuncKind,
    pub handle: u64,
}

/// A registered closure of any of the three shapes.
#[derive(Clone)]
pub enum CustomizedFunc {
    Local(LocalFunc),
    Validate(ValidateFunc),
    SelectionChange(SelectionChangeFunc),
}

impl CustomizedFunc {
    pub fn kind(&self) -> FuncKind {
        match self {
            CustomizedFunc::Local(_) => FuncKind::LocalFunc,
            CustomizedFunc::Validate(_) => FuncKind::ValidateFunc,
            CustomizedFunc::SelectionChange(_) => FuncKind::SelectionChangeFunc,
        }
    }
}

impl std::fmt::Debug for CustomizedFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CustomizedFunc::{:?}", self.kind())
    }
}

/// Per-connection closure table. Thread-safe.
#[derive(Debug)]
pub struct FuncRegistry {
    table: Mutex<HashMap<u64, CustomizedFunc>>,
    next_handle: AtomicU64,
}

impl Default for FuncRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FuncRegistry {
    pub fn new() -> Self {
        Self { table: Mutex::new(HashMap::new()), next_handle: AtomicU64::new(1) }
    }

    /// Park a closure and hand back its wire reference.
    pub fn register(&self, func: CustomizedFunc) -> FuncReference {
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        let kind = func.kind();
        self.table
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(handle, func);
        FuncReference { kind, handle }
    }

    /// Drop every parked closure and restart the handle counter. Called when
    /// the owning connection's read loop ends; references from the old
    /// connection must never be replayed against a new one.
    pub fn reset(&self) {
        self.table
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
        self.next_handle.store(1, Ordering::Relaxed);
        tracing::debug!("func registry cleared");
    }

    pub fn len(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, reference: FuncReference) -> OpResult<CustomizedFunc> {
        let func = self
            .table
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&reference.handle)
            .cloned()
            .ok_or_else(|| OpError::func_not_found(FUNC_SOURCE, reference.handle))?;
        if func.kind() == reference.kind {
            Ok(func)
        } else {
            Err(kind_mismatch(reference, func.kind()))
        }
    }

    /// Invoke a parked dynamic-value closure.
    pub fn invoke_local(&self, reference: FuncReference, inputs: &Inputs) -> OpResult<Value> {
        match self.lookup(reference)? {
            CustomizedFunc::Local(f) => guard(|| f(inputs)),
            other => Err(kind_mismatch(reference, other.kind())),
        }
    }

    /// Invoke a parked validator.
    pub fn invoke_validate(
        &self,
        reference: FuncReference,
        answer: &Value,
        inputs: &Inputs,
    ) -> OpResult<Value> {
        match self.lookup(reference)? {
            CustomizedFunc::Validate(f) => guard(|| f(answer, inputs)),
            other => Err(kind_mismatch(reference, other.kind())),
        }
    }

    /// Invoke a parked selection reaction.
    pub fn invoke_selection_change(
        &self,
        reference: FuncReference,
        current: &BTreeSet<String>,
        previous: &BTreeSet<String>,
    ) -> OpResult<BTreeSet<String>> {
        match self.lookup(reference)? {
            CustomizedFunc::SelectionChange(f) => guard(|| f(current, previous)),
            other => Err(kind_mismatch(reference, other.kind())),
        }
    }
}

fn kind_mismatch(reference: FuncReference, actual: FuncKind) -> OpError {
    OpError::System(crate::error::SystemError::new(
        FUNC_SOURCE,
        "FuncKindMismatch",
        format!("handle {} resolved to {actual:?}, expected {:?}", reference.handle, reference.kind),
    ))
}

/// A panicking closure must not tear down the connection; the panic is
/// converted into a system error carrying the panic message.
fn guard<T>(call: impl FnOnce() -> OpResult<T>) -> OpResult<T> {
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result,
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic with non-string payload".to_owned());
            tracing::error!(message = %msg, "registered function panicked");
            Err(OpError::assemble(FUNC_SOURCE, format!("registered function panicked: {msg}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn local(value: Value) -> CustomizedFunc {
        CustomizedFunc::Local(Arc::new(move |_inputs| Ok(value.clone())))
    }

    #[test]
    fn handles_start_at_one_and_increment() {
        let reg = FuncRegistry::new();
        let a = reg.register(local(json!("a")));
        let b = reg.register(local(json!("b")));
        assert_eq!(a.handle, 1);
        assert_eq!(b.handle, 2);
        assert_eq!(a.kind, FuncKind::LocalFunc);
    }

    #[test]
    fn invoke_local_returns_closure_value() {
        let reg = FuncRegistry::new();
        let r = reg.register(local(json!({"default": "tab"})));
        let out = reg.invoke_local(r, &Inputs::default()).unwrap();
        assert_eq!(out, json!({"default": "tab"}));
    }

    #[test]
    fn unknown_handle_is_func_not_found() {
        let reg = FuncRegistry::new();
        let err = reg
            .invoke_local(FuncReference { kind: FuncKind::LocalFunc, handle: 99 }, &Inputs::default())
            .unwrap_err();
        assert_eq!(err.name(), crate::error::FUNC_NOT_FOUND);
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let reg = FuncRegistry::new();
        let r = reg.register(local(json!(1)));
        let wrong = FuncReference { kind: FuncKind::ValidateFunc, handle: r.handle };
        let err = reg
            .invoke_validate(wrong, &json!("x"), &Inputs::default())
            .unwrap_err();
        assert_eq!(err.name(), "FuncKindMismatch");
        assert!(err.message().contains("handle 1"));
    }

    #[test]
    fn reset_invalidates_old_handles_and_restarts_numbering() {
        let reg = FuncRegistry::new();
        let r = reg.register(local(json!(1)));
        reg.register(local(json!(2)));
        reg.reset();
        assert!(reg.is_empty());
        assert!(reg.invoke_local(r, &Inputs::default()).is_err());
        let next = reg.register(local(json!(3)));
        assert_eq!(next.handle, 1);
    }

    #[test]
    fn panicking_closure_becomes_system_error() {
        let reg = FuncRegistry::new();
        let r = reg.register(CustomizedFunc::Local(Arc::new(|_| panic!("validator exploded"))));
        let err = reg.invoke_local(r, &Inputs::default()).unwrap_err();
        assert!(err.message().contains("validator exploded"));
    }

    #[test]
    fn selection_change_passes_both_sets() {
        let reg = FuncRegistry::new();
        let r = reg.register(CustomizedFunc::SelectionChange(Arc::new(|current, previous| {
            let mut out = current.clone();
            if current.contains("sql") && !previous.contains("sql") {
                out.insert("function".to_owned());
            }
            Ok(out)
        })));
        let current: BTreeSet<String> = ["sql".to_owned()].into();
        let out = reg.invoke_selection_change(r, &current, &BTreeSet::new()).unwrap();
        assert_eq!(out, ["function".to_owned(), "sql".to_owned()].into());
    }

    #[test]
    fn reference_wire_shape_is_strict() {
        let ok: FuncReference = serde_json::from_value(json!({"kind": "ValidateFunc", "handle": 7})).unwrap();
        assert_eq!(ok.kind, FuncKind::ValidateFunc);
        let extra = serde_json::from_value::<FuncReference>(json!({"kind": "LocalFunc", "handle": 1, "x": 2}));
        assert!(extra.is_err());
    }
}
