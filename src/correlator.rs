//! Correlation-id scoping.
//!
//! Every inbound operation runs inside a `tracing` span carrying the request
//! correlation id, so log lines emitted by the engine, the capability
//! adapters, and the transport all share the id. A request arriving without
//! one gets a fresh v4 uuid.

use std::future::Future;

use tracing::Instrument;
use uuid::Uuid;

use crate::inputs::Inputs;

/// Correlation id from the inputs, minting one when absent. The minted id is
/// written back so downstream capability calls carry it too.
pub fn ensure_correlation_id(inputs: &mut Inputs) -> String {
    match &inputs.correlation_id {
        Some(id) if !id.is_empty() => id.clone(),
        _ => {
            let id = Uuid::new_v4().to_string();
            inputs.correlation_id = Some(id.clone());
            id
        }
    }
}

/// Run `fut` inside an operation span tagged with the correlation id.
pub async fn run_with_id<F: Future>(correlation_id: &str, operation: &str, fut: F) -> F::Output {
    let span = tracing::info_span!("operation", %correlation_id, method = operation);
    fut.instrument(span).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputs::Platform;

    #[test]
    fn existing_id_is_kept() {
        let mut inputs = Inputs::new(Platform::Cli);
        inputs.correlation_id = Some("abc-123".into());
        assert_eq!(ensure_correlation_id(&mut inputs), "abc-123");
    }

    #[test]
    fn missing_or_empty_id_is_minted_and_written_back() {
        let mut inputs = Inputs::new(Platform::Cli);
        let minted = ensure_correlation_id(&mut inputs);
        assert!(!minted.is_empty());
        assert_eq!(inputs.correlation_id.as_deref(), Some(minted.as_str()));

        inputs.correlation_id = Some(String::new());
        let replaced = ensure_correlation_id(&mut inputs);
        assert!(!replaced.is_empty());
        assert_ne!(replaced, minted);
    }

    #[tokio::test]
    async fn run_with_id_passes_the_output_through() {
        let out = run_with_id("abc", "server/create-project", async { 41 + 1 }).await;
        assert_eq!(out, 42);
    }
}
