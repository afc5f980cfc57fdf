//! Server-side façade.
//!
//! Binds the operation table onto a connection, one engine instance per
//! connection, and owns that connection's closure registry. Every handler
//! follows the same shape: decode the answer bag, scope a correlation id,
//! delegate to the engine, standardize the result onto the wire.

use std::future::Future;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::task::JoinHandle;

use crate::correlator::{ensure_correlation_id, run_with_id};
use crate::engine::{AccountToken, Engine};
use crate::error::{OpError, OpResult};
use crate::func::{register_invoke_handlers, FuncRegistry};
use crate::inputs::{Inputs, Stage};
use crate::question::serialize_tree;
use crate::server::providers::wire_toolbox;
use crate::tools::Toolbox;
use crate::transport::{param, CancelToken, MessageConnection};

/// Identity stamped on errors raised by this side.
pub const SERVER_SOURCE: &str = "scaffold-server";

pub struct ServerConnection {
    conn: Arc<MessageConnection>,
    registry: Arc<FuncRegistry>,
    engine: Arc<dyn Engine>,
}

impl ServerConnection {
    /// Wire up one serving side. `make_engine` receives the connection's
    /// toolbox so the engine can reach back to the remote host.
    pub fn new(
        conn: Arc<MessageConnection>,
        make_engine: impl FnOnce(Toolbox) -> Arc<dyn Engine>,
    ) -> Arc<Self> {
        let registry = Arc::new(FuncRegistry::new());
        let toolbox = wire_toolbox(&conn, &registry);
        let engine = make_engine(toolbox);

        let server = Arc::new(Self { conn: Arc::clone(&conn), registry: Arc::clone(&registry), engine });
        server.register_operations();
        register_invoke_handlers(&conn, &registry);

        // Detached handles must not survive the connection that minted them.
        let close_registry = Arc::clone(&registry);
        conn.on_close(move || close_registry.reset());

        server
    }

    /// Start serving. Resolves when the peer disconnects.
    pub fn listen(&self) -> JoinHandle<()> {
        self.conn.listen()
    }

    pub fn registry(&self) -> &Arc<FuncRegistry> {
        &self.registry
    }

    fn register_operations(self: &Arc<Self>) {
        self.register_get_questions();

        self.op("server/create-project", |server, inputs, token| async move {
            let result = server.engine.create_project(inputs, token).await?;
            standardize(result)
        });
        self.op("server/local-debug", |server, inputs, token| async move {
            server.engine.local_debug(inputs, token).await?;
            Ok(Value::Null)
        });
        self.op("server/pre-provision", |server, inputs, token| async move {
            let summary = server.engine.pre_provision(inputs, token).await?;
            standardize(summary)
        });
        self.op("server/provision-resources", |server, inputs, token| async move {
            server.engine.provision_resources(inputs, token).await?;
            Ok(Value::Null)
        });
        self.op("server/deploy-artifacts", |server, inputs, token| async move {
            server.engine.deploy_artifacts(inputs, token).await?;
            Ok(Value::Null)
        });
        self.op("server/build-artifacts", |server, mut inputs, token| async move {
            inject_package_paths(&mut inputs);
            server.engine.build_artifacts(inputs, token).await
        });
        self.op("server/publish-application", |server, inputs, token| async move {
            server.engine.publish_application(inputs, token).await?;
            Ok(Value::Null)
        });
        self.op("server/deploy-manifest", |server, inputs, token| async move {
            server.engine.deploy_manifest(inputs, token).await?;
            Ok(Value::Null)
        });
        // Unit success from the engine surfaces as an explicit `true`.
        self.op("server/migrate-project", |server, inputs, token| async move {
            server.engine.migrate_project(inputs, token).await?;
            Ok(json!(true))
        });
        self.op("server/get-project-migration-status", |server, inputs, token| async move {
            let status = server.engine.project_migration_status(inputs, token).await?;
            standardize(status)
        });
        self.op("server/add-sso", |server, inputs, token| async move {
            server.engine.add_sso(inputs, token).await?;
            Ok(Value::Null)
        });
        self.op("server/list-dev-tunnels", |server, inputs, token| async move {
            let tunnels = server.engine.list_dev_tunnels(inputs, token).await?;
            standardize(tunnels)
        });
        self.op("server/sync-manifest", |server, inputs, token| async move {
            server.engine.sync_manifest(inputs, token).await?;
            Ok(Value::Null)
        });
        self.op("server/publish-in-developer-portal", |server, inputs, token| async move {
            server.engine.publish_in_developer_portal(inputs, token).await?;
            Ok(Value::Null)
        });
        // Launch preview is always against the Teams host on this surface.
        self.op("server/get-launch-url", |server, mut inputs, token| async move {
            inputs.set_answer("m365-host", json!("Teams"));
            let url = server.engine.get_launch_url(inputs, token).await?;
            standardize(url)
        });
        self.op("server/pre-check-yml-and-env", |server, inputs, token| async move {
            server.engine.pre_check_yml_and_env(inputs, token).await?;
            Ok(Value::Null)
        });
        self.op("server/validate-manifest", |server, inputs, token| async move {
            server.engine.validate_manifest(inputs, token).await?;
            Ok(Value::Null)
        });
        self.register_get_sideloading_status();
    }

    /// `get-questions` takes `[stage, inputs]` and detaches the returned
    /// tree through the connection registry before replying.
    fn register_get_questions(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.conn.on_request("server/get-questions", move |params, token| {
            let weak = weak.clone();
            async move {
                let server = weak.upgrade().ok_or_else(torn_down)?;
                let stage: Stage = param(SERVER_SOURCE, &params, 0)?;
                let mut inputs: Inputs = param(SERVER_SOURCE, &params, 1)?;
                let correlation_id = ensure_correlation_id(&mut inputs);
                run_with_id(&correlation_id, "server/get-questions", async move {
                    let tree = server.engine.get_questions(stage, inputs, token).await?;
                    match tree {
                        Some(tree) => serialize_tree(&tree, &server.registry),
                        None => Ok(Value::Null),
                    }
                })
                .await
            }
        });
    }

    /// `get-sideloading-status` takes a bare account token, not an answer
    /// bag, so there is no correlation id to scope.
    fn register_get_sideloading_status(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.conn.on_request("server/get-sideloading-status", move |params, token| {
            let weak = weak.clone();
            async move {
                let server = weak.upgrade().ok_or_else(torn_down)?;
                let account: AccountToken = param(SERVER_SOURCE, &params, 0)?;
                let status = server.engine.get_sideloading_status(account, token).await?;
                standardize(status)
            }
        });
    }

    /// Common handler shape for the single-`Inputs` operations.
    fn op<F, Fut>(self: &Arc<Self>, method: &'static str, run: F)
    where
        F: Fn(Arc<ServerConnection>, Inputs, CancelToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = OpResult<Value>> + Send + 'static,
    {
        let weak = Arc::downgrade(self);
        let run = Arc::new(run);
        self.conn.on_request(method, move |params, token| {
            let weak = weak.clone();
            let run = Arc::clone(&run);
            async move {
                let server = weak.upgrade().ok_or_else(torn_down)?;
                let mut inputs: Inputs = param(SERVER_SOURCE, &params, 0)?;
                let correlation_id = ensure_correlation_id(&mut inputs);
                run_with_id(&correlation_id, method, run(server, inputs, token)).await
            }
        });
    }
}

impl std::fmt::Debug for ServerConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConnection").finish_non_exhaustive()
    }
}

fn torn_down() -> OpError {
    OpError::assemble(SERVER_SOURCE, "server connection torn down")
}

fn standardize<T: serde::Serialize>(value: T) -> OpResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| OpError::assemble(SERVER_SOURCE, format!("result serialization failed: {e}")))
}

/// The packaging output paths are derived, not asked: the remote host only
/// supplies the project path and environment.
fn inject_package_paths(inputs: &mut Inputs) {
    let (Some(project_path), Some(env)) = (&inputs.project_path, &inputs.env) else {
        return;
    };
    let build = project_path.join("appPackage").join("build");
    let zip = build.join(format!("appPackage.{env}.zip"));
    let manifest = build.join(format!("manifest.{env}.json"));
    inputs.set_answer("output-zip-path", json!(zip));
    inputs.set_answer("output-manifest-path", json!(manifest));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputs::Platform;

    #[test]
    fn package_paths_derive_from_project_and_env() {
        let mut inputs = Inputs::new(Platform::Vs);
        inputs.project_path = Some("/work/app".into());
        inputs.env = Some("dev".into());
        inject_package_paths(&mut inputs);
        assert_eq!(
            inputs.answer_str("output-zip-path"),
            Some("/work/app/appPackage/build/appPackage.dev.zip"),
        );
        assert_eq!(
            inputs.answer_str("output-manifest-path"),
            Some("/work/app/appPackage/build/manifest.dev.json"),
        );
    }

    #[test]
    fn package_paths_skip_when_context_is_missing() {
        let mut inputs = Inputs::new(Platform::Vs);
        inputs.env = Some("dev".into());
        inject_package_paths(&mut inputs);
        assert!(inputs.answer("output-zip-path").is_none());
    }
}
