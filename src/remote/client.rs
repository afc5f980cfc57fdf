//! Typed outbound wrappers for the operation catalogue.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::engine::{
    AccountToken, CreateProjectResult, DevTunnel, PreProvisionSummary, VersionCheckResult,
};
use crate::error::{OpError, OpResult};
use crate::func::{invoke_remote, FuncReference};
use crate::inputs::{Inputs, Stage};
use crate::question::QTreeNode;
use crate::remote::REMOTE_SOURCE;
use crate::transport::MessageConnection;

/// Client view of the core: one typed method per wire operation. Trees come
/// back with closure fields as references; [`CoreClient::invoke`] calls them
/// back where they live.
pub struct CoreClient {
    conn: Arc<MessageConnection>,
}

impl CoreClient {
    pub fn new(conn: Arc<MessageConnection>) -> Self {
        Self { conn }
    }

    pub async fn get_questions(&self, stage: Stage, inputs: &Inputs) -> OpResult<Option<QTreeNode>> {
        let out = self.conn.send_request("server/get-questions", json!([stage, inputs])).await?;
        if out.is_null() {
            return Ok(None);
        }
        decode(out).map(Some)
    }

    pub async fn create_project(&self, inputs: &Inputs) -> OpResult<CreateProjectResult> {
        decode(self.call("server/create-project", inputs).await?)
    }

    pub async fn local_debug(&self, inputs: &Inputs) -> OpResult<()> {
        self.call("server/local-debug", inputs).await.map(|_| ())
    }

    pub async fn pre_provision(&self, inputs: &Inputs) -> OpResult<PreProvisionSummary> {
        decode(self.call("server/pre-provision", inputs).await?)
    }

    pub async fn provision_resources(&self, inputs: &Inputs) -> OpResult<()> {
        self.call("server/provision-resources", inputs).await.map(|_| ())
    }

    pub async fn deploy_artifacts(&self, inputs: &Inputs) -> OpResult<()> {
        self.call("server/deploy-artifacts", inputs).await.map(|_| ())
    }

    pub async fn build_artifacts(&self, inputs: &Inputs) -> OpResult<Value> {
        self.call("server/build-artifacts", inputs).await
    }

    pub async fn publish_application(&self, inputs: &Inputs) -> OpResult<()> {
        self.call("server/publish-application", inputs).await.map(|_| ())
    }

    pub async fn deploy_manifest(&self, inputs: &Inputs) -> OpResult<()> {
        self.call("server/deploy-manifest", inputs).await.map(|_| ())
    }

    pub async fn migrate_project(&self, inputs: &Inputs) -> OpResult<bool> {
        decode(self.call("server/migrate-project", inputs).await?)
    }

    pub async fn project_migration_status(&self, inputs: &Inputs) -> OpResult<VersionCheckResult> {
        decode(self.call("server/get-project-migration-status", inputs).await?)
    }

    pub async fn add_sso(&self, inputs: &Inputs) -> OpResult<()> {
        self.call("server/add-sso", inputs).await.map(|_| ())
    }

    pub async fn list_dev_tunnels(&self, inputs: &Inputs) -> OpResult<Vec<DevTunnel>> {
        decode(self.call("server/list-dev-tunnels", inputs).await?)
    }

    pub async fn sync_manifest(&self, inputs: &Inputs) -> OpResult<()> {
        self.call("server/sync-manifest", inputs).await.map(|_| ())
    }

    pub async fn publish_in_developer_portal(&self, inputs: &Inputs) -> OpResult<()> {
        self.call("server/publish-in-developer-portal", inputs).await.map(|_| ())
    }

    pub async fn get_launch_url(&self, inputs: &Inputs) -> OpResult<String> {
        decode(self.call("server/get-launch-url", inputs).await?)
    }

    pub async fn get_sideloading_status(&self, account: &AccountToken) -> OpResult<String> {
        decode(self.conn.send_request("server/get-sideloading-status", json!([account])).await?)
    }

    pub async fn pre_check_yml_and_env(&self, inputs: &Inputs) -> OpResult<()> {
        self.call("server/pre-check-yml-and-env", inputs).await.map(|_| ())
    }

    pub async fn validate_manifest(&self, inputs: &Inputs) -> OpResult<()> {
        self.call("server/validate-manifest", inputs).await.map(|_| ())
    }

    /// Call a detached closure on the side that registered it.
    pub async fn invoke(&self, reference: FuncReference, args: Vec<Value>) -> OpResult<Value> {
        invoke_remote(&self.conn, reference, args).await
    }

    async fn call(&self, method: &str, inputs: &Inputs) -> OpResult<Value> {
        self.conn.send_request(method, json!([inputs])).await
    }
}

impl std::fmt::Debug for CoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreClient").finish_non_exhaustive()
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> OpResult<T> {
    serde_json::from_value(value)
        .map_err(|e| OpError::assemble(REMOTE_SOURCE, format!("malformed operation reply: {e}")))
}
