//! Interface to the business logic behind the bridge.
//!
//! The bridge owns the wire; everything the operations actually do lives
//! behind this trait. One engine instance is built per connection, with the
//! connection's `Toolbox` injected so the engine reaches back to the remote
//! host for logging, telemetry, tokens, and prompts.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{OpError, OpResult};
use crate::inputs::{Inputs, Stage};
use crate::question::QTreeNode;
use crate::transport::CancelToken;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectResult {
    pub project_path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreProvisionSummary {
    pub needs_azure_login: bool,
    pub needs_m365_login: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_subscription_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_resource_group_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MigrationState {
    Compatible,
    Upgradeable,
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionCheckResult {
    pub current_version: String,
    pub state: MigrationState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevTunnel {
    pub tunnel_id: String,
    pub cluster_id: String,
}

/// Bearer token for account-scoped probes. The only operation parameter
/// that is not an answer bag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountToken {
    pub token: String,
}

/// Business-logic entry points, one per wire operation.
#[async_trait]
pub trait Engine: Send + Sync {
    async fn get_questions(
        &self,
        stage: Stage,
        inputs: Inputs,
        token: CancelToken,
    ) -> OpResult<Option<QTreeNode>>;
    async fn create_project(
        &self,
        inputs: Inputs,
        token: CancelToken,
    ) -> OpResult<CreateProjectResult>;
    async fn local_debug(&self, inputs: Inputs, token: CancelToken) -> OpResult<()>;
    async fn pre_provision(
        &self,
        inputs: Inputs,
        token: CancelToken,
    ) -> OpResult<PreProvisionSummary>;
    async fn provision_resources(&self, inputs: Inputs, token: CancelToken) -> OpResult<()>;
    async fn deploy_artifacts(&self, inputs: Inputs, token: CancelToken) -> OpResult<()>;
    async fn build_artifacts(&self, inputs: Inputs, token: CancelToken) -> OpResult<Value>;
    async fn publish_application(&self, inputs: Inputs, token: CancelToken) -> OpResult<()>;
    async fn deploy_manifest(&self, inputs: Inputs, token: CancelToken) -> OpResult<()>;
    async fn migrate_project(&self, inputs: Inputs, token: CancelToken) -> OpResult<()>;
    async fn project_migration_status(
        &self,
        inputs: Inputs,
        token: CancelToken,
    ) -> OpResult<VersionCheckResult>;
    async fn add_sso(&self, inputs: Inputs, token: CancelToken) -> OpResult<()>;
    async fn list_dev_tunnels(
        &self,
        inputs: Inputs,
        token: CancelToken,
    ) -> OpResult<Vec<DevTunnel>>;
    async fn sync_manifest(&self, inputs: Inputs, token: CancelToken) -> OpResult<()>;
    async fn publish_in_developer_portal(&self, inputs: Inputs, token: CancelToken)
        -> OpResult<()>;
    async fn get_launch_url(&self, inputs: Inputs, token: CancelToken) -> OpResult<String>;
    async fn get_sideloading_status(
        &self,
        account: AccountToken,
        token: CancelToken,
    ) -> OpResult<String>;
    async fn pre_check_yml_and_env(&self, inputs: Inputs, token: CancelToken) -> OpResult<()>;
    async fn validate_manifest(&self, inputs: Inputs, token: CancelToken) -> OpResult<()>;
}

/// Engine with no business logic: every operation fails with a
/// `NotImplemented` system error. Lets the binary bring up the wire without
/// a core behind it.
#[derive(Debug, Default)]
pub struct NullEngine;

const SOURCE: &str = "scaffold-server";

macro_rules! unimplemented_op {
    ($name:literal) => {
        Err(OpError::not_implemented(SOURCE, $name))
    };
}

#[async_trait]
impl Engine for NullEngine {
    async fn get_questions(
        &self,
        _stage: Stage,
        _inputs: Inputs,
        _token: CancelToken,
    ) -> OpResult<Option<QTreeNode>> {
        unimplemented_op!("get-questions")
    }

    async fn create_project(
        &self,
        _inputs: Inputs,
        _token: CancelToken,
    ) -> OpResult<CreateProjectResult> {
        unimplemented_op!("create-project")
    }

    async fn local_debug(&self, _inputs: Inputs, _token: CancelToken) -> OpResult<()> {
        unimplemented_op!("local-debug")
    }

    async fn pre_provision(
        &self,
        _inputs: Inputs,
        _token: CancelToken,
    ) -> OpResult<PreProvisionSummary> {
        unimplemented_op!("pre-provision")
    }

    async fn provision_resources(&self, _inputs: Inputs, _token: CancelToken) -> OpResult<()> {
        unimplemented_op!("provision-resources")
    }

    async fn deploy_artifacts(&self, _inputs: Inputs, _token: CancelToken) -> OpResult<()> {
        unimplemented_op!("deploy-artifacts")
    }

    async fn build_artifacts(&self, _inputs: Inputs, _token: CancelToken) -> OpResult<Value> {
        unimplemented_op!("build-artifacts")
    }

    async fn publish_application(&self, _inputs: Inputs, _token: CancelToken) -> OpResult<()> {
        unimplemented_op!("publish-application")
    }

    async fn deploy_manifest(&self, _inputs: Inputs, _token: CancelToken) -> OpResult<()> {
        unimplemented_op!("deploy-manifest")
    }

    async fn migrate_project(&self, _inputs: Inputs, _token: CancelToken) -> OpResult<()> {
        unimplemented_op!("migrate-project")
    }

    async fn project_migration_status(
        &self,
        _inputs: Inputs,
        _token: CancelToken,
    ) -> OpResult<VersionCheckResult> {
        unimplemented_op!("get-project-migration-status")
    }

    async fn add_sso(&self, _inputs: Inputs, _token: CancelToken) -> OpResult<()> {
        unimplemented_op!("add-sso")
    }

    async fn list_dev_tunnels(
        &self,
        _inputs: Inputs,
        _token: CancelToken,
    ) -> OpResult<Vec<DevTunnel>> {
        unimplemented_op!("list-dev-tunnels")
    }

    async fn sync_manifest(&self, _inputs: Inputs, _token: CancelToken) -> OpResult<()> {
        unimplemented_op!("sync-manifest")
    }

    async fn publish_in_developer_portal(
        &self,
        _inputs: Inputs,
        _token: CancelToken,
    ) -> OpResult<()> {
        unimplemented_op!("publish-in-developer-portal")
    }

    async fn get_launch_url(&self, _inputs: Inputs, _token: CancelToken) -> OpResult<String> {
        unimplemented_op!("get-launch-url")
    }

    async fn get_sideloading_status(
        &self,
        _account: AccountToken,
        _token: CancelToken,
    ) -> OpResult<String> {
        unimplemented_op!("get-sideloading-status")
    }

    async fn pre_check_yml_and_env(&self, _inputs: Inputs, _token: CancelToken) -> OpResult<()> {
        unimplemented_op!("pre-check-yml-and-env")
    }

    async fn validate_manifest(&self, _inputs: Inputs, _token: CancelToken) -> OpResult<()> {
        unimplemented_op!("validate-manifest")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputs::Platform;

    #[tokio::test]
    async fn null_engine_reports_not_implemented() {
        let engine = NullEngine;
        let err = engine
            .create_project(Inputs::new(Platform::Cli), CancelToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.name(), "NotImplemented");
        assert_eq!(err.source_name(), "scaffold-server");
    }
}
