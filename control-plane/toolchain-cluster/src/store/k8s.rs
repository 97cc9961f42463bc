use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::Client;
use kube::api::{Api, ListParams, Patch, PatchParams};
use serde_json::json;
use tracing::trace;

use super::{ClusterStore, SecretData, SecretStore};
use crate::crd::{ToolchainCluster, ToolchainClusterStatus};
use crate::errors::StoreError;

/// ToolchainCluster persistence through the Kubernetes API.
#[derive(Clone)]
pub struct KubeClusterStore {
    api: Api<ToolchainCluster>,
}

impl KubeClusterStore {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
        }
    }
}

#[async_trait]
impl ClusterStore for KubeClusterStore {
    async fn get(
        &self,
        name: &str,
    ) -> Result<Option<ToolchainCluster>, StoreError> {
        Ok(self.api.get_opt(name).await?)
    }

    async fn list(&self) -> Result<Vec<ToolchainCluster>, StoreError> {
        Ok(self.api.list(&ListParams::default()).await?.items)
    }

    async fn update_status(
        &self,
        name: &str,
        status: &ToolchainClusterStatus,
    ) -> Result<(), StoreError> {
        // Merge patch replaces the conditions array as a whole.
        let patch = json!({ "status": status });
        self.api
            .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        trace!(cluster = %name, "status patched");
        Ok(())
    }
}

#[derive(Clone)]
pub struct KubeSecretStore {
    client: Client,
}

impl KubeSecretStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<SecretData>, StoreError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let Some(secret) = api.get_opt(name).await? else {
            return Ok(None);
        };
        Ok(Some(decode_secret(secret)))
    }
}

fn decode_secret(secret: Secret) -> SecretData {
    let mut out = SecretData::new();
    if let Some(data) = secret.data {
        for (k, v) in data {
            out.insert(k, String::from_utf8_lossy(&v.0).into_owned());
        }
    }
    // stringData wins, matching how the API server folds it into data
    if let Some(string_data) = secret.string_data {
        out.extend(string_data);
    }
    out
}
