use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ClusterStore, SecretData, SecretStore};
use crate::crd::{ToolchainCluster, ToolchainClusterStatus};
use crate::errors::StoreError;

/// Map-backed [`ClusterStore`] for tests and local runs.
#[derive(Clone, Default)]
pub struct InMemoryClusterStore {
    clusters: Arc<RwLock<HashMap<String, ToolchainCluster>>>,
    status_writes: Arc<AtomicUsize>,
}

impl InMemoryClusterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a descriptor, keyed by its metadata name.
    pub async fn put(&self, cluster: ToolchainCluster) {
        let name = cluster.metadata.name.clone().unwrap_or_default();
        self.clusters.write().await.insert(name, cluster);
    }

    pub async fn remove(&self, name: &str) {
        self.clusters.write().await.remove(name);
    }

    /// Number of successful `update_status` calls so far.
    pub fn status_writes(&self) -> usize {
        self.status_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClusterStore for InMemoryClusterStore {
    async fn get(
        &self,
        name: &str,
    ) -> Result<Option<ToolchainCluster>, StoreError> {
        Ok(self.clusters.read().await.get(name).cloned())
    }

    async fn list(&self) -> Result<Vec<ToolchainCluster>, StoreError> {
        Ok(self.clusters.read().await.values().cloned().collect())
    }

    async fn update_status(
        &self,
        name: &str,
        status: &ToolchainClusterStatus,
    ) -> Result<(), StoreError> {
        let mut w = self.clusters.write().await;
        let cluster = w
            .get_mut(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        cluster.status = Some(status.clone());
        self.status_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Map-backed [`SecretStore`] keyed by `namespace/name`.
#[derive(Clone, Default)]
pub struct InMemorySecretStore {
    secrets: Arc<RwLock<HashMap<String, SecretData>>>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, namespace: &str, name: &str, data: SecretData) {
        self.secrets
            .write()
            .await
            .insert(format!("{namespace}/{name}"), data);
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<SecretData>, StoreError> {
        Ok(self
            .secrets
            .read()
            .await
            .get(&format!("{namespace}/{name}"))
            .cloned())
    }
}
