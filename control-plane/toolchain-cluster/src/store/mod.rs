//! Persistence seams consumed by registration and health reconciliation.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::crd::{ToolchainCluster, ToolchainClusterStatus};
use crate::errors::StoreError;

pub mod k8s;
pub mod memory;

pub use k8s::{KubeClusterStore, KubeSecretStore};
pub use memory::{InMemoryClusterStore, InMemorySecretStore};

/// Descriptor persistence. Implementations are scoped to one namespace.
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// `Ok(None)` when the descriptor does not exist.
    async fn get(&self, name: &str)
    -> Result<Option<ToolchainCluster>, StoreError>;

    async fn list(&self) -> Result<Vec<ToolchainCluster>, StoreError>;

    async fn update_status(
        &self,
        name: &str,
        status: &ToolchainClusterStatus,
    ) -> Result<(), StoreError>;
}

/// Decoded secret data keyed by entry name.
pub type SecretData = BTreeMap<String, String>;

#[async_trait]
pub trait SecretStore: Send + Sync {
    /// `Ok(None)` when the secret does not exist.
    async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<SecretData>, StoreError>;
}
