use std::sync::Arc;

use kube::ResourceExt;
use tracing::{debug, info, warn};

use crate::cache::{ClusterConnection, ConnectionCache, RefreshHook};
use crate::config::RegistrationConfig;
use crate::crd::{
    LABEL_OPERATOR_NAMESPACE, LABEL_OWNER_CLUSTER_NAME, ToolchainCluster,
};
use crate::errors::RegistrationError;
use crate::store::{ClusterStore, SecretStore};

mod factory;

pub use factory::{ClientFactory, KubeClientFactory, RestConfig};

/// Keeps the [`ConnectionCache`] in step with the set of known
/// ToolchainCluster descriptors.
pub struct ClusterRegistrationService {
    cache: ConnectionCache,
    clusters: Arc<dyn ClusterStore>,
    secrets: Arc<dyn SecretStore>,
    factory: Arc<dyn ClientFactory>,
    config: RegistrationConfig,
}

impl ClusterRegistrationService {
    pub fn new(
        cache: ConnectionCache,
        clusters: Arc<dyn ClusterStore>,
        secrets: Arc<dyn SecretStore>,
        factory: Arc<dyn ClientFactory>,
        config: RegistrationConfig,
    ) -> Self {
        Self {
            cache,
            clusters,
            secrets,
            factory,
            config,
        }
    }

    pub fn cache(&self) -> &ConnectionCache {
        &self.cache
    }

    /// Build a connection for `cluster` and install it, replacing any
    /// previous entry. On error the cache is left as it was.
    ///
    /// When the cached entry already points at the same endpoint, secret,
    /// TLS settings and labels, its client is reused and only the status is
    /// replaced.
    pub async fn add_or_update(
        &self,
        cluster: &ToolchainCluster,
    ) -> Result<(), RegistrationError> {
        let name = cluster.name_any();
        let status = cluster.status.clone().unwrap_or_default();

        if let Some(existing) = self.cache.get(&name, false).await {
            if self.same_connection(&existing, cluster) {
                let mut updated = ClusterConnection::clone(&existing);
                updated.status = status;
                self.cache.add(updated).await;
                debug!(cluster = %name, "connection unchanged; status refreshed");
                return Ok(());
            }
        }

        let rest_config = self.rest_config_for(cluster).await?;
        let client = self.factory.build(&rest_config).await.map_err(|e| {
            RegistrationError::ClientConstruction {
                cluster: name.clone(),
                source: e,
            }
        })?;

        let connection = ClusterConnection {
            name: name.clone(),
            operator_namespace: self.operator_namespace_for(cluster),
            owner_cluster_name: owner_for(cluster),
            api_endpoint: cluster.spec.api_endpoint.clone(),
            secret_name: cluster.spec.secret_ref.name.clone(),
            rest_config,
            client,
            status,
        };
        self.cache.add(connection).await;
        info!(cluster = %name, endpoint = %cluster.spec.api_endpoint, "cluster registered");
        Ok(())
    }

    pub async fn delete(&self, name: &str) {
        self.cache.delete(name).await;
        info!(cluster = %name, "cluster unregistered");
    }

    /// Re-register every descriptor in the store. Individual failures are
    /// logged and skipped. Returns how many clusters were registered.
    pub async fn refresh(&self) -> usize {
        let clusters = match self.clusters.list().await {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "refresh: failed to list clusters");
                return 0;
            }
        };
        let mut registered = 0;
        for cluster in &clusters {
            match self.add_or_update(cluster).await {
                Ok(()) => registered += 1,
                Err(e) => {
                    warn!(cluster = %cluster.name_any(), error = %e, "refresh: registration failed");
                }
            }
        }
        info!(registered, total = clusters.len(), "cache refreshed");
        registered
    }

    /// Refresh callback for [`ConnectionCache::set_refresh_hook`]. Holds a
    /// weak reference, so the cache does not keep the service alive.
    pub fn refresh_hook(self: &Arc<Self>) -> RefreshHook {
        let weak = Arc::downgrade(self);
        Arc::new(move || {
            let weak = weak.clone();
            Box::pin(async move {
                if let Some(service) = weak.upgrade() {
                    service.refresh().await;
                }
            })
        })
    }

    async fn rest_config_for(
        &self,
        cluster: &ToolchainCluster,
    ) -> Result<RestConfig, RegistrationError> {
        let name = cluster.name_any();
        let ns = cluster.namespace().unwrap_or_else(|| "default".to_string());
        let secret_name = &cluster.spec.secret_ref.name;
        let secret_err = |reason: String| RegistrationError::SecretResolution {
            cluster: name.clone(),
            reason,
        };

        if secret_name.is_empty() {
            return Err(secret_err("descriptor has no secretRef".into()));
        }
        let data = self
            .secrets
            .get(&ns, secret_name)
            .await?
            .ok_or_else(|| {
                secret_err(format!("secret {ns}/{secret_name} not found"))
            })?;
        let token = data
            .get(&self.config.token_key)
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                secret_err(format!(
                    "secret {ns}/{secret_name} has no '{}' entry",
                    self.config.token_key
                ))
            })?;

        Ok(RestConfig {
            host: cluster.spec.api_endpoint.clone(),
            insecure: cluster.tls_verification_disabled(),
            ca_data: ca_for(cluster),
            bearer_token: token.to_string(),
        })
    }

    fn operator_namespace_for(&self, cluster: &ToolchainCluster) -> String {
        cluster
            .label(LABEL_OPERATOR_NAMESPACE)
            .unwrap_or(&self.config.default_operator_namespace)
            .to_string()
    }

    fn same_connection(
        &self,
        existing: &ClusterConnection,
        cluster: &ToolchainCluster,
    ) -> bool {
        existing.api_endpoint == cluster.spec.api_endpoint
            && existing.secret_name == cluster.spec.secret_ref.name
            && existing.rest_config.insecure
                == cluster.tls_verification_disabled()
            && existing.rest_config.ca_data == ca_for(cluster)
            && existing.operator_namespace
                == self.operator_namespace_for(cluster)
            && existing.owner_cluster_name == owner_for(cluster)
    }
}

fn owner_for(cluster: &ToolchainCluster) -> String {
    cluster
        .label(LABEL_OWNER_CLUSTER_NAME)
        .unwrap_or_default()
        .to_string()
}

fn ca_for(cluster: &ToolchainCluster) -> Option<String> {
    cluster.spec.ca_bundle.clone().filter(|ca| !ca.is_empty())
}
