use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use super::{HealthProbe, conditions, merge_conditions};
use crate::cache::ConnectionCache;
use crate::crd::{Condition, ConditionType, ToolchainClusterStatus};
use crate::errors::ReconcileError;
use crate::store::ClusterStore;

/// What the scheduler should do after a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    RequeueAfter(Duration),
    /// Descriptor is gone; stop monitoring it.
    Done,
}

/// Runs one health-check pass per call for a named cluster. All per-cluster
/// state lives in the persisted conditions.
pub struct HealthReconciler {
    store: Arc<dyn ClusterStore>,
    cache: ConnectionCache,
    probe: HealthProbe,
    interval: Duration,
}

impl HealthReconciler {
    pub fn new(
        store: Arc<dyn ClusterStore>,
        cache: ConnectionCache,
        probe: HealthProbe,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            probe,
            interval,
        }
    }

    /// Fixed delay before the next pass, on success and on error alike.
    pub fn requeue_after(&self) -> Duration {
        self.interval
    }

    #[instrument(skip(self), fields(cluster = %name))]
    pub async fn reconcile(
        &self,
        name: &str,
    ) -> Result<Outcome, ReconcileError> {
        let cluster = self.store.get(name).await.map_err(|e| {
            ReconcileError::Fetch {
                cluster: name.to_string(),
                source: e,
            }
        })?;
        let Some(cluster) = cluster else {
            debug!("descriptor gone; stop monitoring");
            return Ok(Outcome::Done);
        };

        let Some(connection) = self.cache.get(name, false).await else {
            warn!("no cached connection; marking cluster offline");
            // Only the Offline condition survives; its transition time is
            // kept when it was already True.
            let previous: Vec<Condition> = cluster
                .conditions()
                .iter()
                .filter(|c| c.type_ == ConditionType::Offline)
                .cloned()
                .collect();
            let status = ToolchainClusterStatus {
                conditions: merge_conditions(
                    &previous,
                    vec![conditions::offline()],
                    Utc::now(),
                ),
            };
            self.persist(name, &status).await?;
            return Err(ReconcileError::CacheMiss(name.to_string()));
        };

        let observed = self.probe.check(&connection.client).await;
        let merged =
            merge_conditions(cluster.conditions(), observed, Utc::now());
        let status = ToolchainClusterStatus { conditions: merged };
        self.persist(name, &status).await?;

        info!(
            ready = status.is_ready(),
            conditions = status.conditions.len(),
            "health checked"
        );
        Ok(Outcome::RequeueAfter(self.interval))
    }

    async fn persist(
        &self,
        name: &str,
        status: &ToolchainClusterStatus,
    ) -> Result<(), ReconcileError> {
        self.store.update_status(name, status).await.map_err(|e| {
            ReconcileError::Persistence {
                cluster: name.to_string(),
                source: e,
            }
        })
    }
}
