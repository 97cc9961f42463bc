use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use kube::{
    Api, Client, ResourceExt,
    runtime::{Controller, controller::Action, watcher::Config},
};
use tracing::{debug, error, info, warn};

use crate::crd::{Condition, ToolchainCluster};
use crate::errors::ReconcileError;
use crate::health::{HealthReconciler, Outcome};

mod watch;

pub use watch::run_registration_watch;

#[derive(Clone)]
pub struct ControllerContext {
    pub health: Arc<HealthReconciler>,
}

/// Drive [`HealthReconciler`] for every ToolchainCluster in `namespace` at
/// the reconciler's fixed cadence.
pub async fn run_health_controller(
    client: Client,
    namespace: &str,
    health: Arc<HealthReconciler>,
) -> anyhow::Result<()> {
    let api: Api<ToolchainCluster> = Api::namespaced(client, namespace);
    let ctx = Arc::new(ControllerContext { health });

    Controller::new(api, Config::default())
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((obj_ref, action)) => {
                    info!(cluster = %obj_ref.name, "health reconciled: requeue={:?}", action)
                }
                Err(e) => error!(error = ?e, "health reconcile error"),
            }
        })
        .await;

    Ok(())
}

/// Time left until `interval` has passed since the newest
/// `last_updated_time` in `conditions`, or `None` when a pass is due.
///
/// Every status write comes back as a watch event; this keeps those events
/// from starting a pass ahead of the requeue timer.
pub fn remaining_interval(
    conditions: &[Condition],
    now: DateTime<Utc>,
    interval: Duration,
) -> Option<Duration> {
    let newest = conditions
        .iter()
        .filter_map(|c| c.last_updated_time.as_deref())
        .filter_map(|t| DateTime::parse_from_rfc3339(t).ok())
        .map(|t| t.with_timezone(&Utc))
        .max()?;
    let elapsed = now.signed_duration_since(newest).to_std().ok()?;
    interval.checked_sub(elapsed).filter(|left| !left.is_zero())
}

async fn reconcile(
    obj: Arc<ToolchainCluster>,
    ctx: Arc<ControllerContext>,
) -> Result<Action, ReconcileError> {
    if let Some(left) = remaining_interval(
        obj.conditions(),
        Utc::now(),
        ctx.health.requeue_after(),
    ) {
        debug!(cluster = %obj.name_any(), ?left, "checked recently; waiting");
        return Ok(Action::requeue(left));
    }
    match ctx.health.reconcile(&obj.name_any()).await? {
        Outcome::RequeueAfter(after) => Ok(Action::requeue(after)),
        Outcome::Done => Ok(Action::await_change()),
    }
}

fn error_policy(
    obj: Arc<ToolchainCluster>,
    error: &ReconcileError,
    ctx: Arc<ControllerContext>,
) -> Action {
    warn!(cluster = %obj.name_any(), error = %error, "health check failed");
    Action::requeue(ctx.health.requeue_after())
}
