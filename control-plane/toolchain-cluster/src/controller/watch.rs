use std::sync::Arc;

use futures_util::StreamExt;
use kube::runtime::{WatchStreamExt, watcher};
use kube::{Api, Client, ResourceExt};
use tracing::{error, info, warn};

use crate::crd::ToolchainCluster;
use crate::registration::ClusterRegistrationService;

/// Keep the connection cache in step with ToolchainCluster create, update
/// and delete events in `namespace`.
pub async fn run_registration_watch(
    client: Client,
    namespace: &str,
    registration: Arc<ClusterRegistrationService>,
) -> anyhow::Result<()> {
    let api: Api<ToolchainCluster> = Api::namespaced(client, namespace);
    let mut stream = watcher(api, watcher::Config::default())
        .default_backoff()
        .boxed();

    info!(%namespace, "registration watch started");

    while let Some(event) = stream.next().await {
        match event {
            Ok(watcher::Event::Apply(tc)) | Ok(watcher::Event::InitApply(tc)) => {
                if let Err(e) = registration.add_or_update(&tc).await {
                    warn!(cluster = %tc.name_any(), error = %e, "registration failed");
                }
            }
            Ok(watcher::Event::Delete(tc)) => {
                registration.delete(&tc.name_any()).await;
            }
            Ok(watcher::Event::Init) => {}
            Ok(watcher::Event::InitDone) => {
                let clusters = registration.cache().len().await;
                info!(clusters, "registration watch synced");
            }
            Err(e) => error!(error = %e, "ToolchainCluster watch error"),
        }
    }

    warn!("registration watch stream ended");
    Ok(())
}
