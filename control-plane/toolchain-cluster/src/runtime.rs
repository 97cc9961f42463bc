use std::sync::Arc;

use kube::Client;
use tokio::{task::JoinHandle, try_join};

use crate::{
    cache::ConnectionCache,
    config::OperatorConfig,
    controller::{run_health_controller, run_registration_watch},
    health::{HealthProbe, HealthReconciler},
    registration::{ClusterRegistrationService, KubeClientFactory},
    store::{KubeClusterStore, KubeSecretStore},
};

/// Shared components wired from config.
pub struct Components {
    pub cache: ConnectionCache,
    pub registration: Arc<ClusterRegistrationService>,
    pub health: Arc<HealthReconciler>,
}

pub async fn build_components(client: Client, cfg: &OperatorConfig) -> Components {
    let cache = ConnectionCache::new();
    let store = Arc::new(KubeClusterStore::new(
        client.clone(),
        &cfg.watch_namespace,
    ));
    let registration = Arc::new(ClusterRegistrationService::new(
        cache.clone(),
        store.clone(),
        Arc::new(KubeSecretStore::new(client)),
        Arc::new(KubeClientFactory::new(cfg.client_options())),
        cfg.registration_config(),
    ));
    cache.set_refresh_hook(registration.refresh_hook()).await;

    let health = Arc::new(HealthReconciler::new(
        store,
        cache.clone(),
        HealthProbe::new(),
        cfg.health_check_interval(),
    ));

    Components {
        cache,
        registration,
        health,
    }
}

/// Spawn the watch that keeps the connection cache in sync.
pub fn spawn_registration_watch(
    client: Client,
    namespace: String,
    registration: Arc<ClusterRegistrationService>,
) -> JoinHandle<anyhow::Result<()>> {
    tokio::spawn(async move {
        run_registration_watch(client, &namespace, registration).await
    })
}

/// Spawn the periodic health controller.
pub fn spawn_health_controller(
    client: Client,
    namespace: String,
    health: Arc<HealthReconciler>,
) -> JoinHandle<anyhow::Result<()>> {
    tokio::spawn(async move {
        run_health_controller(client, &namespace, health).await
    })
}

/// Start registration and health monitoring and wait until either finishes.
pub async fn run_all(client: Client, cfg: OperatorConfig) -> anyhow::Result<()> {
    let components = build_components(client.clone(), &cfg).await;

    let watch = spawn_registration_watch(
        client.clone(),
        cfg.watch_namespace.clone(),
        components.registration,
    );
    let health = spawn_health_controller(
        client,
        cfg.watch_namespace.clone(),
        components.health,
    );

    let (w_res, h_res) = try_join!(watch, health)?;
    w_res?;
    h_res?;
    Ok(())
}
