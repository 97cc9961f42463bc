#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use toolchain_cluster::config::{ClientOptions, RegistrationConfig};
use toolchain_cluster::crd::{
    Condition, ConditionStatus, ConditionType, LocalSecretReference,
    ToolchainCluster, ToolchainClusterSpec, ToolchainClusterStatus,
};
use toolchain_cluster::registration::KubeClientFactory;
use toolchain_cluster::store::{
    ClusterStore, InMemoryClusterStore, InMemorySecretStore,
};
use toolchain_cluster::{
    ClusterRegistrationService, ConnectionCache, HealthProbe,
    HealthReconciler, StoreError, install_crypto_provider,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const NS: &str = "toolchain-host-operator";
pub const TOKEN: &str = "t0k3n";
pub const INTERVAL: Duration = Duration::from_secs(10);

pub fn descriptor(name: &str, endpoint: &str) -> ToolchainCluster {
    let mut tc = ToolchainCluster::new(
        name,
        ToolchainClusterSpec {
            api_endpoint: endpoint.to_string(),
            ca_bundle: None,
            secret_ref: LocalSecretReference {
                name: format!("{name}-sa"),
            },
            disabled_tls_validations: Some(vec!["*".into()]),
        },
    );
    tc.metadata.namespace = Some(NS.into());
    tc
}

/// Mock API server answering `/healthz` with `body`.
pub async fn healthz_server(body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/healthz"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;
    server
}

/// An http endpoint nothing listens on.
pub fn closed_endpoint() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

pub struct Harness {
    pub store: InMemoryClusterStore,
    pub secrets: InMemorySecretStore,
    pub cache: ConnectionCache,
    pub registration: Arc<ClusterRegistrationService>,
    pub health: HealthReconciler,
}

impl Harness {
    pub fn new() -> Self {
        install_crypto_provider();
        let store = InMemoryClusterStore::new();
        let secrets = InMemorySecretStore::new();
        let cache = ConnectionCache::new();
        let registration = Arc::new(ClusterRegistrationService::new(
            cache.clone(),
            Arc::new(store.clone()),
            Arc::new(secrets.clone()),
            Arc::new(KubeClientFactory::new(ClientOptions::default())),
            RegistrationConfig::default(),
        ));
        let health = HealthReconciler::new(
            Arc::new(store.clone()),
            cache.clone(),
            HealthProbe::new(),
            INTERVAL,
        );
        Self {
            store,
            secrets,
            cache,
            registration,
            health,
        }
    }

    /// Store the descriptor and its token secret without registering it.
    pub async fn put(&self, name: &str, endpoint: &str) -> ToolchainCluster {
        let tc = descriptor(name, endpoint);
        self.secrets
            .put(
                NS,
                &format!("{name}-sa"),
                BTreeMap::from([("token".to_string(), TOKEN.to_string())]),
            )
            .await;
        self.store.put(tc.clone()).await;
        tc
    }

    /// Store and register.
    pub async fn register(&self, name: &str, endpoint: &str) {
        let tc = self.put(name, endpoint).await;
        self.registration.add_or_update(&tc).await.unwrap();
    }

    /// Point an existing descriptor at a new endpoint, keeping its status,
    /// and re-register it.
    pub async fn repoint(&self, name: &str, endpoint: &str) {
        let mut tc = self.store.get(name).await.unwrap().unwrap();
        tc.spec.api_endpoint = endpoint.to_string();
        self.store.put(tc.clone()).await;
        self.registration.add_or_update(&tc).await.unwrap();
    }

    /// A reconciler over the same cache whose store fails as configured.
    pub fn health_over(&self, store: FailingStore) -> HealthReconciler {
        HealthReconciler::new(
            Arc::new(store),
            self.cache.clone(),
            HealthProbe::new(),
            INTERVAL,
        )
    }

    pub async fn conditions(&self, name: &str) -> Vec<Condition> {
        self.store
            .get(name)
            .await
            .unwrap()
            .map(|tc| tc.conditions().to_vec())
            .unwrap_or_default()
    }
}

pub fn find(
    conds: &[Condition],
    type_: ConditionType,
) -> Option<&Condition> {
    conds.iter().find(|c| c.type_ == type_)
}

pub fn status_of(conds: &[Condition], type_: ConditionType) -> ConditionStatus {
    find(conds, type_)
        .map(|c| c.status)
        .unwrap_or(ConditionStatus::Unknown)
}

/// Delegates to an in-memory store, failing reads and/or status writes.
#[derive(Clone)]
pub struct FailingStore {
    pub inner: InMemoryClusterStore,
    pub fail_get: bool,
    pub fail_update: bool,
}

fn unavailable() -> StoreError {
    StoreError::Kube(kube::Error::Api(kube::error::ErrorResponse {
        status: "Failure".into(),
        message: "etcdserver: request timed out".into(),
        reason: "ServiceUnavailable".into(),
        code: 503,
    }))
}

#[async_trait]
impl ClusterStore for FailingStore {
    async fn get(
        &self,
        name: &str,
    ) -> Result<Option<ToolchainCluster>, StoreError> {
        if self.fail_get {
            return Err(unavailable());
        }
        self.inner.get(name).await
    }

    async fn list(&self) -> Result<Vec<ToolchainCluster>, StoreError> {
        if self.fail_get {
            return Err(unavailable());
        }
        self.inner.list().await
    }

    async fn update_status(
        &self,
        name: &str,
        status: &ToolchainClusterStatus,
    ) -> Result<(), StoreError> {
        if self.fail_update {
            return Err(unavailable());
        }
        self.inner.update_status(name, status).await
    }
}
