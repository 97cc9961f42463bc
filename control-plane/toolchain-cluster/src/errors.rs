use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("cannot resolve credentials for cluster {cluster}: {reason}")]
    SecretResolution { cluster: String, reason: String },

    #[error("cannot build client for cluster {cluster}: {source}")]
    ClientConstruction {
        cluster: String,
        #[source]
        source: ClientBuildError,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum ClientBuildError {
    #[error("invalid rest config: {0}")]
    InvalidConfig(String),

    #[error("kubeconfig error: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    #[error("kube client error: {0}")]
    Kube(#[from] kube::Error),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("kube api error: {0}")]
    Kube(#[from] kube::Error),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("object not found: {0}")]
    NotFound(String),
}

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("no cached connection for cluster {0}")]
    CacheMiss(String),

    #[error("failed to fetch cluster {cluster}: {source}")]
    Fetch {
        cluster: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to persist status of cluster {cluster}: {source}")]
    Persistence {
        cluster: String,
        #[source]
        source: StoreError,
    },
}
