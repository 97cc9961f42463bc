pub mod cache;
pub mod config;
pub mod controller;
pub mod crd;
pub mod errors;
pub mod health;
pub mod registration;
pub mod runtime;
pub mod store;

pub use cache::{ClusterConnection, ConnectionCache};
pub use errors::*;
pub use health::{HealthProbe, HealthReconciler, Outcome};
pub use registration::ClusterRegistrationService;

use tracing_subscriber::{
    EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

pub fn init_tracing(default_env: &str) {
    let filter = EnvFilter::builder()
        .with_env_var("RUST_LOG")
        .from_env_lossy()
        .add_directive(
            default_env
                .parse()
                .unwrap_or_else(|_| "info".parse().unwrap()),
        );

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .try_init();
}

/// Install the aws-lc-rs rustls provider as process default. Safe to call
/// more than once.
pub fn install_crypto_provider() {
    if let Err(e) = rustls::crypto::CryptoProvider::install_default(
        rustls::crypto::aws_lc_rs::default_provider(),
    ) {
        tracing::debug!(
            ?e,
            "CryptoProvider already installed or incompatible; proceeding"
        );
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use kube::Client;

    /// A kube client pointed at `url`. Nothing is sent until a request is
    /// issued, so unreachable addresses are fine for cache-only tests.
    pub fn client_for(url: &str) -> Client {
        crate::install_crypto_provider();
        let config = kube::Config::new(url.parse().unwrap());
        Client::try_from(config).unwrap()
    }
}
