use envconfig::Envconfig;
use kube::Client;
use toolchain_cluster::{
    config::OperatorConfig, init_tracing, install_crypto_provider, runtime,
};
use tracing::info;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let cfg = OperatorConfig::init_from_env()?;
    init_tracing(&cfg.log);

    // Both rustls providers may be compiled in; pick one explicitly.
    install_crypto_provider();

    info!(?cfg, "Starting toolchain cluster monitor");

    let client = Client::try_default().await?;
    runtime::run_all(client, cfg).await
}
