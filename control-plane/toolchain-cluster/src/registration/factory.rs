use std::fmt;

use async_trait::async_trait;
use kube::Client;
use kube::config::{KubeConfigOptions, Kubeconfig};
use serde_json::json;
use tracing::debug;

use crate::config::ClientOptions;
use crate::errors::ClientBuildError;

/// Transport and credentials for one remote API server.
#[derive(Clone, PartialEq, Eq)]
pub struct RestConfig {
    pub host: String,
    pub insecure: bool,
    /// Base64 encoded PEM bundle
    pub ca_data: Option<String>,
    pub bearer_token: String,
}

impl fmt::Debug for RestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestConfig")
            .field("host", &self.host)
            .field("insecure", &self.insecure)
            .field("ca_data", &self.ca_data.as_ref().map(|_| "<set>"))
            .field("bearer_token", &"<redacted>")
            .finish()
    }
}

/// Turns a [`RestConfig`] into an authenticated client.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn build(&self, config: &RestConfig)
    -> Result<Client, ClientBuildError>;
}

/// Builds `kube::Client`s through an in-memory kubeconfig.
#[derive(Clone, Debug, Default)]
pub struct KubeClientFactory {
    options: ClientOptions,
}

impl KubeClientFactory {
    pub fn new(options: ClientOptions) -> Self {
        Self { options }
    }

    fn kubeconfig(
        &self,
        config: &RestConfig,
    ) -> Result<Kubeconfig, ClientBuildError> {
        if config.host.is_empty() {
            return Err(ClientBuildError::InvalidConfig(
                "empty API endpoint".into(),
            ));
        }
        if !(config.host.starts_with("http://")
            || config.host.starts_with("https://"))
        {
            return Err(ClientBuildError::InvalidConfig(format!(
                "API endpoint must start with http:// or https://: {}",
                config.host
            )));
        }
        if config.bearer_token.is_empty() {
            return Err(ClientBuildError::InvalidConfig(
                "empty bearer token".into(),
            ));
        }

        let insecure = self.options.insecure_override.unwrap_or(config.insecure);
        let mut cluster = json!({ "server": config.host });
        if insecure {
            cluster["insecure-skip-tls-verify"] = json!(true);
        } else if let Some(ca) = config.ca_data.as_deref() {
            cluster["certificate-authority-data"] = json!(ca);
        }

        let raw = json!({
            "apiVersion": "v1",
            "kind": "Config",
            "clusters": [{ "name": "remote", "cluster": cluster }],
            "users": [{
                "name": "remote",
                "user": { "token": config.bearer_token }
            }],
            "contexts": [{
                "name": "remote",
                "context": { "cluster": "remote", "user": "remote" }
            }],
            "current-context": "remote"
        });
        serde_json::from_value(raw).map_err(|e| {
            ClientBuildError::InvalidConfig(format!("kubeconfig: {e}"))
        })
    }
}

#[async_trait]
impl ClientFactory for KubeClientFactory {
    async fn build(
        &self,
        config: &RestConfig,
    ) -> Result<Client, ClientBuildError> {
        let kubeconfig = self.kubeconfig(config)?;
        let mut kube_config = kube::Config::from_custom_kubeconfig(
            kubeconfig,
            &KubeConfigOptions::default(),
        )
        .await?;
        kube_config.connect_timeout = Some(self.options.connect_timeout);
        kube_config.read_timeout = Some(self.options.read_timeout);
        debug!(host = %config.host, "building remote cluster client");
        Ok(Client::try_from(kube_config)?)
    }
}
