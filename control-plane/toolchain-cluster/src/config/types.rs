use std::time::Duration;

use envconfig::Envconfig;

#[derive(Envconfig, Clone, Debug)]
pub struct OperatorConfig {
    /// Namespace holding ToolchainCluster descriptors and their secrets.
    /// Env: TOOLCHAIN_WATCH_NAMESPACE
    #[envconfig(
        from = "TOOLCHAIN_WATCH_NAMESPACE",
        default = "toolchain-host-operator"
    )]
    pub watch_namespace: String,

    /// Fixed cadence of the health reconciliation, in seconds.
    /// Env: TOOLCHAIN_HEALTH_CHECK_INTERVAL_SECS
    #[envconfig(from = "TOOLCHAIN_HEALTH_CHECK_INTERVAL_SECS", default = "10")]
    pub health_check_interval_secs: u64,

    #[envconfig(from = "TOOLCHAIN_LOG", default = "info")]
    pub log: String,

    #[envconfig(nested)]
    pub registration: RegistrationEnv,

    #[envconfig(nested)]
    pub client: ClientEnv,
}

#[derive(Envconfig, Clone, Debug)]
pub struct RegistrationEnv {
    #[envconfig(from = "TOOLCHAIN_SECRET_TOKEN_KEY", default = "token")]
    pub token_key: String,
    /// Used when a descriptor carries no `namespace` label.
    #[envconfig(
        from = "TOOLCHAIN_DEFAULT_OPERATOR_NAMESPACE",
        default = "toolchain-member-operator"
    )]
    pub default_operator_namespace: String,
}

#[derive(Envconfig, Clone, Debug)]
pub struct ClientEnv {
    #[envconfig(from = "TOOLCHAIN_CLIENT_CONNECT_TIMEOUT_SECS", default = "5")]
    pub connect_timeout_secs: u64,
    #[envconfig(from = "TOOLCHAIN_CLIENT_READ_TIMEOUT_SECS", default = "10")]
    pub read_timeout_secs: u64,
    /// If set, overrides every descriptor's TLS verification setting.
    /// Env: TOOLCHAIN_CLIENT_INSECURE
    #[envconfig(from = "TOOLCHAIN_CLIENT_INSECURE")]
    pub insecure_override: Option<bool>,
}

/// Secret resolution settings for cluster registration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistrationConfig {
    /// Secret key holding the bearer token. Default: `token`.
    pub token_key: String,
    /// Default: `toolchain-member-operator`.
    pub default_operator_namespace: String,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            token_key: "token".into(),
            default_operator_namespace: "toolchain-member-operator".into(),
        }
    }
}

/// Transport options handed to the client factory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientOptions {
    /// Default: 5s.
    pub connect_timeout: Duration,
    /// Default: 10s.
    pub read_timeout: Duration,
    /// When `Some`, replaces the insecure flag derived from the descriptor.
    /// Default: `None`.
    pub insecure_override: Option<bool>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
            insecure_override: None,
        }
    }
}

impl OperatorConfig {
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs.max(1))
    }

    pub fn registration_config(&self) -> RegistrationConfig {
        RegistrationConfig {
            token_key: self.registration.token_key.clone(),
            default_operator_namespace: self
                .registration
                .default_operator_namespace
                .clone(),
        }
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            connect_timeout: Duration::from_secs(self.client.connect_timeout_secs),
            read_timeout: Duration::from_secs(self.client.read_timeout_secs),
            insecure_override: self.client.insecure_override,
        }
    }
}
