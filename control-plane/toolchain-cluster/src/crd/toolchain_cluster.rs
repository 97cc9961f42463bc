use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Label carrying the namespace the operator runs in on the remote cluster.
pub const LABEL_OPERATOR_NAMESPACE: &str = "namespace";
/// Label naming the cluster that registered this descriptor.
pub const LABEL_OWNER_CLUSTER_NAME: &str = "ownerClusterName";

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "toolchain.dev.openshift.com",
    version = "v1alpha1",
    kind = "ToolchainCluster",
    plural = "toolchainclusters",
    namespaced,
    status = "ToolchainClusterStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ToolchainClusterSpec {
    /// Base URL of the remote API server, e.g. https://api.member-1:6443
    pub api_endpoint: String,
    /// Base64 encoded PEM bundle used to verify the remote API server
    pub ca_bundle: Option<String>,
    /// Secret (in the descriptor's namespace) holding the bearer token
    pub secret_ref: LocalSecretReference,
    /// TLS validations to skip; "*" disables verification entirely
    #[serde(rename = "disabledTLSValidations")]
    pub disabled_tls_validations: Option<Vec<String>>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
pub struct LocalSecretReference {
    pub name: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
pub struct ToolchainClusterStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    #[schemars(with = "String")]
    pub type_: ConditionType,
    pub status: ConditionStatus,
    pub reason: Option<String>,
    pub message: Option<String>,
    /// RFC3339; last time `status` changed for this type
    pub last_transition_time: Option<String>,
    /// RFC3339; last probe that produced this condition
    pub last_updated_time: Option<String>,
}

/// Condition types this crate writes. Any other type read from the API
/// server is kept verbatim so it survives a status write.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum ConditionType {
    Ready,
    Offline,
    Other(String),
}

impl From<String> for ConditionType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Ready" => Self::Ready,
            "Offline" => Self::Offline,
            _ => Self::Other(s),
        }
    }
}

impl From<ConditionType> for String {
    fn from(t: ConditionType) -> Self {
        match t {
            ConditionType::Ready => "Ready".into(),
            ConditionType::Offline => "Offline".into(),
            ConditionType::Other(s) => s,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl Condition {
    pub fn new(
        type_: ConditionType,
        status: ConditionStatus,
        reason: &str,
        message: &str,
    ) -> Self {
        Self {
            type_,
            status,
            reason: Some(reason.into()),
            message: Some(message.into()),
            last_transition_time: None,
            last_updated_time: None,
        }
    }
}

impl ToolchainClusterStatus {
    pub fn condition(&self, type_: ConditionType) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }

    pub fn is_ready(&self) -> bool {
        self.condition(ConditionType::Ready)
            .map(|c| c.status == ConditionStatus::True)
            .unwrap_or(false)
    }
}

impl ToolchainCluster {
    pub fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or(&[])
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels().get(key).map(String::as_str)
    }

    pub fn tls_verification_disabled(&self) -> bool {
        self.spec
            .disabled_tls_validations
            .as_ref()
            .map(|v| v.iter().any(|x| x == "*"))
            .unwrap_or(false)
    }
}
