use kube::Client;
use tracing::{debug, warn};

use super::conditions;
use crate::crd::Condition;

/// Liveness path served by every Kubernetes API server.
pub const HEALTHZ_PATH: &str = "/healthz";

/// Single-shot liveness check against a remote API server.
#[derive(Clone, Debug)]
pub struct HealthProbe {
    path: String,
}

impl Default for HealthProbe {
    fn default() -> Self {
        Self {
            path: HEALTHZ_PATH.to_string(),
        }
    }
}

impl HealthProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue one GET against the liveness path and classify the outcome.
    /// Transport failures and non-success statuses mean unreachable.
    pub async fn check(&self, client: &Client) -> Vec<Condition> {
        let request = match http::Request::get(self.path.as_str())
            .body(Vec::new())
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, path = %self.path, "cannot build liveness request");
                return classify(None);
            }
        };
        match client.request_text(request).await {
            Ok(body) => classify(Some(&body)),
            Err(e) => {
                debug!(error = %e, "liveness request failed");
                classify(None)
            }
        }
    }
}

/// `None` is a failed request; `Some(body)` is a successful response.
pub fn classify(body: Option<&str>) -> Vec<Condition> {
    match body {
        None => vec![conditions::offline()],
        Some(b) if b.eq_ignore_ascii_case("ok") => vec![conditions::ready()],
        Some(_) => vec![conditions::not_ready(), conditions::reachable()],
    }
}
