//! Remote cluster health: probe, condition merge and the per-cluster
//! reconciliation pass.

pub mod conditions;
mod probe;
mod reconcile;

pub use conditions::merge_conditions;
pub use probe::{HEALTHZ_PATH, HealthProbe, classify};
pub use reconcile::{HealthReconciler, Outcome};
