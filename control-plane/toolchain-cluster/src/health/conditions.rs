use chrono::{DateTime, Utc};

use crate::crd::{Condition, ConditionStatus, ConditionType};

pub const REASON_CLUSTER_READY: &str = "ClusterReady";
pub const REASON_CLUSTER_NOT_READY: &str = "ClusterNotReady";
pub const REASON_CLUSTER_NOT_REACHABLE: &str = "ClusterNotReachable";
pub const REASON_CLUSTER_REACHABLE: &str = "ClusterReachable";

pub const MSG_HEALTHZ_OK: &str = "/healthz responded with ok";
pub const MSG_HEALTHZ_NOT_OK: &str = "/healthz responded without ok";
pub const MSG_NOT_REACHABLE: &str = "cluster is not reachable";
pub const MSG_REACHABLE: &str = "cluster is reachable";

pub fn ready() -> Condition {
    Condition::new(
        ConditionType::Ready,
        ConditionStatus::True,
        REASON_CLUSTER_READY,
        MSG_HEALTHZ_OK,
    )
}

pub fn not_ready() -> Condition {
    Condition::new(
        ConditionType::Ready,
        ConditionStatus::False,
        REASON_CLUSTER_NOT_READY,
        MSG_HEALTHZ_NOT_OK,
    )
}

pub fn offline() -> Condition {
    Condition::new(
        ConditionType::Offline,
        ConditionStatus::True,
        REASON_CLUSTER_NOT_REACHABLE,
        MSG_NOT_REACHABLE,
    )
}

pub fn reachable() -> Condition {
    Condition::new(
        ConditionType::Offline,
        ConditionStatus::False,
        REASON_CLUSTER_REACHABLE,
        MSG_REACHABLE,
    )
}

/// Merge `incoming` into `existing` by condition type.
///
/// A condition whose type already exists with the same status keeps its
/// `last_transition_time`; any other incoming condition transitions at
/// `now`. `last_updated_time` is always `now`. Types absent from
/// `incoming` are carried over unchanged, so a single-axis probe result
/// does not clear the other axis.
pub fn merge_conditions(
    existing: &[Condition],
    incoming: Vec<Condition>,
    now: DateTime<Utc>,
) -> Vec<Condition> {
    let now = now.to_rfc3339();
    let mut out: Vec<Condition> = existing.to_vec();
    for mut inc in incoming {
        inc.last_updated_time = Some(now.clone());
        match out.iter().position(|c| c.type_ == inc.type_) {
            Some(idx) => {
                inc.last_transition_time = if out[idx].status == inc.status {
                    out[idx]
                        .last_transition_time
                        .clone()
                        .or_else(|| Some(now.clone()))
                } else {
                    Some(now.clone())
                };
                out[idx] = inc;
            }
            None => {
                inc.last_transition_time = Some(now.clone());
                out.push(inc);
            }
        }
    }
    out
}
