use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::future::BoxFuture;
use kube::Client;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::crd::ToolchainClusterStatus;
use crate::registration::RestConfig;

/// Authenticated handle to one remote cluster plus the status it was
/// registered with. Stored behind an `Arc` and never mutated once cached.
#[derive(Clone)]
pub struct ClusterConnection {
    pub name: String,
    pub operator_namespace: String,
    pub owner_cluster_name: String,
    pub api_endpoint: String,
    /// Secret the bearer token was read from
    pub secret_name: String,
    pub rest_config: RestConfig,
    pub client: Client,
    pub status: ToolchainClusterStatus,
}

impl ClusterConnection {
    pub fn is_ready(&self) -> bool {
        self.status.is_ready()
    }
}

impl fmt::Debug for ClusterConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterConnection")
            .field("name", &self.name)
            .field("operator_namespace", &self.operator_namespace)
            .field("owner_cluster_name", &self.owner_cluster_name)
            .field("api_endpoint", &self.api_endpoint)
            .field("secret_name", &self.secret_name)
            .field("rest_config", &self.rest_config)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Predicate applied by [`ConnectionCache::list`].
pub type ClusterFilter = Box<dyn Fn(&ClusterConnection) -> bool + Send + Sync>;

/// Invoked on a cache miss so the caller can repopulate the cache.
pub type RefreshHook = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Cluster has a `Ready=True` condition.
pub fn ready() -> ClusterFilter {
    Box::new(|c| c.is_ready())
}

/// Cluster was registered by `owner`.
pub fn owned_by(owner: impl Into<String>) -> ClusterFilter {
    let owner = owner.into();
    Box::new(move |c| c.owner_cluster_name == owner)
}

#[derive(Default)]
struct Inner {
    clusters: RwLock<HashMap<String, Arc<ClusterConnection>>>,
    refresh: RwLock<Option<RefreshHook>>,
    /// Held while the hook runs; one refresh at a time.
    refreshing: Mutex<()>,
    /// Completed refreshes.
    refreshes: AtomicU64,
}

/// Registry of live cluster connections keyed by cluster name. Cloning is
/// cheap and every clone shares the same map.
#[derive(Clone, Default)]
pub struct ConnectionCache(Arc<Inner>);

impl ConnectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the refresh-on-miss callback. Without one a miss is a miss.
    ///
    /// The hook must not call [`get`](Self::get) with `allow_refresh` or
    /// [`list`](Self::list) on an empty cache.
    pub async fn set_refresh_hook(&self, hook: RefreshHook) {
        *self.0.refresh.write().await = Some(hook);
    }

    /// Insert or overwrite the entry for `connection.name`.
    pub async fn add(&self, connection: ClusterConnection) {
        let name = connection.name.clone();
        let mut w = self.0.clusters.write().await;
        w.insert(name.clone(), Arc::new(connection));
        trace!(cluster = %name, "cache: upserted");
    }

    pub async fn delete(&self, name: &str) {
        let mut w = self.0.clusters.write().await;
        if w.remove(name).is_some() {
            trace!(cluster = %name, "cache: removed");
        }
    }

    /// Look up `name`. On a miss with `allow_refresh`, the refresh hook runs
    /// once and the map is checked a second time.
    pub async fn get(
        &self,
        name: &str,
        allow_refresh: bool,
    ) -> Option<Arc<ClusterConnection>> {
        if let Some(found) = self.lookup(name).await {
            return Some(found);
        }
        if !allow_refresh {
            return None;
        }
        debug!(cluster = %name, "cache miss; refreshing");
        self.refresh().await;
        self.lookup(name).await
    }

    /// All entries satisfying every filter. An empty cache is refreshed once
    /// before collecting.
    pub async fn list(
        &self,
        filters: &[ClusterFilter],
    ) -> Vec<Arc<ClusterConnection>> {
        if self.is_empty().await {
            debug!("cache empty; refreshing before list");
            self.refresh().await;
        }
        let r = self.0.clusters.read().await;
        r.values()
            .filter(|c| {
                let c: &ClusterConnection = c;
                filters.iter().all(|f| f(c))
            })
            .cloned()
            .collect()
    }

    pub async fn ready_clusters(&self) -> Vec<Arc<ClusterConnection>> {
        self.list(&[ready()]).await
    }

    pub async fn len(&self) -> usize {
        self.0.clusters.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.0.clusters.read().await.is_empty()
    }

    /// Drop every entry. The refresh hook is kept.
    pub async fn reset(&self) {
        self.0.clusters.write().await.clear();
    }

    async fn lookup(&self, name: &str) -> Option<Arc<ClusterConnection>> {
        self.0.clusters.read().await.get(name).cloned()
    }

    /// Run the hook unless another caller finished a refresh while this
    /// one waited for its turn; that result is used instead.
    async fn refresh(&self) {
        let seen = self.0.refreshes.load(Ordering::Acquire);
        let _turn = self.0.refreshing.lock().await;
        if self.0.refreshes.load(Ordering::Acquire) != seen {
            trace!("refresh already done by a concurrent caller");
            return;
        }
        // Clone out so the map and hook locks are free while it runs; the
        // hook usually calls back into `add`.
        let hook = self.0.refresh.read().await.clone();
        if let Some(hook) = hook {
            hook().await;
        }
        self.0.refreshes.fetch_add(1, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{Condition, ConditionStatus, ConditionType};
    use crate::testing::client_for;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn conn(name: &str, ready: Option<bool>) -> ClusterConnection {
        let endpoint = format!("http://{name}.example:6443");
        let conditions = ready
            .map(|r| {
                vec![Condition::new(
                    ConditionType::Ready,
                    if r {
                        ConditionStatus::True
                    } else {
                        ConditionStatus::False
                    },
                    "test",
                    "test",
                )]
            })
            .unwrap_or_default();
        ClusterConnection {
            name: name.into(),
            operator_namespace: "toolchain-member-operator".into(),
            owner_cluster_name: "host".into(),
            api_endpoint: endpoint.clone(),
            secret_name: format!("{name}-sa"),
            rest_config: RestConfig {
                host: endpoint.clone(),
                insecure: true,
                ca_data: None,
                bearer_token: "t0k3n".into(),
            },
            client: client_for(&endpoint),
            status: ToolchainClusterStatus { conditions },
        }
    }

    fn names(list: &[Arc<ClusterConnection>]) -> Vec<String> {
        let mut out: Vec<String> = list.iter().map(|c| c.name.clone()).collect();
        out.sort();
        out
    }

    fn counting_hook(counter: Arc<AtomicUsize>) -> RefreshHook {
        Arc::new(move || {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    #[tokio::test]
    async fn add_overwrites_whole_entry() {
        let cache = ConnectionCache::new();
        cache.add(conn("member-1", Some(true))).await;

        let mut second = conn("member-1", None);
        second.api_endpoint = "https://elsewhere:6443".into();
        second.operator_namespace = "other-ns".into();
        cache.add(second).await;

        let got = cache.get("member-1", false).await.unwrap();
        assert_eq!(got.api_endpoint, "https://elsewhere:6443");
        assert_eq!(got.operator_namespace, "other-ns");
        assert!(got.status.conditions.is_empty());
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn delete_missing_is_noop() {
        let cache = ConnectionCache::new();
        cache.delete("ghost").await;
        cache.add(conn("member-1", None)).await;
        cache.delete("ghost").await;
        assert_eq!(cache.len().await, 1);
        cache.delete("member-1").await;
        cache.delete("member-1").await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn ready_filter_keeps_only_ready() {
        let cache = ConnectionCache::new();
        cache.add(conn("a", Some(true))).await;
        cache.add(conn("b", Some(false))).await;
        cache.add(conn("c", Some(true))).await;
        cache.add(conn("d", None)).await;

        assert_eq!(names(&cache.list(&[ready()]).await), vec!["a", "c"]);
        assert_eq!(names(&cache.ready_clusters().await), vec!["a", "c"]);
        assert_eq!(cache.list(&[]).await.len(), 4);
    }

    #[tokio::test]
    async fn filters_combine_with_and() {
        let cache = ConnectionCache::new();
        let mut foreign = conn("x", Some(true));
        foreign.owner_cluster_name = "other-host".into();
        cache.add(foreign).await;
        cache.add(conn("a", Some(true))).await;
        cache.add(conn("b", Some(false))).await;

        let got = cache.list(&[ready(), owned_by("host")]).await;
        assert_eq!(names(&got), vec!["a"]);
    }

    #[tokio::test]
    async fn get_without_refresh_skips_hook() {
        let cache = ConnectionCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        cache.set_refresh_hook(counting_hook(calls.clone())).await;

        assert!(cache.get("member-1", false).await.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert!(cache.get("member-1", true).await.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn get_with_refresh_rechecks_after_hook() {
        let cache = ConnectionCache::new();
        let target = cache.clone();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        cache
            .set_refresh_hook(Arc::new(move || {
                let target = target.clone();
                let counter = counter.clone();
                Box::pin(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    target.add(conn("member-1", Some(true))).await;
                })
            }))
            .await;

        let got = cache.get("member-1", true).await;
        assert_eq!(got.map(|c| c.name.clone()).as_deref(), Some("member-1"));
        // Hit now; the hook must not run again
        assert!(cache.get("member-1", true).await.is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn list_refreshes_only_when_empty() {
        let cache = ConnectionCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        cache.set_refresh_hook(counting_hook(calls.clone())).await;

        assert!(cache.list(&[]).await.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.add(conn("a", None)).await;
        assert_eq!(cache.list(&[]).await.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_misses_share_one_refresh() {
        let cache = ConnectionCache::new();
        let target = cache.clone();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        cache
            .set_refresh_hook(Arc::new(move || {
                let target = target.clone();
                let counter = counter.clone();
                Box::pin(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    target.add(conn("member-1", Some(true))).await;
                })
            }))
            .await;

        let mut tasks = Vec::new();
        for i in 0..16 {
            let cache = cache.clone();
            tasks.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    cache.get("member-1", true).await.is_some()
                } else {
                    !cache.list(&[]).await.is_empty()
                }
            }));
        }
        for t in tasks {
            assert!(t.await.unwrap());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn later_miss_refreshes_again() {
        let cache = ConnectionCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        cache.set_refresh_hook(counting_hook(calls.clone())).await;

        assert!(cache.get("member-1", true).await.is_none());
        assert!(cache.get("member-1", true).await.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn reset_clears_entries() {
        let cache = ConnectionCache::new();
        cache.add(conn("a", None)).await;
        cache.add(conn("b", None)).await;
        cache.reset().await;
        assert!(cache.is_empty().await);
        assert!(cache.get("a", false).await.is_none());
    }
}
