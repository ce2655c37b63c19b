//! Fetch strategies.
//!
//! Three strategies read and write through a partition:
//!
//! - **cache-first**: answer from cache; fetch and store only on a miss.
//! - **network-first**: fetch under a deadline; fall back to cache on failure.
//! - **stale-while-revalidate**: answer from cache and refresh it in a
//!   detached task; await the network only on a miss.
//!
//! Every cacheable network response (2xx, or opaque) of a GET request is
//! written and the partition trimmed before the strategy returns it, unless
//! the version owning the partition has been superseded.

mod cache_first;
mod network_first;
mod stale_while_revalidate;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use shellcache_core::config::StrategyKind;
use shellcache_core::{MatchMode, Partition, Request, Response};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::fetch::{FetchError, Network};
use crate::lifecycle::LifecycleState;

/// Background refresh started by stale-while-revalidate.
///
/// Resolves after the refreshed response, if cacheable, has been stored.
pub type Revalidation = JoinHandle<Result<Response, FetchError>>;

/// Closes once the version that owns a partition is superseded.
#[derive(Debug, Clone)]
pub struct WriteGate(watch::Receiver<LifecycleState>);

impl WriteGate {
    pub fn new(state: watch::Receiver<LifecycleState>) -> Self {
        Self(state)
    }

    pub fn is_open(&self) -> bool {
        *self.0.borrow() != LifecycleState::Superseded
    }
}

/// Per-call strategy parameters.
#[derive(Debug, Clone)]
pub struct StrategyOptions {
    /// Trim bound applied after every write.
    pub max_entries: Option<usize>,
    /// Network deadline for network-first.
    pub timeout: Duration,
    /// Whether fallback lookups may ignore the query string.
    pub ignore_search: bool,
    /// Read-only partition consulted when the route partition misses.
    pub precache: Option<Partition>,
    /// Writes are dropped once this gate closes.
    pub gate: Option<WriteGate>,
}

impl Default for StrategyOptions {
    fn default() -> Self {
        Self { max_entries: None, timeout: Duration::from_millis(3_000), ignore_search: false, precache: None, gate: None }
    }
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ServedFrom {
    Cache,
    Network,
}

/// Result of running a strategy.
#[derive(Debug)]
pub struct Served {
    pub response: Response,
    pub from: ServedFrom,
    /// Pending background refresh; dropping it detaches the task.
    pub revalidation: Option<Revalidation>,
}

impl Served {
    fn cache(response: Response) -> Self {
        Self { response, from: ServedFrom::Cache, revalidation: None }
    }

    fn network(response: Response) -> Self {
        Self { response, from: ServedFrom::Network, revalidation: None }
    }
}

/// Runs strategies against a network collaborator.
#[derive(Clone)]
pub struct StrategyEngine {
    network: Arc<dyn Network>,
}

impl StrategyEngine {
    pub fn new(network: Arc<dyn Network>) -> Self {
        Self { network }
    }

    pub fn network(&self) -> &Arc<dyn Network> {
        &self.network
    }

    /// Run the strategy of the given kind.
    pub async fn run(
        &self, kind: StrategyKind, request: &Request, partition: &Partition, options: &StrategyOptions,
    ) -> Result<Served, FetchError> {
        match kind {
            StrategyKind::CacheFirst => self.cache_first(request, partition, options).await,
            StrategyKind::NetworkFirst => self.network_first(request, partition, options).await,
            StrategyKind::StaleWhileRevalidate => self.stale_while_revalidate(request, partition, options).await,
        }
    }

    /// Look up a request in the route partition, then in the precache partition.
    ///
    /// Store errors are logged and treated as a miss.
    async fn lookup(
        &self, request: &Request, partition: &Partition, options: &StrategyOptions, mode: MatchMode,
    ) -> Option<Response> {
        for part in std::iter::once(partition).chain(options.precache.as_ref()) {
            match part.get(request, mode).await {
                Ok(Some(response)) => return Some(response),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(partition = part.name(), url = %request.url, "cache read failed: {e}");
                }
            }
        }
        None
    }

    /// Exact lookup, then a query-insensitive one when the route allows it.
    async fn fallback_lookup(
        &self, request: &Request, partition: &Partition, options: &StrategyOptions,
    ) -> Option<Response> {
        if let Some(hit) = self.lookup(request, partition, options, MatchMode::Exact).await {
            return Some(hit);
        }
        if options.ignore_search {
            return self.lookup(request, partition, options, MatchMode::IgnoreSearch).await;
        }
        None
    }
}

/// Store a network response if the strategy may cache it, then trim.
///
/// Returns whether the response was written. Store failures are logged and
/// never surface to the caller.
///
/// A write that lands after the gate closed removes the partition again:
/// the gate closes before the new version lists partitions for cleanup, so
/// either that cleanup sees the write or this check sees the closed gate.
pub(crate) async fn persist(
    request: &Request, response: &Response, partition: &Partition, options: &StrategyOptions,
) -> bool {
    if !request.is_get() || !response.is_cacheable() {
        return false;
    }

    let closed = || options.gate.as_ref().is_some_and(|gate| !gate.is_open());
    if closed() {
        tracing::debug!(partition = partition.name(), url = %request.url, "version superseded, not caching");
        return false;
    }

    if let Err(e) = partition.put(request, response).await {
        tracing::warn!(partition = partition.name(), url = %request.url, "cache write failed: {e}");
        return false;
    }

    if closed() {
        tracing::debug!(partition = partition.name(), "version superseded during write, dropping partition");
        if let Err(e) = partition.discard().await {
            tracing::warn!(partition = partition.name(), "failed to drop superseded partition: {e}");
        }
        return false;
    }

    if let Some(max) = options.max_entries
        && let Err(e) = partition.trim(max).await
    {
        tracing::warn!(partition = partition.name(), max_entries = max, "trim failed: {e}");
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedNetwork, ok, url};
    use shellcache_core::{CacheDb, ResponseType};

    #[tokio::test]
    async fn test_persist_skips_non_get() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let part = db.partition("shell:v1:api").unwrap();
        let post = Request::new("POST", url("https://app.test/api/items"));

        assert!(!persist(&post, &ok("https://app.test/api/items", "x"), &part, &StrategyOptions::default()).await);
        assert_eq!(part.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_persist_skips_uncacheable() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let part = db.partition("shell:v1:pages").unwrap();
        let req = Request::get(url("https://app.test/missing"));
        let not_found = Response::new(url("https://app.test/missing"), 404, ResponseType::Basic, "");

        assert!(!persist(&req, &not_found, &part, &StrategyOptions::default()).await);
        assert_eq!(part.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_persist_stores_opaque() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let part = db.partition("shell:v1:cdn").unwrap();
        let req = Request::get(url("https://unpkg.com/lib.js"));
        let opaque = Response::new(url("https://unpkg.com/lib.js"), 0, ResponseType::Opaque, "lib");

        let options = StrategyOptions { max_entries: Some(5), ..Default::default() };
        assert!(persist(&req, &opaque, &part, &options).await);
        assert_eq!(part.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_persist_respects_write_gate() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let part = db.partition("shell:v1:assets").unwrap();
        let req = Request::get(url("https://app.test/app.js"));
        let (state, rx) = watch::channel(LifecycleState::Active);
        let options = StrategyOptions { gate: Some(WriteGate::new(rx)), ..Default::default() };

        assert!(persist(&req, &ok("https://app.test/app.js", "js"), &part, &options).await);

        state.send_replace(LifecycleState::Superseded);
        let other = Request::get(url("https://app.test/other.js"));
        assert!(!persist(&other, &ok("https://app.test/other.js", "js"), &part, &options).await);
        assert_eq!(part.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_run_dispatches_by_kind() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let part = db.partition("shell:v1:assets").unwrap();
        let network = Arc::new(ScriptedNetwork::new());
        network.respond_ok("https://app.test/app.js", "fresh");
        let engine = StrategyEngine::new(network.clone());
        let req = Request::get(url("https://app.test/app.js"));
        part.put(&req, &ok("https://app.test/app.js", "stored")).await.unwrap();

        let served = engine.run(StrategyKind::CacheFirst, &req, &part, &StrategyOptions::default()).await.unwrap();
        assert_eq!(served.from, ServedFrom::Cache);

        let served = engine.run(StrategyKind::NetworkFirst, &req, &part, &StrategyOptions::default()).await.unwrap();
        assert_eq!(served.from, ServedFrom::Network);
        assert_eq!(served.response.body, bytes::Bytes::from("fresh"));
    }

    #[tokio::test]
    async fn test_lookup_consults_precache_partition() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let shell = db.partition("shell:v1:shell").unwrap();
        let images = db.partition("shell:v1:images").unwrap();
        let req = Request::get(url("https://app.test/icon-192.png"));
        shell.put(&req, &ok("https://app.test/icon-192.png", "icon")).await.unwrap();

        let engine = StrategyEngine::new(Arc::new(ScriptedNetwork::new()));
        let options = StrategyOptions { precache: Some(shell), ..Default::default() };
        let hit = engine.lookup(&req, &images, &options, MatchMode::Exact).await;
        assert_eq!(hit.map(|r| r.body), Some(bytes::Bytes::from("icon")));
    }
}
