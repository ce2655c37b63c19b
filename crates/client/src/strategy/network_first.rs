use shellcache_core::{Partition, Request};

use super::{Served, StrategyEngine, StrategyOptions, persist};
use crate::fetch::{FetchError, FetchOptions};

impl StrategyEngine {
    /// Fetch under `options.timeout`; on failure or timeout serve from cache.
    ///
    /// The in-flight fetch is dropped, and thereby cancelled, once the
    /// deadline elapses.
    pub async fn network_first(
        &self, request: &Request, partition: &Partition, options: &StrategyOptions,
    ) -> Result<Served, FetchError> {
        let fetch_options = FetchOptions { timeout: Some(options.timeout), cache_defeat: true };
        let outcome = match tokio::time::timeout(options.timeout, self.network.fetch(request, &fetch_options)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout { after_ms: options.timeout.as_millis() as u64 }),
        };

        let err = match outcome {
            Ok(response) => {
                persist(request, &response, partition, options).await;
                return Ok(Served::network(response));
            }
            Err(err) => err,
        };

        tracing::debug!(partition = partition.name(), url = %request.url, "network-first falling back to cache: {err}");

        match self.fallback_lookup(request, partition, options).await {
            Some(cached) => Ok(Served::cache(cached)),
            None => Err(err),
        }
    }
}
