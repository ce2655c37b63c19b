use shellcache_core::{MatchMode, Partition, Request};

use super::{Served, StrategyEngine, StrategyOptions, persist};
use crate::fetch::{FetchError, FetchOptions};

impl StrategyEngine {
    /// Serve from cache when present; otherwise fetch, store and return.
    ///
    /// A network failure on a miss is returned to the caller, which supplies
    /// the final fallback.
    pub async fn cache_first(
        &self, request: &Request, partition: &Partition, options: &StrategyOptions,
    ) -> Result<Served, FetchError> {
        if let Some(cached) = self.lookup(request, partition, options, MatchMode::Exact).await {
            tracing::debug!(partition = partition.name(), url = %request.url, "cache-first hit");
            return Ok(Served::cache(cached));
        }

        let response = self.network.fetch(request, &FetchOptions::default()).await?;
        persist(request, &response, partition, options).await;
        Ok(Served::network(response))
    }
}
