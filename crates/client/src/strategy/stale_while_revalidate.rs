use shellcache_core::{MatchMode, Partition, Request};

use super::{Revalidation, Served, StrategyEngine, StrategyOptions, persist};
use crate::fetch::{FetchError, FetchOptions};

impl StrategyEngine {
    /// Serve the cached entry at once while a detached task refreshes it.
    ///
    /// On a miss the refresh is awaited; if it fails the query-insensitive
    /// lookup (when allowed) is the last resort.
    pub async fn stale_while_revalidate(
        &self, request: &Request, partition: &Partition, options: &StrategyOptions,
    ) -> Result<Served, FetchError> {
        let revalidation = self.revalidate(request, partition, options);

        if let Some(cached) = self.lookup(request, partition, options, MatchMode::Exact).await {
            tracing::debug!(partition = partition.name(), url = %request.url, "serving stale while revalidating");
            return Ok(Served { revalidation: Some(revalidation), ..Served::cache(cached) });
        }

        let err = match revalidation.await {
            Ok(Ok(response)) => return Ok(Served::network(response)),
            Ok(Err(err)) => err,
            Err(join_err) => FetchError::Unreachable(format!("revalidation task failed: {join_err}")),
        };

        if options.ignore_search
            && let Some(cached) = self.lookup(request, partition, options, MatchMode::IgnoreSearch).await
        {
            return Ok(Served::cache(cached));
        }

        Err(err)
    }

    /// Spawn the background fetch-and-store job.
    fn revalidate(&self, request: &Request, partition: &Partition, options: &StrategyOptions) -> Revalidation {
        let network = self.network.clone();
        let request = request.clone();
        let partition = partition.clone();
        let options = StrategyOptions { precache: None, ..options.clone() };

        tokio::spawn(async move {
            match network.fetch(&request, &FetchOptions::default()).await {
                Ok(response) => {
                    persist(&request, &response, &partition, &options).await;
                    Ok(response)
                }
                Err(err) => {
                    tracing::debug!(partition = partition.name(), url = %request.url, "revalidation failed: {err}");
                    Err(err)
                }
            }
        })
    }
}
