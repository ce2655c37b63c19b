//! Request router.
//!
//! Classifies each inbound request and runs the bound strategy against the
//! route's partition. Unclassified requests go straight to the network and
//! are never stored. When a strategy fails, the route's fallback URL is
//! looked up in the shell partition and then the route partition; with no
//! fallback the caller gets an explicit offline response.

use std::sync::Arc;

use serde::Serialize;
use shellcache_core::{CacheDb, Error, MatchMode, Partition, PartitionNaming, Request, Response};
use url::Url;

use crate::classify::{Classifier, RouteClass};
use crate::fetch::{FetchOptions, Network};
use crate::strategy::{Revalidation, ServedFrom, StrategyEngine, StrategyOptions, WriteGate};

/// How a request was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Cache,
    Network,
    Fallback,
    PassThrough,
    Offline,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Network => "network",
            Self::Fallback => "fallback",
            Self::PassThrough => "pass_through",
            Self::Offline => "offline",
        }
    }
}

impl From<ServedFrom> for Source {
    fn from(from: ServedFrom) -> Self {
        match from {
            ServedFrom::Cache => Self::Cache,
            ServedFrom::Network => Self::Network,
        }
    }
}

/// A routed response.
#[derive(Debug)]
pub struct Handled {
    pub response: Response,
    /// Name of the matched route class, if any.
    pub route: Option<String>,
    pub source: Source,
    pub revalidation: Option<Revalidation>,
}

impl Handled {
    fn new(response: Response, route: Option<String>, source: Source) -> Self {
        Self { response, route, source, revalidation: None }
    }
}

/// Routes requests for one deployment version.
#[derive(Clone)]
pub struct Router {
    classifier: Arc<Classifier>,
    engine: StrategyEngine,
    naming: PartitionNaming,
    db: CacheDb,
    gate: Option<WriteGate>,
}

impl Router {
    pub fn new(classifier: Arc<Classifier>, engine: StrategyEngine, naming: PartitionNaming, db: CacheDb) -> Self {
        Self { classifier, engine, naming, db, gate: None }
    }

    /// Stop caching once `gate` closes.
    pub fn with_gate(mut self, gate: WriteGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn naming(&self) -> &PartitionNaming {
        &self.naming
    }

    /// Partition backing a route class for this version.
    pub fn partition_for(&self, route: &RouteClass) -> Result<Partition, Error> {
        self.db.partition(self.naming.name(&route.partition))
    }

    /// Partition holding this version's precached resources.
    pub fn shell(&self) -> Result<Partition, Error> {
        self.db.partition(self.naming.shell())
    }

    /// Answer a request. Never fails; failures become error responses.
    pub async fn handle(&self, request: &Request) -> Handled {
        let Some(route) = self.classifier.classify(request) else {
            return self.pass_through(request).await;
        };

        let (partition, shell) = match (self.partition_for(route), self.shell()) {
            (Ok(partition), Ok(shell)) => (partition, shell),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(route = %route.name, "partition unavailable, passing through: {e}");
                return self.pass_through(request).await;
            }
        };

        let options = StrategyOptions {
            max_entries: route.max_entries,
            timeout: route.timeout,
            ignore_search: route.ignore_search,
            precache: Some(shell.clone()),
            gate: self.gate.clone(),
        };

        match self.engine.run(route.strategy, request, &partition, &options).await {
            Ok(served) => Handled {
                response: served.response,
                route: Some(route.name.clone()),
                source: served.from.into(),
                revalidation: served.revalidation,
            },
            Err(err) => {
                tracing::debug!(route = %route.name, url = %request.url, "strategy failed: {err}");

                if let Some(fallback) = &route.fallback
                    && let Some(response) = self.fallback(fallback, &[&shell, &partition]).await
                {
                    return Handled::new(response, Some(route.name.clone()), Source::Fallback);
                }

                Handled::new(Response::error(request.url.clone()), Some(route.name.clone()), Source::Offline)
            }
        }
    }

    async fn pass_through(&self, request: &Request) -> Handled {
        pass_through(self.engine.network().as_ref(), request).await
    }

    async fn fallback(&self, url: &Url, partitions: &[&Partition]) -> Option<Response> {
        let request = Request::get(url.clone());
        for partition in partitions {
            match partition.get(&request, MatchMode::Exact).await {
                Ok(Some(response)) => return Some(response),
                Ok(None) => {}
                Err(e) => tracing::warn!(partition = partition.name(), url = %url, "fallback read failed: {e}"),
            }
        }
        None
    }
}

/// Forward a request to the network without touching the cache.
pub(crate) async fn pass_through(network: &dyn Network, request: &Request) -> Handled {
    match network.fetch(request, &FetchOptions::default()).await {
        Ok(response) => Handled::new(response, None, Source::PassThrough),
        Err(err) => {
            tracing::debug!(url = %request.url, method = %request.method, "pass-through failed: {err}");
            Handled::new(Response::error(request.url.clone()), None, Source::PassThrough)
        }
    }
}
