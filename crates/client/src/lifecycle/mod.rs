//! Version lifecycle.
//!
//! A [`Deployment`] is one version of the cache configuration. It moves
//! through `Installing → Waiting → Active → Superseded`:
//!
//! - **install** fetches every precache URL with cache defeat and writes the
//!   shell partition only once all of them succeeded. A failed install
//!   leaves no shell partition behind and may be retried.
//! - **activate** deletes every partition not named for this version.
//! - **supersede** marks a version replaced by a newer one.
//!
//! The [`Controller`] holds the installing, waiting and active versions and
//! decides when a waiting version takes over.

pub mod controller;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use shellcache_core::{AppConfig, CacheDb, Error, PartitionNaming, Request, Response, VersionToken};
use tokio::sync::watch;
use tokio::task::JoinSet;
use url::Url;

use crate::classify::Classifier;
use crate::fetch::{FetchError, FetchOptions, Network};
use crate::router::Router;
use crate::strategy::{StrategyEngine, WriteGate};

pub use controller::{ControlMessage, Controller, ControllerStatus, DeploymentStatus, MessageOutcome};

/// Lifecycle state of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Installing,
    Waiting,
    Active,
    Superseded,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Installing => "installing",
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Superseded => "superseded",
        };
        f.write_str(s)
    }
}

/// Partitions removed when a version activated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct ActivationReport {
    pub deleted: Vec<String>,
    /// Partitions whose deletion failed; they are retried on the next activation.
    pub failed: Vec<String>,
}

/// One version of the cache configuration.
pub struct Deployment {
    naming: PartitionNaming,
    precache: Vec<Url>,
    router: Router,
    db: CacheDb,
    network: Arc<dyn Network>,
    state: watch::Sender<LifecycleState>,
}

impl fmt::Debug for Deployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deployment")
            .field("version", self.naming.version())
            .field("state", &self.state())
            .field("precache", &self.precache.len())
            .finish()
    }
}

impl Deployment {
    /// Build a deployment from configuration. Starts in `Installing`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPartitionName`] for a bad version or prefix
    /// and [`Error::InvalidConfig`] for unresolvable URLs or route patterns.
    pub fn new(config: &AppConfig, db: CacheDb, network: Arc<dyn Network>) -> Result<Self, Error> {
        let version = VersionToken::new(config.version.clone())?;
        let naming = PartitionNaming::new(config.partition_prefix.clone(), version)?;
        let precache = config
            .precache
            .iter()
            .map(|u| config.resolve(u))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        let classifier = Arc::new(Classifier::from_config(config)?);
        let (state, _) = watch::channel(LifecycleState::Installing);
        let router = Router::new(classifier, StrategyEngine::new(network.clone()), naming.clone(), db.clone())
            .with_gate(WriteGate::new(state.subscribe()));

        Ok(Self { naming, precache, router, db, network, state })
    }

    pub fn version(&self) -> &VersionToken {
        self.naming.version()
    }

    pub fn naming(&self) -> &PartitionNaming {
        &self.naming
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn precache_urls(&self) -> &[Url] {
        &self.precache
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Precache the shell and move to `Waiting`.
    ///
    /// Fetches run concurrently; the first failure aborts the rest.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PrecacheFailed`] naming the first URL that failed,
    /// or [`Error::InvalidInput`] when the deployment is past installing.
    pub async fn install(&self) -> Result<(), Error> {
        let state = self.state();
        if state != LifecycleState::Installing {
            return Err(Error::InvalidInput(format!("version {} cannot install while {state}", self.version())));
        }

        tracing::info!(version = %self.version(), resources = self.precache.len(), "installing");

        let fetched = match self.fetch_precache().await {
            Ok(fetched) => fetched,
            Err(err) => {
                self.discard_shell().await;
                tracing::warn!(version = %self.version(), "install failed: {err}");
                return Err(err);
            }
        };

        let shell = self.db.partition(self.naming.shell())?;
        for (request, response) in &fetched {
            if let Err(e) = shell.put(request, response).await {
                self.discard_shell().await;
                tracing::warn!(version = %self.version(), url = %request.url, "install write failed: {e}");
                return Err(Error::PrecacheFailed { url: request.url.to_string(), reason: e.to_string() });
            }
        }

        self.state.send_replace(LifecycleState::Waiting);
        tracing::info!(version = %self.version(), "installed");
        Ok(())
    }

    async fn fetch_precache(&self) -> Result<Vec<(Request, Response)>, Error> {
        let mut tasks = JoinSet::new();
        for url in &self.precache {
            let network = self.network.clone();
            let request = Request::get(url.clone());
            tasks.spawn(async move {
                let result = network.fetch(&request, &FetchOptions::cache_defeating()).await;
                (request, result)
            });
        }

        let mut fetched = Vec::with_capacity(self.precache.len());
        while let Some(joined) = tasks.join_next().await {
            let (request, result) = joined.map_err(|e| Error::PrecacheFailed {
                url: "(unknown)".into(),
                reason: format!("fetch task failed: {e}"),
            })?;
            match result {
                Ok(response) if response.is_ok() => fetched.push((request, response)),
                Ok(response) => {
                    return Err(Error::PrecacheFailed {
                        url: request.url.to_string(),
                        reason: format!("status {}", response.status),
                    });
                }
                Err(e) => return Err(precache_error(&request, e)),
            }
        }
        Ok(fetched)
    }

    async fn discard_shell(&self) {
        let name = self.naming.shell();
        if let Err(e) = self.db.delete_partition(&name).await {
            tracing::warn!(partition = %name, "failed to discard partial shell: {e}");
        }
    }

    /// Delete every partition of other versions and move to `Active`.
    ///
    /// Deletion failures are logged and reported, never fatal.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] unless the deployment is waiting or
    /// already active.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        let state = self.state();
        if !matches!(state, LifecycleState::Waiting | LifecycleState::Active) {
            return Err(Error::InvalidInput(format!("version {} cannot activate while {state}", self.version())));
        }

        let mut report = ActivationReport::default();
        let names = match self.db.partition_names().await {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!(version = %self.version(), "could not list partitions for cleanup: {e}");
                Vec::new()
            }
        };

        for name in names.into_iter().filter(|n| !self.naming.is_current(n)) {
            match self.db.delete_partition(&name).await {
                Ok(_) => report.deleted.push(name),
                Err(e) => {
                    tracing::warn!(partition = %name, "failed to delete stale partition: {e}");
                    report.failed.push(name);
                }
            }
        }

        self.state.send_replace(LifecycleState::Active);
        tracing::info!(version = %self.version(), deleted = report.deleted.len(), "activated");
        Ok(report)
    }

    pub fn supersede(&self) {
        self.state.send_replace(LifecycleState::Superseded);
        tracing::info!(version = %self.version(), "superseded");
    }
}

fn precache_error(request: &Request, err: FetchError) -> Error {
    Error::PrecacheFailed { url: request.url.to_string(), reason: err.to_string() }
}
