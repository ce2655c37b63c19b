//! Request-side engine for shellcache.
//!
//! This crate provides the network collaborator, request classification,
//! the fetch strategies, the version lifecycle and the request router used
//! by the server.

pub mod classify;
pub mod fetch;
pub mod lifecycle;
pub mod router;
pub mod strategy;

#[cfg(test)]
mod testing;

pub use classify::{Classifier, RouteClass};
pub use fetch::{FetchError, FetchOptions, HttpNetwork, Network, NetworkConfig};
pub use lifecycle::{
    ActivationReport, ControlMessage, Controller, ControllerStatus, Deployment, DeploymentStatus, LifecycleState,
    MessageOutcome,
};
pub use router::{Handled, Router, Source};
pub use strategy::{Revalidation, Served, ServedFrom, StrategyEngine, StrategyOptions, WriteGate};
