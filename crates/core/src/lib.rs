//! Core types and shared functionality for shellcache.
//!
//! This crate provides:
//! - Versioned cache partitions with a SQLite backend
//! - Oldest-first trimming
//! - Request/response model
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;

pub use cache::{CacheDb, MatchMode, Partition, PartitionNaming, VersionToken};
pub use config::AppConfig;
pub use error::Error;
pub use http::{Request, RequestMode, Response, ResponseType};
