//! SQLite-backed store of versioned cache partitions.
//!
//! This module provides persistent partitions of request/response entries
//! using SQLite with async access via tokio-rusqlite. It supports:
//!
//! - Exact and query-insensitive lookups
//! - Monotonic insertion order per partition
//! - Oldest-first trimming to a maximum entry count
//! - Version-tagged partition names for cutover cleanup

pub mod connection;
pub mod hash;
pub mod migrations;
pub mod naming;
pub mod partition;
pub mod trim;

pub use crate::Error;

pub use connection::CacheDb;
pub use hash::CacheKey;
pub use naming::{PartitionNaming, SHELL_PARTITION, VersionToken};
pub use partition::{MatchMode, Partition, StoredKey};
