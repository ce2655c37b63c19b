//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use std::collections::HashSet;

use crate::cache::{PartitionNaming, SHELL_PARTITION, VersionToken};
use crate::config::{AppConfig, MatcherConfig, StrategyKind};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

const MIN_TIMEOUT_MS: u64 = 100;
const MAX_TIMEOUT_MS: u64 = 300_000;

fn check_timeout(field: &str, value: u64) -> Result<(), ConfigError> {
    if value < MIN_TIMEOUT_MS {
        return Err(ConfigError::Invalid { field: field.into(), reason: "must be at least 100ms".into() });
    }
    if value > MAX_TIMEOUT_MS {
        return Err(ConfigError::Invalid {
            field: field.into(),
            reason: "must not exceed 5 minutes (300000ms)".into(),
        });
    }
    Ok(())
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `version` or `partition_prefix` is not a valid name segment
    /// - `origin` or any precache entry does not resolve to an http(s) URL
    /// - any timeout is less than 100ms or exceeds 5 minutes
    /// - a route has an empty or duplicate name, an empty partition,
    ///   `max_entries == 0`, or a matcher with an empty value
    ///
    /// Returns `ConfigError::Missing` if the route table is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let version = VersionToken::new(self.version.clone())
            .map_err(|e| ConfigError::Invalid { field: "version".into(), reason: e.to_string() })?;
        PartitionNaming::new(self.partition_prefix.clone(), version)
            .map_err(|e| ConfigError::Invalid { field: "partition_prefix".into(), reason: e.to_string() })?;

        self.origin_url()?;
        for entry in &self.precache {
            self.resolve(entry)?;
        }

        check_timeout("timeout_ms", self.timeout_ms)?;
        check_timeout("network_first_timeout_ms", self.network_first_timeout_ms)?;

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.routes.is_empty() {
            return Err(ConfigError::Missing {
                field: "routes".into(),
                hint: "declare at least one [[routes]] table".into(),
            });
        }

        let mut names = HashSet::new();
        for route in &self.routes {
            let field = format!("routes.{}", route.name);
            if route.name.trim().is_empty() {
                return Err(ConfigError::Invalid { field: "routes.name".into(), reason: "must not be empty".into() });
            }
            if !names.insert(route.name.as_str()) {
                return Err(ConfigError::Invalid { field, reason: "duplicate route name".into() });
            }
            if route.partition.trim().is_empty() {
                return Err(ConfigError::Invalid { field, reason: "partition must not be empty".into() });
            }
            if route.partition == SHELL_PARTITION {
                return Err(ConfigError::Invalid { field, reason: "partition name 'shell' is reserved".into() });
            }
            if route.max_entries == Some(0) {
                return Err(ConfigError::Invalid { field, reason: "max_entries must be greater than 0".into() });
            }
            if let Some(timeout) = route.timeout_ms {
                check_timeout(&format!("{field}.timeout_ms"), timeout)?;
                if route.strategy != StrategyKind::NetworkFirst {
                    tracing::warn!(route = %route.name, "timeout_ms only applies to network-first routes");
                }
            }
            if let Some(fallback) = &route.fallback {
                self.resolve(fallback)?;
            }
            let empty_matcher = route.matchers.iter().any(|m| match m {
                MatcherConfig::Navigate => false,
                MatcherConfig::AcceptContains(v)
                | MatcherConfig::PathSuffix(v)
                | MatcherConfig::PathPrefix(v)
                | MatcherConfig::PathEquals(v)
                | MatcherConfig::PathPattern(v) => v.is_empty(),
            });
            if empty_matcher {
                return Err(ConfigError::Invalid { field, reason: "matcher values must not be empty".into() });
            }
            if route.hosts.iter().any(|h| h.trim().is_empty()) {
                return Err(ConfigError::Invalid { field, reason: "hosts must not contain empty entries".into() });
            }
        }

        Ok(())
    }
}
