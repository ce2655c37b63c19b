//! Route table configuration.
//!
//! Routes are declared in order; the classifier checks them first to last and
//! the first match wins.

use serde::{Deserialize, Serialize};

/// Fetch strategy bound to a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CacheFirst => "cache-first",
            Self::NetworkFirst => "network-first",
            Self::StaleWhileRevalidate => "stale-while-revalidate",
        }
    }
}

/// A single request test. A route matches when any of its matchers does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MatcherConfig {
    /// Request mode is navigation.
    Navigate,
    /// Accept header contains the given media type.
    AcceptContains(String),
    PathSuffix(String),
    PathPrefix(String),
    PathEquals(String),
    /// Regular expression tested against the path.
    PathPattern(String),
}

/// One route class of the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub name: String,

    pub strategy: StrategyKind,

    /// Logical partition name, combined with prefix and version.
    pub partition: String,

    /// Entry bound enforced after each write. `None` leaves the partition unbounded.
    #[serde(default)]
    pub max_entries: Option<usize>,

    /// Network timeout for network-first routes. Falls back to the
    /// top-level `network_first_timeout_ms`.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Whether fallback lookups may ignore the query string.
    #[serde(default)]
    pub ignore_search: bool,

    /// URL (relative to the origin) served from cache when the strategy fails.
    #[serde(default)]
    pub fallback: Option<String>,

    /// Require (true) or forbid (false) the serving origin. `None` accepts both.
    #[serde(default)]
    pub same_origin: Option<bool>,

    /// Hostname allow-list; `*.example.com` matches subdomains.
    #[serde(default)]
    pub hosts: Vec<String>,

    #[serde(default)]
    pub matchers: Vec<MatcherConfig>,
}

/// Route table used when no configuration overrides it.
pub fn default_routes() -> Vec<RouteConfig> {
    vec![
        RouteConfig {
            name: "pages".into(),
            strategy: StrategyKind::NetworkFirst,
            partition: "pages".into(),
            max_entries: Some(50),
            timeout_ms: Some(3_000),
            ignore_search: true,
            fallback: Some("./index.html".into()),
            same_origin: Some(true),
            hosts: Vec::new(),
            matchers: vec![
                MatcherConfig::Navigate,
                MatcherConfig::AcceptContains("text/html".into()),
                MatcherConfig::PathSuffix(".html".into()),
                MatcherConfig::PathSuffix("/".into()),
            ],
        },
        RouteConfig {
            name: "api".into(),
            strategy: StrategyKind::NetworkFirst,
            partition: "api".into(),
            max_entries: Some(50),
            timeout_ms: Some(2_500),
            ignore_search: false,
            fallback: None,
            same_origin: Some(true),
            hosts: Vec::new(),
            matchers: vec![MatcherConfig::PathPrefix("/api/".into())],
        },
        RouteConfig {
            name: "images".into(),
            strategy: StrategyKind::CacheFirst,
            partition: "images".into(),
            max_entries: Some(60),
            timeout_ms: None,
            ignore_search: false,
            fallback: Some("./icon-192.png".into()),
            same_origin: Some(true),
            hosts: Vec::new(),
            matchers: vec![MatcherConfig::PathPattern(r"(?i)\.(png|jpe?g|gif|svg|webp|ico)$".into())],
        },
        RouteConfig {
            name: "cdn".into(),
            strategy: StrategyKind::StaleWhileRevalidate,
            partition: "cdn".into(),
            max_entries: Some(30),
            timeout_ms: None,
            ignore_search: false,
            fallback: None,
            same_origin: Some(false),
            hosts: vec![
                "cdn.jsdelivr.net".into(),
                "unpkg.com".into(),
                "fonts.googleapis.com".into(),
                "fonts.gstatic.com".into(),
            ],
            matchers: Vec::new(),
        },
        RouteConfig {
            name: "assets".into(),
            strategy: StrategyKind::CacheFirst,
            partition: "assets".into(),
            max_entries: Some(100),
            timeout_ms: None,
            ignore_search: false,
            fallback: None,
            same_origin: Some(true),
            hosts: Vec::new(),
            matchers: Vec::new(),
        },
    ]
}
