//! Compiled route predicates.

use regex::Regex;
use shellcache_core::config::{MatcherConfig, RouteConfig};
use shellcache_core::{Request, RequestMode};
use url::Url;

use crate::fetch::same_origin;

/// A compiled request test.
#[derive(Debug, Clone)]
pub enum Matcher {
    Navigate,
    AcceptContains(String),
    PathSuffix(String),
    PathPrefix(String),
    PathEquals(String),
    PathPattern(Regex),
}

impl Matcher {
    pub fn compile(config: &MatcherConfig) -> Result<Self, regex::Error> {
        Ok(match config {
            MatcherConfig::Navigate => Self::Navigate,
            MatcherConfig::AcceptContains(v) => Self::AcceptContains(v.to_ascii_lowercase()),
            MatcherConfig::PathSuffix(v) => Self::PathSuffix(v.clone()),
            MatcherConfig::PathPrefix(v) => Self::PathPrefix(v.clone()),
            MatcherConfig::PathEquals(v) => Self::PathEquals(v.clone()),
            MatcherConfig::PathPattern(v) => Self::PathPattern(Regex::new(v)?),
        })
    }

    pub fn matches(&self, request: &Request) -> bool {
        let path = request.url.path();
        match self {
            Self::Navigate => request.mode == RequestMode::Navigate,
            Self::AcceptContains(media) => request
                .accept
                .as_deref()
                .is_some_and(|accept| accept.to_ascii_lowercase().contains(media.as_str())),
            Self::PathSuffix(suffix) => path.ends_with(suffix.as_str()),
            Self::PathPrefix(prefix) => path.starts_with(prefix.as_str()),
            Self::PathEquals(expected) => path == expected,
            Self::PathPattern(re) => re.is_match(path),
        }
    }
}

/// Scope checks (origin, hosts) AND-ed with an OR-ed matcher list.
#[derive(Debug, Clone)]
pub struct RoutePredicate {
    same_origin: Option<bool>,
    hosts: Vec<String>,
    matchers: Vec<Matcher>,
}

impl RoutePredicate {
    pub fn compile(route: &RouteConfig) -> Result<Self, regex::Error> {
        let matchers = route.matchers.iter().map(Matcher::compile).collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            same_origin: route.same_origin,
            hosts: route.hosts.iter().map(|h| h.trim().to_ascii_lowercase()).collect(),
            matchers,
        })
    }

    pub fn matches(&self, request: &Request, origin: &Url) -> bool {
        if let Some(expected) = self.same_origin
            && same_origin(&request.url, origin) != expected
        {
            return false;
        }

        if !self.hosts.is_empty() {
            let Some(host) = request.url.host_str() else {
                return false;
            };
            if !self.hosts.iter().any(|pattern| host_matches(pattern, host)) {
                return false;
            }
        }

        self.matchers.is_empty() || self.matchers.iter().any(|m| m.matches(request))
    }
}

/// `*.example.com` matches strict subdomains; anything else must be equal.
fn host_matches(pattern: &str, host: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(domain) => host
            .strip_suffix(domain)
            .is_some_and(|rest| rest.len() > 1 && rest.ends_with('.')),
        None => pattern == host,
    }
}
