//! Request classification into route classes.
//!
//! Routes are evaluated in declared order and the first match wins. Only GET
//! requests are ever classified; every other method is passed through.

pub mod predicate;

use std::time::Duration;

use shellcache_core::config::{AppConfig, RouteConfig, StrategyKind};
use shellcache_core::{Error, Request};
use url::Url;

pub use predicate::{Matcher, RoutePredicate};

/// A named policy binding a predicate to a strategy and its parameters.
#[derive(Debug, Clone)]
pub struct RouteClass {
    pub name: String,
    pub strategy: StrategyKind,
    /// Logical partition name (without prefix and version).
    pub partition: String,
    pub max_entries: Option<usize>,
    /// Network deadline; only consulted by network-first.
    pub timeout: Duration,
    pub ignore_search: bool,
    /// Resolved fallback URL served from cache when the strategy fails.
    pub fallback: Option<Url>,
    predicate: RoutePredicate,
}

impl RouteClass {
    /// Compile a route from configuration.
    pub fn compile(route: &RouteConfig, config: &AppConfig) -> Result<Self, Error> {
        let predicate = RoutePredicate::compile(route)
            .map_err(|e| Error::InvalidConfig(format!("route {}: {e}", route.name)))?;
        let fallback = route
            .fallback
            .as_deref()
            .map(|f| config.resolve(f))
            .transpose()
            .map_err(|e| Error::InvalidConfig(format!("route {}: {e}", route.name)))?;

        Ok(Self {
            name: route.name.clone(),
            strategy: route.strategy,
            partition: route.partition.clone(),
            max_entries: route.max_entries,
            timeout: route.timeout_ms.map(Duration::from_millis).unwrap_or_else(|| config.network_first_timeout()),
            ignore_search: route.ignore_search,
            fallback,
            predicate,
        })
    }

    pub fn matches(&self, request: &Request, origin: &Url) -> bool {
        self.predicate.matches(request, origin)
    }
}

/// Maps requests to route classes.
#[derive(Debug, Clone)]
pub struct Classifier {
    origin: Url,
    routes: Vec<RouteClass>,
}

impl Classifier {
    pub fn new(origin: Url, routes: Vec<RouteClass>) -> Self {
        Self { origin, routes }
    }

    /// Compile the configured route table.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidConfig(e.to_string()))?;
        let routes = config
            .routes
            .iter()
            .map(|r| RouteClass::compile(r, config))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(origin, routes))
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn routes(&self) -> &[RouteClass] {
        &self.routes
    }

    /// First route matching the request, or `None` for pass-through.
    pub fn classify(&self, request: &Request) -> Option<&RouteClass> {
        if !request.is_get() {
            return None;
        }
        self.routes.iter().find(|route| route.matches(request, &self.origin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        let config = AppConfig { origin: "https://app.test/".into(), ..Default::default() };
        Classifier::from_config(&config).unwrap()
    }

    fn get(u: &str) -> Request {
        Request::get(Url::parse(u).unwrap())
    }

    fn route_name(c: &Classifier, req: &Request) -> Option<String> {
        c.classify(req).map(|r| r.name.clone())
    }

    #[test]
    fn test_non_get_passes_through() {
        let c = classifier();
        let post = Request::new("POST", Url::parse("https://app.test/index.html").unwrap());
        assert_eq!(route_name(&c, &post), None);
    }

    #[test]
    fn test_default_table() {
        let c = classifier();
        assert_eq!(route_name(&c, &Request::navigate(Url::parse("https://app.test/about").unwrap())), Some("pages".into()));
        assert_eq!(route_name(&c, &get("https://app.test/")), Some("pages".into()));
        assert_eq!(route_name(&c, &get("https://app.test/index.html")), Some("pages".into()));
        assert_eq!(route_name(&c, &get("https://app.test/api/items?page=2")), Some("api".into()));
        assert_eq!(route_name(&c, &get("https://app.test/icon-192.png")), Some("images".into()));
        assert_eq!(route_name(&c, &get("https://app.test/photo.JPG")), Some("images".into()));
        assert_eq!(route_name(&c, &get("https://unpkg.com/react@18/umd/react.js")), Some("cdn".into()));
        assert_eq!(route_name(&c, &get("https://app.test/app.js")), Some("assets".into()));
        assert_eq!(route_name(&c, &get("https://tracker.example/pixel.gif")), None);
    }

    #[test]
    fn test_first_declared_wins() {
        let config = AppConfig {
            origin: "https://app.test/".into(),
            routes: vec![
                RouteConfig {
                    name: "first".into(),
                    strategy: StrategyKind::CacheFirst,
                    partition: "a".into(),
                    max_entries: None,
                    timeout_ms: None,
                    ignore_search: false,
                    fallback: None,
                    same_origin: None,
                    hosts: Vec::new(),
                    matchers: Vec::new(),
                },
                RouteConfig {
                    name: "second".into(),
                    strategy: StrategyKind::NetworkFirst,
                    partition: "b".into(),
                    max_entries: None,
                    timeout_ms: None,
                    ignore_search: false,
                    fallback: None,
                    same_origin: None,
                    hosts: Vec::new(),
                    matchers: Vec::new(),
                },
            ],
            ..Default::default()
        };
        let c = Classifier::from_config(&config).unwrap();
        assert_eq!(route_name(&c, &get("https://app.test/x")), Some("first".into()));
    }

    #[test]
    fn test_route_parameters_resolved() {
        let c = classifier();
        let pages = c.classify(&get("https://app.test/")).unwrap();
        assert_eq!(pages.timeout, Duration::from_millis(3_000));
        assert_eq!(pages.fallback.as_ref().map(Url::as_str), Some("https://app.test/index.html"));
        assert!(pages.ignore_search);

        let api = c.classify(&get("https://app.test/api/x")).unwrap();
        assert_eq!(api.timeout, Duration::from_millis(2_500));
        assert_eq!(api.max_entries, Some(50));
    }

    #[test]
    fn test_invalid_regex_is_config_error() {
        let mut config = AppConfig { origin: "https://app.test/".into(), ..Default::default() };
        config.routes[2].matchers = vec![shellcache_core::config::MatcherConfig::PathPattern("[".into())];
        assert!(matches!(Classifier::from_config(&config), Err(Error::InvalidConfig(_))));
    }
}
