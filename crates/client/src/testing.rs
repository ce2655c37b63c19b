//! Scripted network double for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use shellcache_core::{Request, Response, ResponseType};
use url::Url;

use crate::fetch::{FetchError, FetchOptions, Network};

#[derive(Clone)]
enum Reply {
    Respond(Response),
    Fail,
}

#[derive(Clone)]
struct Script {
    reply: Reply,
    delay: Option<Duration>,
}

/// Network that answers from a per-URL script.
///
/// Unscripted URLs fail as unreachable, as does everything while offline.
#[derive(Default)]
pub(crate) struct ScriptedNetwork {
    scripts: Mutex<HashMap<String, Script>>,
    offline: AtomicBool,
    calls: AtomicUsize,
    last_options: Mutex<Option<FetchOptions>>,
}

pub(crate) fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

pub(crate) fn ok(u: &str, body: &str) -> Response {
    Response::new(url(u), 200, ResponseType::Basic, body.to_string())
}

impl ScriptedNetwork {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, u: &str, response: Response) {
        self.script(u, Script { reply: Reply::Respond(response), delay: None });
    }

    pub(crate) fn respond_ok(&self, u: &str, body: &str) {
        self.respond(u, ok(u, body));
    }

    pub(crate) fn respond_after(&self, u: &str, delay: Duration, body: &str) {
        self.script(u, Script { reply: Reply::Respond(ok(u, body)), delay: Some(delay) });
    }

    pub(crate) fn fail(&self, u: &str) {
        self.script(u, Script { reply: Reply::Fail, delay: None });
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_options(&self) -> Option<FetchOptions> {
        *self.last_options.lock().unwrap()
    }

    fn script(&self, u: &str, script: Script) {
        self.scripts.lock().unwrap().insert(url(u).to_string(), script);
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &Request, options: &FetchOptions) -> Result<Response, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock().unwrap() = Some(*options);

        let script = self.scripts.lock().unwrap().get(request.url.as_str()).cloned();
        let Some(script) = script else {
            return Err(FetchError::Unreachable(format!("no script for {}", request.url)));
        };
        if let Some(delay) = script.delay {
            tokio::time::sleep(delay).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Unreachable("offline".into()));
        }
        match script.reply {
            Reply::Respond(response) => Ok(response),
            Reply::Fail => Err(FetchError::Unreachable(format!("scripted failure for {}", request.url))),
        }
    }
}
