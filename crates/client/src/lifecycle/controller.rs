//! Registration and promotion of deployments.
//!
//! At most one version is installing, one waiting and one active. A version
//! registered while none is active activates as soon as it installed; later
//! versions wait for a `SKIP_WAITING` control message unless configured to
//! skip waiting on install. Promotion claims traffic for the new version,
//! supersedes the previous one and deletes its partitions.

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shellcache_core::{AppConfig, CacheDb, Error, Request};
use tokio::sync::{Mutex, RwLock};

use super::{ActivationReport, Deployment, LifecycleState};
use crate::fetch::Network;
use crate::router::{Handled, pass_through};

/// Messages accepted on the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Promote the waiting version without waiting for old clients.
    SkipWaiting,
}

impl FromStr for ControlMessage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SKIP_WAITING" => Ok(Self::SkipWaiting),
            other => Err(Error::InvalidInput(format!("unknown control message type {other:?}"))),
        }
    }
}

/// Result of delivering a control message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MessageOutcome {
    /// The waiting version is now active.
    Activated { version: String, deleted: Vec<String> },
    /// A version is installing; it activates once installed.
    Deferred { version: String },
    /// Nothing to promote.
    NoWaiting,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct DeploymentStatus {
    pub version: String,
    pub state: LifecycleState,
}

impl DeploymentStatus {
    fn of(deployment: &Deployment) -> Self {
        Self { version: deployment.version().to_string(), state: deployment.state() }
    }
}

/// Snapshot of the controller slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct ControllerStatus {
    pub installing: Option<DeploymentStatus>,
    pub waiting: Option<DeploymentStatus>,
    pub active: Option<DeploymentStatus>,
}

#[derive(Default)]
struct Slots {
    installing: Option<Arc<Deployment>>,
    waiting: Option<Arc<Deployment>>,
    active: Option<Arc<Deployment>>,
    skip_requested: bool,
}

/// Owns deployment slots and serializes lifecycle transitions.
pub struct Controller {
    db: CacheDb,
    network: Arc<dyn Network>,
    slots: RwLock<Slots>,
    transition: Mutex<()>,
}

impl Controller {
    pub fn new(db: CacheDb, network: Arc<dyn Network>) -> Self {
        Self { db, network, slots: RwLock::new(Slots::default()), transition: Mutex::new(()) }
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    pub async fn active(&self) -> Option<Arc<Deployment>> {
        self.slots.read().await.active.clone()
    }

    pub async fn waiting(&self) -> Option<Arc<Deployment>> {
        self.slots.read().await.waiting.clone()
    }

    /// Install a version and activate it or leave it waiting.
    ///
    /// Registering the version that is already active is a no-op, as is
    /// registering the waiting version unless `skip_waiting_on_install`
    /// asks to promote it. Neither reinstalls over the existing shell.
    ///
    /// # Errors
    ///
    /// Returns the install error; the previously active version keeps
    /// serving in that case.
    pub async fn register(&self, config: &AppConfig) -> Result<Arc<Deployment>, Error> {
        let _transition = self.transition.lock().await;

        if let Some(active) = self.active().await
            && active.version().as_str() == config.version
        {
            tracing::info!(version = %config.version, "version already active");
            return Ok(active);
        }

        if let Some(waiting) = self.waiting().await
            && waiting.version().as_str() == config.version
        {
            if config.skip_waiting_on_install {
                self.promote(waiting.clone()).await?;
            } else {
                tracing::info!(version = %config.version, "version already waiting");
            }
            return Ok(waiting);
        }

        let deployment = Arc::new(Deployment::new(config, self.db.clone(), self.network.clone())?);
        {
            let mut slots = self.slots.write().await;
            slots.installing = Some(deployment.clone());
            slots.skip_requested = false;
        }

        let installed = deployment.install().await;

        let skip = {
            let mut slots = self.slots.write().await;
            slots.installing = None;
            let requested = std::mem::take(&mut slots.skip_requested);
            requested || config.skip_waiting_on_install || slots.active.is_none()
        };
        installed?;

        if skip {
            self.promote(deployment.clone()).await?;
        } else {
            let previous = self.slots.write().await.waiting.replace(deployment.clone());
            if let Some(previous) = previous {
                previous.supersede();
            }
            tracing::info!(version = %deployment.version(), "waiting for activation");
        }

        Ok(deployment)
    }

    /// Deliver a control message.
    pub async fn message(&self, message: ControlMessage) -> Result<MessageOutcome, Error> {
        match message {
            ControlMessage::SkipWaiting => self.skip_waiting().await,
        }
    }

    async fn skip_waiting(&self) -> Result<MessageOutcome, Error> {
        {
            let mut slots = self.slots.write().await;
            if let Some(installing) = &slots.installing {
                let version = installing.version().to_string();
                slots.skip_requested = true;
                tracing::debug!(version = %version, "skip waiting deferred until installed");
                return Ok(MessageOutcome::Deferred { version });
            }
        }

        let _transition = self.transition.lock().await;
        let Some(waiting) = self.waiting().await else {
            return Ok(MessageOutcome::NoWaiting);
        };
        let report = self.promote(waiting.clone()).await?;
        Ok(MessageOutcome::Activated { version: waiting.version().to_string(), deleted: report.deleted })
    }

    /// Claim traffic for `deployment`, then clean up other versions.
    ///
    /// The caller holds the transition lock.
    async fn promote(&self, deployment: Arc<Deployment>) -> Result<ActivationReport, Error> {
        let (previous, passed_over) = {
            let mut slots = self.slots.write().await;
            let passed_over = slots.waiting.take().filter(|w| !Arc::ptr_eq(w, &deployment));
            (slots.active.replace(deployment.clone()), passed_over)
        };
        for old in previous.into_iter().chain(passed_over) {
            old.supersede();
        }
        deployment.activate().await
    }

    /// Route a request through the active version, or pass it through.
    pub async fn handle(&self, request: &Request) -> Handled {
        match self.active().await {
            Some(active) => active.router().handle(request).await,
            None => pass_through(self.network.as_ref(), request).await,
        }
    }

    pub async fn status(&self) -> ControllerStatus {
        let slots = self.slots.read().await;
        ControllerStatus {
            installing: slots.installing.as_deref().map(DeploymentStatus::of),
            waiting: slots.waiting.as_deref().map(DeploymentStatus::of),
            active: slots.active.as_deref().map(DeploymentStatus::of),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use shellcache_core::ResponseType;

    use super::*;
    use crate::lifecycle::tests::config;
    use crate::router::Source;
    use crate::testing::{ScriptedNetwork, url};

    const ROOT: &str = "https://app.test/";
    const INDEX: &str = "https://app.test/index.html";

    async fn controller() -> (Arc<Controller>, Arc<ScriptedNetwork>) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = Arc::new(ScriptedNetwork::new());
        network.respond_ok(ROOT, "root");
        network.respond_ok(INDEX, "index");
        (Arc::new(Controller::new(db, network.clone())), network)
    }

    #[test]
    fn test_control_message_wire_format() {
        let msg: ControlMessage = serde_json::from_str(r#"{"type":"SKIP_WAITING"}"#).unwrap();
        assert_eq!(msg, ControlMessage::SkipWaiting);
        assert!(serde_json::from_str::<ControlMessage>(r#"{"type":"CLAIM"}"#).is_err());
        assert_eq!("SKIP_WAITING".parse::<ControlMessage>().unwrap(), ControlMessage::SkipWaiting);
        assert!(matches!("skip".parse::<ControlMessage>(), Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_first_version_activates_immediately() {
        let (controller, _network) = controller().await;
        let v1 = controller.register(&config("v1")).await.unwrap();

        assert_eq!(v1.state(), LifecycleState::Active);
        let status = controller.status().await;
        assert_eq!(status.active.map(|s| s.version), Some("v1".into()));
        assert!(status.waiting.is_none());
    }

    #[tokio::test]
    async fn test_second_version_waits_until_skip_waiting() {
        let (controller, network) = controller().await;
        let v1 = controller.register(&config("v1")).await.unwrap();
        network.respond_ok("https://app.test/app.js", "js-v1");
        controller.handle(&Request::get(url("https://app.test/app.js"))).await;

        let v2 = controller.register(&config("v2")).await.unwrap();
        assert_eq!(v2.state(), LifecycleState::Waiting);
        assert_eq!(v1.state(), LifecycleState::Active);
        assert!(controller.db().has_partition("shell:v1:assets").await.unwrap());

        let outcome = controller.message(ControlMessage::SkipWaiting).await.unwrap();
        let MessageOutcome::Activated { version, deleted } = outcome else {
            panic!("expected activation, got {outcome:?}");
        };
        assert_eq!(version, "v2");
        assert!(deleted.contains(&"shell:v1:assets".to_string()));
        assert_eq!(v1.state(), LifecycleState::Superseded);
        assert_eq!(v2.state(), LifecycleState::Active);

        let names = controller.db().partition_names().await.unwrap();
        assert!(!names.is_empty());
        assert!(names.iter().all(|n| n.starts_with("shell:v2:")), "left {names:?}");
    }

    #[tokio::test]
    async fn test_failed_install_keeps_previous_version_serving() {
        let (controller, network) = controller().await;
        controller.register(&config("v1")).await.unwrap();

        network.respond(INDEX, shellcache_core::Response::new(url(INDEX), 500, ResponseType::Basic, "boom"));
        let result = controller.register(&config("v2")).await;
        assert!(matches!(result, Err(Error::PrecacheFailed { .. })));

        let status = controller.status().await;
        assert_eq!(status.active.map(|s| s.version), Some("v1".into()));
        assert!(status.installing.is_none());
        assert!(status.waiting.is_none());
        assert!(controller.db().has_partition("shell:v1:shell").await.unwrap());
        assert!(!controller.db().has_partition("shell:v2:shell").await.unwrap());
    }

    #[tokio::test]
    async fn test_skip_waiting_during_install_activates_on_completion() {
        let (controller, network) = controller().await;
        controller.register(&config("v1")).await.unwrap();
        network.respond_after(INDEX, Duration::from_millis(300), "index-v2");

        let registering = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.register(&config("v2")).await })
        };
        while controller.status().await.installing.is_none() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let outcome = controller.message(ControlMessage::SkipWaiting).await.unwrap();
        assert_eq!(outcome, MessageOutcome::Deferred { version: "v2".into() });

        let v2 = registering.await.unwrap().unwrap();
        assert_eq!(v2.state(), LifecycleState::Active);
        assert!(controller.waiting().await.is_none());
    }

    #[tokio::test]
    async fn test_skip_waiting_on_install_config() {
        let (controller, _network) = controller().await;
        controller.register(&config("v1")).await.unwrap();

        let v2 = controller
            .register(&AppConfig { skip_waiting_on_install: true, ..config("v2") })
            .await
            .unwrap();
        assert_eq!(v2.state(), LifecycleState::Active);
    }

    #[tokio::test]
    async fn test_skip_waiting_with_nothing_waiting() {
        let (controller, _network) = controller().await;
        controller.register(&config("v1")).await.unwrap();

        assert_eq!(controller.message(ControlMessage::SkipWaiting).await.unwrap(), MessageOutcome::NoWaiting);
    }

    #[tokio::test]
    async fn test_reregistering_active_version_is_noop() {
        let (controller, network) = controller().await;
        let first = controller.register(&config("v1")).await.unwrap();
        let calls = network.calls();

        let again = controller.register(&config("v1")).await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(network.calls(), calls);
    }

    #[tokio::test]
    async fn test_newer_waiting_version_supersedes_older_waiting() {
        let (controller, _network) = controller().await;
        controller.register(&config("v1")).await.unwrap();
        let v2 = controller.register(&config("v2")).await.unwrap();
        let v3 = controller.register(&config("v3")).await.unwrap();

        assert_eq!(v2.state(), LifecycleState::Superseded);
        assert_eq!(v3.state(), LifecycleState::Waiting);
        assert!(controller.waiting().await.is_some_and(|w| Arc::ptr_eq(&w, &v3)));
    }

    #[tokio::test]
    async fn test_reregistering_waiting_version_keeps_its_shell() {
        let (controller, network) = controller().await;
        controller.register(&config("v1")).await.unwrap();
        let v2 = controller.register(&config("v2")).await.unwrap();
        let shell = controller.db().partition("shell:v2:shell").unwrap();
        assert_eq!(shell.count().await.unwrap(), 2);

        network.respond(INDEX, shellcache_core::Response::new(url(INDEX), 500, ResponseType::Basic, "boom"));
        let calls = network.calls();
        let again = controller.register(&config("v2")).await.unwrap();
        assert!(Arc::ptr_eq(&v2, &again));
        assert_eq!(network.calls(), calls);
        assert_eq!(shell.count().await.unwrap(), 2);

        let outcome = controller.message(ControlMessage::SkipWaiting).await.unwrap();
        assert!(matches!(outcome, MessageOutcome::Activated { ref version, .. } if version == "v2"));
        assert_eq!(shell.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_reregistering_waiting_version_with_skip_promotes_it() {
        let (controller, _network) = controller().await;
        controller.register(&config("v1")).await.unwrap();
        let v2 = controller.register(&config("v2")).await.unwrap();

        let again = controller
            .register(&AppConfig { skip_waiting_on_install: true, ..config("v2") })
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&v2, &again));
        assert_eq!(v2.state(), LifecycleState::Active);
        assert!(controller.waiting().await.is_none());
    }

    #[tokio::test]
    async fn test_refresh_finishing_after_cutover_leaves_no_old_partition() {
        const LIB: &str = "https://unpkg.com/lib.js";
        let (controller, network) = controller().await;
        controller.register(&config("v1")).await.unwrap();
        network.respond_ok(LIB, "lib-v1");
        controller.handle(&Request::get(url(LIB))).await;
        assert!(controller.db().has_partition("shell:v1:cdn").await.unwrap());

        network.respond_after(LIB, Duration::from_millis(300), "lib-v2");
        let handled = controller.handle(&Request::get(url(LIB))).await;
        assert_eq!(handled.source, Source::Cache);
        let refresh = handled.revalidation.unwrap();

        controller
            .register(&AppConfig { skip_waiting_on_install: true, ..config("v2") })
            .await
            .unwrap();
        assert!(!controller.db().has_partition("shell:v1:cdn").await.unwrap());

        refresh.await.unwrap().unwrap();
        let names = controller.db().partition_names().await.unwrap();
        assert!(names.iter().all(|n| n.starts_with("shell:v2:")), "left {names:?}");
    }

    #[tokio::test]
    async fn test_request_in_flight_during_cutover_is_not_cached() {
        const ABOUT: &str = "https://app.test/about";
        let (controller, network) = controller().await;
        controller.register(&config("v1")).await.unwrap();
        network.respond_after(ABOUT, Duration::from_millis(300), "about");
        let calls = network.calls();

        let in_flight = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.handle(&Request::navigate(url(ABOUT))).await })
        };
        while network.calls() == calls {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        controller
            .register(&AppConfig { skip_waiting_on_install: true, ..config("v2") })
            .await
            .unwrap();

        let handled = in_flight.await.unwrap();
        assert_eq!(handled.source, Source::Network);
        assert_eq!(handled.response.body, Bytes::from("about"));
        let names = controller.db().partition_names().await.unwrap();
        assert!(names.iter().all(|n| n.starts_with("shell:v2:")), "left {names:?}");
    }

    #[tokio::test]
    async fn test_handle_without_active_passes_through() {
        let (controller, network) = controller().await;
        network.respond_ok("https://app.test/app.js", "js");

        let handled = controller.handle(&Request::get(url("https://app.test/app.js"))).await;
        assert_eq!(handled.source, Source::PassThrough);
        assert_eq!(handled.response.body, Bytes::from("js"));
        assert!(controller.db().partition_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_active_version_serves_precached_shell_offline() {
        let (controller, network) = controller().await;
        controller.register(&config("v1")).await.unwrap();
        network.set_offline(true);

        let handled = controller.handle(&Request::navigate(url(ROOT))).await;
        assert_eq!(handled.source, Source::Cache);
        assert_eq!(handled.response.body, Bytes::from("root"));
    }
}
