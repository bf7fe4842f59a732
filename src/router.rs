//! Event Router
//!
//! Wires the reconciliation engine into a kube-runtime [`Controller`]: Apps are
//! watched directly, and Deployments, Services and Ingresses are watched
//! through their owner references so any change to a dependent re-triggers
//! its App. Failed passes are requeued with per-App exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::NamespaceResourceScope;
use kube::runtime::controller::{self, Action};
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, Resource, ResourceExt};
use rand::Rng;
use tracing::{debug, error, info, instrument, warn};

use crate::config::OperatorConfig;
use crate::controller::{reconcile_app, Context, PassOutcome};
use crate::crd::App;
use crate::{Error, Result};

/// Exponential backoff settings for failed passes
#[derive(Clone, Debug, PartialEq)]
pub struct BackoffConfig {
    /// Delay after the first failure
    pub initial_delay: Duration,
    /// Upper bound on any delay, jitter included
    pub max_delay: Duration,
    /// Growth factor per consecutive failure
    pub backoff_multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(300),
            backoff_multiplier: 2.0,
        }
    }
}

/// Per-App consecutive failure counts
///
/// A success resets the count, so one flaky App never slows down another.
pub struct Backoff {
    config: BackoffConfig,
    failures: DashMap<ObjectRef<App>, u32>,
}

impl Backoff {
    /// Create an empty tracker
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            failures: DashMap::new(),
        }
    }

    /// Un-jittered delay for the given 1-based attempt, capped at max_delay
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.config.initial_delay.as_secs_f64()
            * self.config.backoff_multiplier.powi(exponent);
        Duration::from_secs_f64(secs.min(self.config.max_delay.as_secs_f64()))
    }

    /// Record a failure for `key` and return how long to wait before retrying
    pub fn next_delay(&self, key: &ObjectRef<App>) -> Duration {
        let attempt = {
            let mut count = self.failures.entry(key.clone()).or_insert(0);
            *count = count.saturating_add(1);
            *count
        };

        // 0.5x to 1.5x of the delay
        let jitter = rand::thread_rng().gen_range(0.5..1.5);
        let jittered = self.base_delay(attempt).as_secs_f64() * jitter;
        Duration::from_secs_f64(jittered.min(self.config.max_delay.as_secs_f64()))
    }

    /// Consecutive failures recorded for `key`
    pub fn failures(&self, key: &ObjectRef<App>) -> u32 {
        self.failures.get(key).map(|c| *c).unwrap_or(0)
    }

    /// Forget the failures for `key`
    pub fn reset(&self, key: &ObjectRef<App>) {
        self.failures.remove(key);
    }

    /// Drop the counters of Apps for which `exists` is false
    ///
    /// An App deleted while its retry is pending never reaches `reconcile`
    /// again, so its counter has to be swept from outside.
    pub fn prune(&self, exists: impl Fn(&ObjectRef<App>) -> bool) {
        self.failures.retain(|key, _| exists(key));
    }

    /// Number of Apps with a failure history
    pub fn tracked(&self) -> usize {
        self.failures.len()
    }
}

/// State shared by the reconcile and error-policy callbacks
pub struct RouterState {
    /// Reconciliation engine context
    pub ctx: Context,
    /// Per-App retry bookkeeping
    pub backoff: Backoff,
}

impl RouterState {
    /// Create router state around an engine context
    pub fn new(ctx: Context, backoff: BackoffConfig) -> Self {
        Self {
            ctx,
            backoff: Backoff::new(backoff),
        }
    }
}

/// Controller callback: run one pass for the App that triggered
///
/// Only the App's identity is used; the engine re-fetches everything else.
#[instrument(skip(app, state), fields(app = %app.name_any()))]
pub async fn reconcile(app: Arc<App>, state: Arc<RouterState>) -> Result<Action> {
    let app_ref = ObjectRef::from_obj(app.as_ref());
    let outcome = reconcile_app(&app_ref, &state.ctx).await?;
    state.backoff.reset(&app_ref);

    match outcome {
        PassOutcome::OwnerDeleted => debug!("app deleted before pass"),
        PassOutcome::Applied(changes) => debug!(?changes, "pass complete"),
    }
    Ok(Action::await_change())
}

/// Controller callback: decide when to retry a failed pass
///
/// Retryable errors back off exponentially per App. Everything else waits
/// for the next change to the App or one of its dependents.
pub fn error_policy(app: Arc<App>, error: &Error, state: Arc<RouterState>) -> Action {
    let app_ref = ObjectRef::from_obj(app.as_ref());

    if error.is_retryable() {
        let delay = state.backoff.next_delay(&app_ref);
        warn!(
            %error,
            app = %app.name_any(),
            namespace = ?app.namespace(),
            failures = state.backoff.failures(&app_ref),
            delay_ms = delay.as_millis() as u64,
            "reconciliation failed, requeueing"
        );
        Action::requeue(delay)
    } else {
        state.backoff.reset(&app_ref);
        error!(
            %error,
            app = %app.name_any(),
            namespace = ?app.namespace(),
            "reconciliation failed, waiting for a change to the app"
        );
        Action::await_change()
    }
}

fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope>,
    <K as Resource>::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Run the App controller until SIGINT or SIGTERM
pub async fn run(client: Client, config: &OperatorConfig) -> Result<()> {
    let ns = config.namespace.as_deref();
    let state = Arc::new(RouterState::new(
        Context::from_client(client.clone(), &config.field_manager)?,
        config.backoff(),
    ));

    info!(
        namespace = ns.unwrap_or("<all>"),
        concurrency = config.concurrency,
        "starting app controller"
    );

    let app_controller =
        Controller::new(scoped_api::<App>(&client, ns), WatcherConfig::default());
    let apps = app_controller.store();
    let sweep = state.clone();

    app_controller
        .owns(scoped_api::<Deployment>(&client, ns), WatcherConfig::default())
        .owns(scoped_api::<Service>(&client, ns), WatcherConfig::default())
        .owns(scoped_api::<Ingress>(&client, ns), WatcherConfig::default())
        .with_config(controller::Config::default().concurrency(config.concurrency))
        .shutdown_on_signal()
        .run(reconcile, error_policy, state)
        .for_each(|result| {
            sweep.backoff.prune(|key| apps.get(key).is_some());
            async move {
                match result {
                    Ok((app, action)) => {
                        debug!(app = %app.name, ?action, "app reconciliation completed");
                    }
                    Err(e) => warn!(error = ?e, "app reconciliation error"),
                }
            }
        })
        .await;

    info!("app controller stopped");
    Ok(())
}
