//! App controller implementation
//!
//! This module implements the reconciliation pass for App resources. A pass
//! re-fetches the App, then walks the three dependents in order (workload,
//! endpoint, route): build the target, observe the live object, plan a
//! mutation and apply it. The first error aborts the pass; mutations already
//! issued stand and the next pass picks up from the observed state.

use std::sync::Arc;

use kube::runtime::reflector::ObjectRef;
use kube::{Client, ResourceExt};
use tracing::{debug, info, instrument, warn};

use crate::builder::{DependentKind, DependentResource, ResourceBuilder};
use crate::cluster::{ClusterApi, KubeClusterApi};
use crate::crd::{App, AppSpec};
use crate::owner;
use crate::{Error, Result};

/// Shared state for reconciliation passes
///
/// Holds no per-App state; concurrent passes share it freely.
pub struct Context {
    /// Cluster access (trait object for testability)
    pub cluster: Arc<dyn ClusterApi>,
    /// Renders dependent definitions
    pub builder: ResourceBuilder,
}

impl Context {
    /// Create a context over an arbitrary [`ClusterApi`]
    pub fn new(cluster: Arc<dyn ClusterApi>) -> Result<Self> {
        Ok(Self {
            cluster,
            builder: ResourceBuilder::new()?,
        })
    }

    /// Create a context backed by a live Kubernetes client
    pub fn from_client(client: Client, field_manager: &str) -> Result<Self> {
        Self::new(Arc::new(KubeClusterApi::new(client, field_manager)))
    }
}

/// Observed state of one dependent relative to the App's spec
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DependentState {
    /// No live object exists
    Absent,
    /// A live object exists and nothing needs changing
    PresentMatching,
    /// A live workload runs a different image than the spec asks for
    PresentDrifted,
    /// A live object exists but its enable flag is off
    PresentUnwanted,
}

/// A change issued against one dependent
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mutation {
    /// Create the dependent
    Create,
    /// Replace the dependent with a freshly built definition
    Update,
    /// Delete the dependent
    Delete,
}

/// Decide what to do with a dependent in `state`
pub fn plan(state: DependentState, wanted: bool) -> Option<Mutation> {
    match state {
        DependentState::Absent if wanted => Some(Mutation::Create),
        DependentState::Absent => None,
        DependentState::PresentMatching => None,
        DependentState::PresentDrifted => Some(Mutation::Update),
        DependentState::PresentUnwanted => Some(Mutation::Delete),
    }
}

/// Whether the spec asks for a dependent of `kind`
pub fn wanted(spec: &AppSpec, kind: DependentKind) -> bool {
    match kind {
        DependentKind::Workload => true,
        DependentKind::Endpoint => spec.enable_service,
        DependentKind::Route => spec.enable_ingress,
    }
}

/// Classify a live dependent against the spec
///
/// Only the workload is checked for drift, by comparing the live object's
/// first container image with the spec. Endpoint and route content is not
/// reconciled.
pub fn observe(
    spec: &AppSpec,
    kind: DependentKind,
    live: Option<&DependentResource>,
) -> DependentState {
    let Some(live) = live else {
        return DependentState::Absent;
    };
    if !wanted(spec, kind) {
        return DependentState::PresentUnwanted;
    }
    if kind == DependentKind::Workload && live.image() != Some(spec.image.as_str()) {
        return DependentState::PresentDrifted;
    }
    DependentState::PresentMatching
}

/// Mutations issued during one pass, per dependent kind
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DependentChanges {
    /// Mutation issued against the workload
    pub workload: Option<Mutation>,
    /// Mutation issued against the endpoint
    pub endpoint: Option<Mutation>,
    /// Mutation issued against the route
    pub route: Option<Mutation>,
}

impl DependentChanges {
    /// Mutation issued against `kind`, if any
    pub fn get(&self, kind: DependentKind) -> Option<Mutation> {
        match kind {
            DependentKind::Workload => self.workload,
            DependentKind::Endpoint => self.endpoint,
            DependentKind::Route => self.route,
        }
    }

    fn record(&mut self, kind: DependentKind, mutation: Option<Mutation>) {
        match kind {
            DependentKind::Workload => self.workload = mutation,
            DependentKind::Endpoint => self.endpoint = mutation,
            DependentKind::Route => self.route = mutation,
        }
    }

    /// True if the pass changed nothing
    pub fn is_empty(&self) -> bool {
        DependentKind::ALL.iter().all(|k| self.get(*k).is_none())
    }
}

/// Result of a successful pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PassOutcome {
    /// The App no longer exists; its dependents are left to garbage collection
    OwnerDeleted,
    /// The App exists and these mutations were issued
    Applied(DependentChanges),
}

/// Run one reconciliation pass for the App identified by `app_ref`
///
/// The App is always re-fetched; the triggering event is not trusted.
///
/// # Errors
///
/// Returns the first error hit. Mutations issued before it are not rolled back.
#[instrument(skip(app_ref, ctx), fields(app = %app_ref.name, namespace = ?app_ref.namespace))]
pub async fn reconcile_app(
    app_ref: &ObjectRef<App>,
    ctx: &Context,
) -> Result<PassOutcome> {
    let name = app_ref.name.as_str();
    let namespace = app_ref
        .namespace
        .as_deref()
        .ok_or_else(|| Error::validation(format!("app {name} has no namespace")))?;

    let Some(app) = ctx.cluster.get_app(namespace, name).await? else {
        debug!("app is gone, dependents are left to garbage collection");
        return Ok(PassOutcome::OwnerDeleted);
    };

    app.spec.validate()?;

    let mut changes = DependentChanges::default();
    for kind in DependentKind::ALL {
        let mutation = reconcile_dependent(kind, &app, namespace, ctx).await?;
        changes.record(kind, mutation);
    }

    if changes.is_empty() {
        debug!("dependents already converged");
    }
    Ok(PassOutcome::Applied(changes))
}

async fn reconcile_dependent(
    kind: DependentKind,
    app: &App,
    namespace: &str,
    ctx: &Context,
) -> Result<Option<Mutation>> {
    let name = app.name_any();
    let desired = if wanted(&app.spec, kind) {
        Some(owner::bind(ctx.builder.build(kind, app)?, app)?)
    } else {
        None
    };

    let live = ctx.cluster.get_dependent(kind, namespace, &name).await?;
    if let Some(live) = &live {
        if !owner::is_owned_by(live, app) {
            warn!(%kind, "live dependent is not controlled by this app");
        }
    }

    let state = observe(&app.spec, kind, live.as_ref());
    let Some(mutation) = plan(state, desired.is_some()) else {
        return Ok(None);
    };

    match (mutation, desired) {
        (Mutation::Create, Some(desired)) => {
            ctx.cluster.create_dependent(&desired).await?;
            info!(%kind, "created dependent");
        }
        (Mutation::Update, Some(mut desired)) => {
            desired.meta_mut().resource_version =
                live.and_then(|l| l.meta().resource_version.clone());
            ctx.cluster.update_dependent(&desired).await?;
            info!(%kind, image = %app.spec.image, "replaced drifted dependent");
        }
        (Mutation::Delete, _) => {
            match ctx.cluster.delete_dependent(kind, namespace, &name).await {
                Ok(()) => info!(%kind, "deleted dependent"),
                Err(e) if e.is_not_found() => debug!(%kind, "dependent already deleted"),
                Err(e) => return Err(e),
            }
        }
        // create and update are only planned for wanted dependents
        (_, None) => return Ok(None),
    }

    Ok(Some(mutation))
}
