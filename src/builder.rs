//! Resource Builder
//!
//! Maps an [`App`] to the concrete definition of each dependent kind by
//! rendering the embedded manifest template for that kind and parsing the
//! result into the matching `k8s-openapi` type. Building has no side effects:
//! the same App always produces byte-identical definitions.

use std::fmt;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::Serialize;

use crate::crd::App;
use crate::template::TemplateEngine;
use crate::Result;

/// The closed set of resources an App owns
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DependentKind {
    /// The Deployment running the App's image
    Workload,
    /// The Service exposing the workload inside the cluster
    Endpoint,
    /// The Ingress routing external traffic to the Service
    Route,
}

impl DependentKind {
    /// All kinds, in the order a pass reconciles them
    pub const ALL: [DependentKind; 3] = [
        DependentKind::Workload,
        DependentKind::Endpoint,
        DependentKind::Route,
    ];

    /// Name of the embedded manifest template for this kind
    pub fn template_name(self) -> &'static str {
        match self {
            DependentKind::Workload => "deployment",
            DependentKind::Endpoint => "service",
            DependentKind::Route => "ingress",
        }
    }

    /// Kubernetes kind of the built object
    pub fn k8s_kind(self) -> &'static str {
        match self {
            DependentKind::Workload => "Deployment",
            DependentKind::Endpoint => "Service",
            DependentKind::Route => "Ingress",
        }
    }
}

impl fmt::Display for DependentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.k8s_kind())
    }
}

/// A built or observed dependent, tagged by kind
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DependentResource {
    /// apps/v1 Deployment
    Workload(Deployment),
    /// v1 Service
    Endpoint(Service),
    /// networking.k8s.io/v1 Ingress
    Route(Ingress),
}

impl DependentResource {
    /// Kind of this dependent
    pub fn kind(&self) -> DependentKind {
        match self {
            DependentResource::Workload(_) => DependentKind::Workload,
            DependentResource::Endpoint(_) => DependentKind::Endpoint,
            DependentResource::Route(_) => DependentKind::Route,
        }
    }

    /// Object metadata
    pub fn meta(&self) -> &ObjectMeta {
        match self {
            DependentResource::Workload(d) => &d.metadata,
            DependentResource::Endpoint(s) => &s.metadata,
            DependentResource::Route(i) => &i.metadata,
        }
    }

    /// Mutable object metadata
    pub fn meta_mut(&mut self) -> &mut ObjectMeta {
        match self {
            DependentResource::Workload(d) => &mut d.metadata,
            DependentResource::Endpoint(s) => &mut s.metadata,
            DependentResource::Route(i) => &mut i.metadata,
        }
    }

    /// Object name, empty if unset
    pub fn name(&self) -> &str {
        self.meta().name.as_deref().unwrap_or_default()
    }

    /// Object namespace, empty if unset
    pub fn namespace(&self) -> &str {
        self.meta().namespace.as_deref().unwrap_or_default()
    }

    /// Image of the first container, for workloads only
    pub fn image(&self) -> Option<&str> {
        match self {
            DependentResource::Workload(d) => d
                .spec
                .as_ref()?
                .template
                .spec
                .as_ref()?
                .containers
                .first()?
                .image
                .as_deref(),
            _ => None,
        }
    }
}

/// Builds dependent definitions from an App
pub struct ResourceBuilder {
    engine: TemplateEngine,
}

impl ResourceBuilder {
    /// Create a builder backed by the embedded manifest templates
    pub fn new() -> Result<Self> {
        Ok(Self {
            engine: TemplateEngine::new()?,
        })
    }

    /// Build the definition of `kind` for `app`
    ///
    /// The rendered object carries the App's name and namespace. It has no
    /// owner reference yet; see [`crate::owner::bind`].
    pub fn build(&self, kind: DependentKind, app: &App) -> Result<DependentResource> {
        let name = kind.template_name();
        let resource = match kind {
            DependentKind::Workload => {
                DependentResource::Workload(self.engine.render_as(name, app)?)
            }
            DependentKind::Endpoint => {
                DependentResource::Endpoint(self.engine.render_as(name, app)?)
            }
            DependentKind::Route => DependentResource::Route(self.engine.render_as(name, app)?),
        };
        Ok(resource)
    }
}
