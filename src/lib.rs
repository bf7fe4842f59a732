//! ingress-manager - Kubernetes operator that turns App resources into workloads
//!
//! An `App` declares a container image and whether it should be exposed
//! through a Service and an Ingress. The operator keeps a Deployment, and
//! optionally a Service and an Ingress, in line with that declaration.
//!
//! # Architecture
//!
//! A reconciliation pass is triggered by any change to an App or to one of
//! the objects it owns:
//! - The App is re-fetched from the cluster (events are never trusted)
//! - Each dependent is built from an embedded manifest template
//! - The dependent is bound to the App with a controller owner reference
//! - The live dependent is compared with the target and created, replaced or
//!   deleted as needed
//!
//! # Modules
//!
//! - [`crd`] - The App Custom Resource Definition
//! - [`template`] - Manifest template rendering
//! - [`builder`] - App to Deployment/Service/Ingress mapping
//! - [`owner`] - Owner reference binding
//! - [`cluster`] - Cluster API capability and its kube-rs implementation
//! - [`controller`] - Reconciliation pass
//! - [`router`] - kube-runtime controller wiring and retry backoff
//! - [`config`] - Command-line and environment configuration
//! - [`telemetry`] - Logging setup
//! - [`error`] - Error types for the operator

#![deny(missing_docs)]

pub mod builder;
pub mod cluster;
pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod owner;
pub mod router;
pub mod telemetry;
pub mod template;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
