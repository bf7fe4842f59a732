//! Custom Resource Definitions for the App operator

mod app;

pub use app::{crd_manifest, App, AppSpec, IngressSpec};
