//! Manifest templating for App dependents
//!
//! Each dependent kind has one embedded YAML template. Templates are rendered
//! with the serialized `App` as context (`metadata.*`, `spec.*`) and parsed into
//! the matching `k8s-openapi` type by the resource builder.

mod engine;
mod error;

pub use engine::TemplateEngine;
pub use error::TemplateError;
