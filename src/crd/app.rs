//! App Custom Resource Definition
//!
//! An App describes one containerized application: the image to run and
//! whether it should be reachable through a Service and an Ingress. The
//! operator derives a Deployment, Service and Ingress from it.

use kube::{CustomResource, CustomResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Specification for an App
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "ing.igtest.com",
    version = "v1",
    kind = "App",
    plural = "apps",
    namespaced,
    printcolumn = r#"{"name":"Image","type":"string","jsonPath":".spec.image"}"#,
    printcolumn = r#"{"name":"Service","type":"boolean","jsonPath":".spec.enableService"}"#,
    printcolumn = r#"{"name":"Ingress","type":"boolean","jsonPath":".spec.enableIngress"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AppSpec {
    /// Container image reference
    pub image: String,

    /// Number of pod replicas
    #[serde(default = "default_replicas")]
    pub replicas: i32,

    /// Container port, also used as the Service port and Ingress backend port
    #[serde(default = "default_port")]
    pub port: i32,

    /// Expose the workload through a ClusterIP Service
    #[serde(default)]
    pub enable_service: bool,

    /// Expose the Service through an Ingress
    #[serde(default)]
    pub enable_ingress: bool,

    /// Ingress routing settings, required when `enableIngress` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress: Option<IngressSpec>,
}

fn default_replicas() -> i32 {
    1
}

fn default_port() -> i32 {
    80
}

fn default_path() -> String {
    "/".to_string()
}

/// Ingress routing settings
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngressSpec {
    /// Host the rule matches
    pub host: String,

    /// Path prefix routed to the Service
    #[serde(default = "default_path")]
    pub path: String,

    /// IngressClass to use; the cluster default applies when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

impl AppSpec {
    /// Create a spec with defaults for everything but the image
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            replicas: default_replicas(),
            port: default_port(),
            enable_service: false,
            enable_ingress: false,
            ingress: None,
        }
    }

    /// Validate the App specification
    pub fn validate(&self) -> crate::Result<()> {
        if self.image.trim().is_empty() {
            return Err(Error::validation("image must not be empty"));
        }
        if self.replicas < 0 {
            return Err(Error::validation(format!(
                "replicas must be >= 0, got {}",
                self.replicas
            )));
        }
        if !(1..=65535).contains(&self.port) {
            return Err(Error::validation(format!(
                "port must be between 1 and 65535, got {}",
                self.port
            )));
        }
        Ok(())
    }
}

/// Render the App CRD as YAML, ready for `kubectl apply -f -`
pub fn crd_manifest() -> crate::Result<String> {
    serde_yaml::to_string(&App::crd())
        .map_err(|e| Error::serialization(format!("App CRD: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_spec_gets_defaults() {
        let spec: AppSpec = serde_json::from_value(serde_json::json!({
            "image": "app:v1"
        }))
        .unwrap();

        assert_eq!(spec, AppSpec::new("app:v1"));
        assert_eq!(spec.replicas, 1);
        assert_eq!(spec.port, 80);
        assert!(!spec.enable_service);
        assert!(!spec.enable_ingress);
    }

    #[test]
    fn flags_use_camel_case_on_the_wire() {
        let spec: AppSpec = serde_json::from_value(serde_json::json!({
            "image": "app:v1",
            "enableService": true,
            "enableIngress": true,
            "ingress": { "host": "web.example.com", "className": "nginx" }
        }))
        .unwrap();

        assert!(spec.enable_service);
        assert!(spec.enable_ingress);
        let ingress = spec.ingress.unwrap();
        assert_eq!(ingress.path, "/");
        assert_eq!(ingress.class_name.as_deref(), Some("nginx"));
    }

    #[test]
    fn validation_rejects_malformed_specs() {
        assert!(AppSpec::new("app:v1").validate().is_ok());
        assert!(AppSpec::new("  ").validate().is_err());

        let mut spec = AppSpec::new("app:v1");
        spec.replicas = -1;
        assert!(spec.validate().is_err());

        let mut spec = AppSpec::new("app:v1");
        spec.port = 70000;
        let err = spec.validate().unwrap_err();
        assert!(err.to_string().contains("70000"));
    }

    #[test]
    fn crd_is_namespaced_under_app_group() {
        let crd = App::crd();
        assert_eq!(crd.spec.group, "ing.igtest.com");
        assert_eq!(crd.spec.scope, "Namespaced");
        assert_eq!(crd.spec.names.kind, "App");
        assert_eq!(crd.spec.names.plural, "apps");
    }

    #[test]
    fn crd_manifest_is_applyable_yaml() {
        let yaml = crd_manifest().unwrap();
        assert!(yaml.contains("name: apps.ing.igtest.com"));
        assert!(yaml.contains("enableService"));
    }
}
