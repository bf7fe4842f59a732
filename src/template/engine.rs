//! Template engine for dependent manifests
//!
//! Manifests are YAML templates embedded in the binary and rendered with
//! minijinja. Undefined variables are a hard error so a manifest can never be
//! produced from a spec that lacks a field the template needs.

use minijinja::{Environment, UndefinedBehavior, Value};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::TemplateError;

/// Embedded manifest templates, keyed by template name
const MANIFESTS: &[(&str, &str)] = &[
    ("deployment", include_str!("manifests/deployment.yaml")),
    ("service", include_str!("manifests/service.yaml")),
    ("ingress", include_str!("manifests/ingress.yaml")),
];

/// Renders named manifest templates against a serializable context
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    /// Create an engine with the built-in manifest templates registered
    pub fn new() -> Result<Self, TemplateError> {
        Self::with_templates(MANIFESTS)
    }

    /// Create an engine from an explicit template set
    pub fn with_templates(
        templates: &[(&'static str, &'static str)],
    ) -> Result<Self, TemplateError> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);

        for &(name, source) in templates {
            env.add_template(name, source)
                .map_err(|source| TemplateError::Syntax {
                    template: name.to_string(),
                    source,
                })?;
        }

        Ok(Self { env })
    }

    /// Render a template to text
    ///
    /// Returns `TemplateError::Render` if the template references a field the
    /// context does not have.
    pub fn render<S: Serialize>(&self, name: &str, ctx: &S) -> Result<String, TemplateError> {
        let template = self
            .env
            .get_template(name)
            .map_err(|_| TemplateError::Unknown(name.to_string()))?;
        Ok(template.render(Value::from_serialize(ctx))?)
    }

    /// Render a template and parse the output as YAML into `T`
    pub fn render_as<T, S>(&self, name: &str, ctx: &S) -> Result<T, TemplateError>
    where
        T: DeserializeOwned,
        S: Serialize,
    {
        let rendered = self.render(name, ctx)?;
        serde_yaml::from_str(&rendered).map_err(|source| TemplateError::Parse {
            template: name.to_string(),
            source,
        })
    }
}
