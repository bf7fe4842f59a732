//! Template error types

use std::fmt;

/// Errors that can occur while rendering a dependent manifest
#[derive(Debug)]
pub enum TemplateError {
    /// Template failed to compile when registered
    Syntax {
        /// Template name
        template: String,
        /// Underlying minijinja error
        source: minijinja::Error,
    },
    /// Rendering failed, most often because a referenced field is undefined
    Render(minijinja::Error),
    /// No template is registered under this name
    Unknown(String),
    /// Rendered output is not a valid manifest for the target type
    Parse {
        /// Template name
        template: String,
        /// Underlying YAML error
        source: serde_yaml::Error,
    },
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax { template, source } => {
                write!(f, "template '{}' has a syntax error: {}", template, source)
            }
            Self::Render(e) => write!(f, "template render error: {}", e),
            Self::Unknown(name) => write!(f, "unknown template: {}", name),
            Self::Parse { template, source } => write!(
                f,
                "template '{}' rendered an invalid manifest: {}",
                template, source
            ),
        }
    }
}

impl std::error::Error for TemplateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Syntax { source, .. } => Some(source),
            Self::Render(e) => Some(e),
            Self::Parse { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<minijinja::Error> for TemplateError {
    fn from(err: minijinja::Error) -> Self {
        Self::Render(err)
    }
}
