//! Error types for the App operator
//!
//! Errors carry enough context (kind, namespace, name) to be actionable in logs.
//! The router decides between requeue-with-backoff and await-change purely
//! from [`Error::is_retryable`].

use thiserror::Error;

use crate::builder::DependentKind;
use crate::template::TemplateError;

/// Main error type for reconciliation passes
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error that is neither a not-found nor a conflict
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Resource does not exist
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        /// Kind of the missing resource
        kind: String,
        /// Namespace that was queried
        namespace: String,
        /// Name that was queried
        name: String,
    },

    /// Concurrent mutation lost an optimistic-concurrency race
    #[error("conflict on {kind} {namespace}/{name}: {message}")]
    Conflict {
        /// Kind of the contended resource
        kind: String,
        /// Namespace of the contended resource
        namespace: String,
        /// Name of the contended resource
        name: String,
        /// Message returned by the API server
        message: String,
    },

    /// Rendering a dependent definition failed
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// Operator misconfiguration (e.g. an owner that cannot be referenced)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The App spec is malformed
    #[error("validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Create a not-found error for a dependent
    pub fn not_found(kind: DependentKind, namespace: &str, name: &str) -> Self {
        Self::NotFound {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Create a conflict error for a dependent
    pub fn conflict(
        kind: DependentKind,
        namespace: &str,
        name: &str,
        message: impl Into<String>,
    ) -> Self {
        Self::Conflict {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            message: message.into(),
        }
    }

    /// Create a configuration error with the given message
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Classify a kube-rs error raised while operating on a dependent.
    ///
    /// 404 becomes [`Error::NotFound`], 409 becomes [`Error::Conflict`],
    /// everything else stays a [`Error::Kube`].
    pub fn from_kube(kind: DependentKind, namespace: &str, name: &str, err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 404 => Self::not_found(kind, namespace, name),
            kube::Error::Api(ae) if ae.code == 409 => {
                Self::conflict(kind, namespace, name, ae.message)
            }
            other => Self::Kube(other),
        }
    }

    /// Returns true for the not-found variant
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Check if this error is retryable
    ///
    /// Template, configuration, validation and serialization errors need a spec
    /// or deployment change. Conflicts and not-found races resolve on the next pass.
    /// Kubernetes errors are retried unless the API server rejected the request
    /// outright (4xx other than 409 and 429).
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube(source) => !matches!(
                source,
                kube::Error::Api(ae)
                    if (400..500).contains(&ae.code) && ae.code != 409 && ae.code != 429
            ),
            Error::NotFound { .. } => true,
            Error::Conflict { .. } => true,
            Error::Template(_) => false,
            Error::Configuration(_) => false,
            Error::Validation(_) => false,
            Error::Serialization(_) => false,
        }
    }
}
