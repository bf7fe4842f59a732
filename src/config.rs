//! Operator configuration
//!
//! Every setting is a command-line flag with an environment variable fallback,
//! so the operator can be configured from a Deployment's `env` block.

use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::router::BackoffConfig;
use crate::Error;

/// Field manager recorded on objects the operator writes
pub const DEFAULT_FIELD_MANAGER: &str = "ingress-manager";

/// Log output format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human-readable lines
    Text,
}

/// ingress-manager - reconciles App resources into a Deployment, Service and Ingress
#[derive(Parser, Debug, Clone)]
#[command(name = "ingress-manager", version, about, long_about = None)]
pub struct OperatorConfig {
    /// Print the App CRD manifest and exit
    #[arg(long)]
    pub crd: bool,

    /// Install or update the App CRD before starting the controller
    #[arg(long, env = "INSTALL_CRD")]
    pub install_crd: bool,

    /// Only watch Apps in this namespace (all namespaces when unset)
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// Maximum number of Apps reconciled at the same time
    #[arg(long, env = "RECONCILE_CONCURRENCY", default_value_t = 4)]
    pub concurrency: u16,

    /// Requeue delay after the first failed pass, in milliseconds
    #[arg(long, env = "BACKOFF_INITIAL_MS", default_value_t = 500)]
    pub backoff_initial_ms: u64,

    /// Upper bound on the requeue delay, in seconds
    #[arg(long, env = "BACKOFF_MAX_SECS", default_value_t = 300)]
    pub backoff_max_secs: u64,

    /// Field manager name used for create and replace calls
    #[arg(long, env = "FIELD_MANAGER", default_value = DEFAULT_FIELD_MANAGER)]
    pub field_manager: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,
}

impl OperatorConfig {
    /// Reject settings the controller cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.concurrency == 0 {
            return Err(Error::configuration("concurrency must be at least 1"));
        }
        if self.backoff_initial_ms == 0 {
            return Err(Error::configuration("initial backoff must be non-zero"));
        }
        if self.backoff_initial() > self.backoff_max() {
            return Err(Error::configuration(format!(
                "initial backoff {}ms exceeds max backoff {}s",
                self.backoff_initial_ms, self.backoff_max_secs
            )));
        }
        if self.field_manager.trim().is_empty() {
            return Err(Error::configuration("field manager must not be empty"));
        }
        Ok(())
    }

    fn backoff_initial(&self) -> Duration {
        Duration::from_millis(self.backoff_initial_ms)
    }

    fn backoff_max(&self) -> Duration {
        Duration::from_secs(self.backoff_max_secs)
    }

    /// Backoff settings for the router's error policy
    pub fn backoff(&self) -> BackoffConfig {
        BackoffConfig {
            initial_delay: self.backoff_initial(),
            max_delay: self.backoff_max(),
            ..Default::default()
        }
    }
}
