//! Types for the controller crate.

use std::time::Duration;

use iot_addon_core::DEFAULT_IOT_DOMAIN;

use crate::error::{ControllerError, Result};
use crate::retry::RetryConfig;

/// Configuration for the controller.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// API group of the IoT resources.
    pub iot_domain: String,
    /// Reconnect policy for the watch streams.
    pub retry: RetryConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            iot_domain: DEFAULT_IOT_DOMAIN.to_string(),
            retry: RetryConfig::default(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Config`] when a numeric variable does not parse.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("IOT_DOMAIN") {
            config.iot_domain = val;
        }
        if let Some(n) = parse_var::<u32>("WATCH_MAX_RETRIES")? {
            config.retry.max_attempts = n;
        }
        if let Some(ms) = parse_var::<u64>("WATCH_INITIAL_BACKOFF_MS")? {
            config.retry.initial_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>("WATCH_MAX_BACKOFF_MS")? {
            config.retry.max_delay = Duration::from_millis(ms);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for contradictions.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Config`] for an empty domain or an initial
    /// backoff larger than the maximum.
    pub fn validate(&self) -> Result<()> {
        if self.iot_domain.is_empty() {
            return Err(ControllerError::Config("IOT_DOMAIN must not be empty".into()));
        }
        if self.retry.initial_delay > self.retry.max_delay {
            return Err(ControllerError::Config(format!(
                "initial backoff {:?} exceeds max backoff {:?}",
                self.retry.initial_delay, self.retry.max_delay
            )));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(val) => val
            .parse()
            .map(Some)
            .map_err(|_| ControllerError::Config(format!("{name} is not a valid number: {val}"))),
        Err(_) => Ok(None),
    }
}

/// What a reconcile pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Pods created.
    pub created: usize,
    /// Pods deleted.
    pub deleted: usize,
    /// (daemon set, device) pairs that already had their pod.
    pub already_satisfied: usize,
}

/// Whether a consumer keeps reading its stream after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Read the next event.
    Continue,
    /// Drop the stream.
    Terminate,
}
