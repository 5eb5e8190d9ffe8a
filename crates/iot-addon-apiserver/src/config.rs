//! API server configuration.

use std::time::Duration;

use iot_addon_core::DEFAULT_IOT_DOMAIN;
use serde::Deserialize;

/// Configuration for the aggregated API server.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiServerConfig {
    /// Listen address (e.g., "0.0.0.0:8080").
    #[serde(default = "ApiServerConfig::default_listen_addr")]
    pub listen_addr: String,

    /// Base address of the backing Kubernetes API server.
    #[serde(default = "ApiServerConfig::default_apiserver_url")]
    pub apiserver_url: String,

    /// API group of the IoT resources.
    #[serde(default = "ApiServerConfig::default_iot_domain")]
    pub iot_domain: String,

    /// Namespace that devices created through the `Node` surface land in.
    #[serde(default = "ApiServerConfig::default_device_namespace")]
    pub device_namespace: String,

    /// Request timeout in seconds.
    #[serde(default = "ApiServerConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Maximum request body size in bytes.
    #[serde(default = "ApiServerConfig::default_max_body")]
    pub max_body_bytes: usize,
}

impl ApiServerConfig {
    fn default_listen_addr() -> String {
        "0.0.0.0:8080".to_string()
    }

    fn default_apiserver_url() -> String {
        "http://127.0.0.1:8001".to_string()
    }

    fn default_iot_domain() -> String {
        DEFAULT_IOT_DOMAIN.to_string()
    }

    fn default_device_namespace() -> String {
        "default".to_string()
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    const fn default_max_body() -> usize {
        1024 * 1024 // 1 MB
    }

    /// Load configuration from environment variables, keeping defaults for
    /// unset or unparsable values.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("LISTEN_ADDR") {
            config.listen_addr = val;
        }
        if let Ok(val) = std::env::var("APISERVER_URL") {
            config.apiserver_url = val;
        }
        if let Ok(val) = std::env::var("IOT_DOMAIN") {
            config.iot_domain = val;
        }
        if let Ok(val) = std::env::var("DEVICE_NAMESPACE") {
            config.device_namespace = val;
        }
        if let Ok(val) = std::env::var("REQUEST_TIMEOUT_SECONDS") {
            if let Ok(n) = val.parse() {
                config.request_timeout_seconds = n;
            }
        }
        if let Ok(val) = std::env::var("MAX_BODY_BYTES") {
            if let Ok(n) = val.parse() {
                config.max_body_bytes = n;
            }
        }

        config
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: Self::default_listen_addr(),
            apiserver_url: Self::default_apiserver_url(),
            iot_domain: Self::default_iot_domain(),
            device_namespace: Self::default_device_namespace(),
            request_timeout_seconds: Self::default_request_timeout(),
            max_body_bytes: Self::default_max_body(),
        }
    }
}
