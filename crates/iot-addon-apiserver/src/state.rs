//! API server application state.
//!
//! This module defines the shared state that is available to all request handlers.

use crate::config::ApiServerConfig;
use crate::convert::Converter;
use crate::proxy::ServerProxy;

/// Shared application state for the API server.
#[derive(Clone)]
pub struct ApiState {
    /// Relay to the backing API server.
    pub proxy: ServerProxy,
    /// IoT <-> generic conversion for bodies and watch events.
    pub converter: Converter,
    /// Server configuration.
    pub config: ApiServerConfig,
}

impl ApiState {
    /// Create a new state, deriving the converter from the configured domain.
    #[must_use]
    pub fn new(proxy: ServerProxy, config: ApiServerConfig) -> Self {
        Self {
            proxy,
            converter: Converter::new(config.iot_domain.clone()),
            config,
        }
    }
}
