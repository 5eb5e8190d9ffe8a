//! Error types for the controller crate.

use iot_addon_core::TranslationError;
use thiserror::Error;

/// Errors that can occur while reconciling devices and daemon sets.
#[derive(Error, Debug)]
pub enum ControllerError {
    /// Kubernetes API error.
    #[error("Kubernetes API error: {0}")]
    KubeApi(#[from] kube::Error),

    /// A stored object could not be translated into its domain form.
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// JSON encoding or decoding failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Pod creation failed.
    #[error("Pod creation failed: {0}")]
    PodCreationFailed(String),

    /// Pod deletion failed.
    #[error("Pod deletion failed: {0}")]
    PodDeletionFailed(String),

    /// The event stream closed or reported an error, and could not be reopened.
    #[error("Watch stream terminated: {0}")]
    StreamTerminated(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A consumer task panicked or was aborted.
    #[error("Task failed: {0}")]
    TaskFailed(String),
}

/// A specialized Result type for controller operations.
pub type Result<T> = std::result::Result<T, ControllerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translation_errors_keep_their_path() {
        let err: ControllerError = TranslationError::missing("spec.template").into();
        assert!(err.to_string().contains("spec.template"));
    }
}
