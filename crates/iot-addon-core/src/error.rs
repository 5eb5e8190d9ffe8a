//! Translation error types.
//!
//! Every failure carries the path of the field that could not be translated,
//! so callers at the aggregation boundary can report exactly what was wrong.

use thiserror::Error;

/// A result type using `TranslationError`.
pub type Result<T> = std::result::Result<T, TranslationError>;

/// Errors that can occur while translating between resource representations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TranslationError {
    /// A required field is absent from the document.
    #[error("missing required field: {path}")]
    MissingField {
        /// Dotted path of the missing field (e.g. `metadata.name`).
        path: String,
    },

    /// A field is present but has the wrong shape.
    #[error("type mismatch at {path}: expected {expected}: {message}")]
    TypeMismatch {
        /// Dotted path of the offending field.
        path: String,
        /// Description of the expected shape.
        expected: &'static str,
        /// Decoder message.
        message: String,
    },

    /// The document describes a different resource kind.
    #[error("kind mismatch: expected {expected}, found {found}")]
    KindMismatch {
        /// The kind the caller asked for.
        expected: String,
        /// The kind found in the document.
        found: String,
    },

    /// The input is not a JSON object at all.
    #[error("malformed document: {0}")]
    Malformed(String),
}

impl TranslationError {
    /// Create a `MissingField` error.
    #[must_use]
    pub fn missing(path: impl Into<String>) -> Self {
        Self::MissingField { path: path.into() }
    }

    /// Create a `TypeMismatch` error.
    #[must_use]
    pub fn mismatch(path: impl Into<String>, expected: &'static str, message: impl Into<String>) -> Self {
        Self::TypeMismatch {
            path: path.into(),
            expected,
            message: message.into(),
        }
    }

    /// Prefix the field path with the location of an enclosing value.
    #[must_use]
    pub fn within(self, prefix: &str) -> Self {
        match self {
            Self::MissingField { path } => Self::MissingField {
                path: format!("{prefix}.{path}"),
            },
            Self::TypeMismatch { path, expected, message } => Self::TypeMismatch {
                path: format!("{prefix}.{path}"),
                expected,
                message,
            },
            other => other,
        }
    }

    /// The field path the error refers to, if any.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::MissingField { path } | Self::TypeMismatch { path, .. } => Some(path),
            Self::KindMismatch { .. } => Some("kind"),
            Self::Malformed(_) => None,
        }
    }
}
