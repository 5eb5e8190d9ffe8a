//! Proxy and API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use iot_addon_core::TranslationError;
use serde::Serialize;
use thiserror::Error;

/// Errors raised while relaying a request to the backing API server.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The upstream HTTP exchange failed.
    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A watched object could not be converted.
    #[error("translation error: {0}")]
    Translation(#[from] TranslationError),
}

/// API error type that implements `IntoResponse`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request body is not a valid document.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The backing API server could not be reached or returned garbage.
    #[error("bad gateway: {0}")]
    BadGateway(String),

    /// The backing API server is not ready to serve.
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

/// Error details.
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl ApiError {
    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get the error code string for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::BadGateway(_) => "bad_gateway",
            Self::Unavailable(_) => "unavailable",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };

        (status, Json(body)).into_response()
    }
}

impl From<ProxyError> for ApiError {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::Translation(e) => Self::BadGateway(format!("undecodable upstream object: {e}")),
            ProxyError::Http(e) => Self::BadGateway(format!("upstream request failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(ApiError::BadRequest("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::BadGateway("x".into()).status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(ApiError::Unavailable("x".into()).status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ApiError::Unavailable("x".into()).code(), "unavailable");
    }

    #[test]
    fn proxy_errors_map_to_bad_gateway() {
        let err: ApiError = ProxyError::Translation(TranslationError::missing("metadata")).into();
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert!(err.to_string().contains("metadata"));
    }
}
