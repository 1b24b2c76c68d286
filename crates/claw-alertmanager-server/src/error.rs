//! Error types for the HTTP API.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use claw_alertmanager::{AlertmanagerError, ErrorType};
use thiserror::Error;
use tracing::error;

use crate::types::Envelope;

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned by the HTTP API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// An error from the alertmanager core.
    #[error(transparent)]
    Core(#[from] AlertmanagerError),

    /// Failed to bind to the specified address.
    #[error("failed to bind to {0}: {1}")]
    BindFailed(std::net::SocketAddr, std::io::Error),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Shorthand for a client input error.
    pub fn bad_data(reason: impl Into<String>) -> Self {
        Self::Core(AlertmanagerError::bad_data(reason))
    }

    /// Wire classification of the error.
    #[must_use]
    pub const fn error_type(&self) -> ErrorType {
        match self {
            Self::Core(err) => err.error_type(),
            Self::BindFailed(..) | Self::Internal(_) => ErrorType::Internal,
        }
    }

    /// HTTP status code for the error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self.error_type() {
            ErrorType::BadData => StatusCode::BAD_REQUEST,
            ErrorType::NotFound => StatusCode::NOT_FOUND,
            ErrorType::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_type = self.error_type();
        let message = self.to_string();
        error!(error_type = %error_type, error = %message, "API error");

        (
            self.status_code(),
            Json(Envelope::error(error_type.as_str(), message)),
        )
            .into_response()
    }
}
