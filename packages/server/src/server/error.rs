//! HTTP error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::domains::auth::AuthError;

/// An error rendered as `{"error": message}` with a status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized")
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "something went wrong")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidEmail | AuthError::InvalidOtp | AuthError::OtpExpired => {
                Self::bad_request(err.to_string())
            }
            AuthError::UserExists => Self::new(StatusCode::CONFLICT, err.to_string()),
            AuthError::UserNotFound => Self::new(StatusCode::NOT_FOUND, err.to_string()),
            AuthError::Distribute(_) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            AuthError::IssueToken(_) | AuthError::Storage(_) => {
                error!(error = ?err, "request failed");
                Self::internal()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_status_codes() {
        assert_eq!(
            ApiError::from(AuthError::InvalidEmail).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(AuthError::UserExists).status,
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(AuthError::UserNotFound).status,
            StatusCode::NOT_FOUND
        );

        let expired = ApiError::from(AuthError::OtpExpired);
        assert_eq!(expired.status, StatusCode::BAD_REQUEST);
        assert_eq!(expired.message, "otp code expired");
    }

    #[test]
    fn test_storage_errors_are_not_leaked() {
        let err = ApiError::from(AuthError::Storage(anyhow::anyhow!("password=hunter2")));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "something went wrong");
    }
}
