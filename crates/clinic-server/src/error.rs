//! API errors and their HTTP rendering.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use clinic_core::ClinicError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Clinic(#[from] ClinicError),

    #[error("Missing or invalid API key")]
    Unauthorized,

    #[error("Malformed request: {0}")]
    BadRequest(String),

    #[error("Timed out waiting for storage")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Body of every failed response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub code: &'static str,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Clinic(e) => match e {
                ClinicError::Validation(_)
                | ClinicError::MissingCatalogId(_)
                | ClinicError::InsufficientBalance { .. } => StatusCode::BAD_REQUEST,
                ClinicError::NotFound(_) => StatusCode::NOT_FOUND,
                ClinicError::Conflict(_) => StatusCode::CONFLICT,
                ClinicError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Clinic(e) => e.code(),
            ApiError::Unauthorized => "unauthorized",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Timeout => "timeout",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = if status.is_server_error() {
            tracing::error!(code = self.code(), "Request failed: {}", self);
            if matches!(self, ApiError::Timeout) {
                self.to_string()
            } else {
                "Internal server error".to_string()
            }
        } else {
            tracing::debug!(code = self.code(), "Request rejected: {}", self);
            match &self {
                ApiError::Clinic(ClinicError::Validation(message)) => message.clone(),
                _ => self.to_string(),
            }
        };

        let body = ErrorBody {
            success: false,
            error,
            code: self.code(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinic_core::DbError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::Clinic(ClinicError::Validation("x".into())), 400),
            (ApiError::Clinic(ClinicError::MissingCatalogId("B12".into())), 400),
            (
                ApiError::Clinic(ClinicError::InsufficientBalance {
                    package_id: "p1".into(),
                    available: 1.0,
                    requested: 2.0,
                }),
                400,
            ),
            (ApiError::Clinic(ClinicError::NotFound("x".into())), 404),
            (ApiError::Clinic(ClinicError::Conflict("x".into())), 409),
            (
                ApiError::Clinic(ClinicError::Database(DbError::Constraint("x".into()))),
                500,
            ),
            (ApiError::Unauthorized, 401),
            (ApiError::Timeout, 504),
            (ApiError::Internal("disk".into()), 500),
        ];
        for (error, status) in cases {
            assert_eq!(error.status().as_u16(), status, "{}", error);
        }
    }

    #[test]
    fn test_codes_follow_core() {
        let error = ApiError::from(ClinicError::Conflict("dup".into()));
        assert_eq!(error.code(), "conflict");
        assert_eq!(ApiError::Timeout.code(), "timeout");
    }
}
