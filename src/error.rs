//! Shared error handling utilities.

use axum::{http::StatusCode, Json};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

use crate::engine::{EngineError, FieldIssue};

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    pub error: String,
    pub code: String,
    /// Present on validation failures, one entry per offending field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issues: Option<Vec<FieldIssue>>,
}

impl ApiError {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            issues: None,
        }
    }

    pub fn validation(issues: Vec<FieldIssue>) -> (StatusCode, Json<Self>) {
        let mut body = Self::new("Validation failed", "VALIDATION_ERROR");
        body.issues = Some(issues);
        (StatusCode::BAD_REQUEST, Json(body))
    }

    pub fn unauthorized(
        error: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (StatusCode::UNAUTHORIZED, Json(Self::new(error, code)))
    }

    pub fn forbidden(
        error: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (StatusCode::FORBIDDEN, Json(Self::new(error, code)))
    }

    pub fn not_found(
        error: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (StatusCode::NOT_FOUND, Json(Self::new(error, code)))
    }

    pub fn internal(error: impl Into<String>, code: impl Into<String>) -> (StatusCode, Json<Self>) {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(Self::new(error, code)),
        )
    }

    pub fn db_error() -> (StatusCode, Json<Self>) {
        Self::internal("Database error", "DB_ERROR")
    }
}

pub type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

impl From<EngineError> for (StatusCode, Json<ApiError>) {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound => ApiError::not_found("Resource not found", "NOT_FOUND"),
            EngineError::Validation(issues) => ApiError::validation(issues),
            EngineError::InvalidCredentials => {
                ApiError::unauthorized("Invalid email or password", "INVALID_CREDENTIALS")
            }
            EngineError::AccountInactive => {
                ApiError::forbidden("Account is inactive", "ACCOUNT_INACTIVE")
            }
            EngineError::Storage(e) => {
                error!(error = %e, "Storage failure");
                ApiError::db_error()
            }
            EngineError::Internal(message) => {
                error!(error = %message, "Internal failure");
                ApiError::internal("Internal server error", "INTERNAL_ERROR")
            }
        }
    }
}
