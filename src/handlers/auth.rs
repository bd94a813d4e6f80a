//! Registration and login.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

use crate::{
    engine::{
        users::{LoginInput, RegisterInput, UserView},
        EngineError,
    },
    error::{ApiError, ApiResult},
    models::User,
    telemetry::{record_auth_attempt, AuthOutcome},
    AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserView,
    #[schema(example = "eyJhbGciOiJFZERTQSIsInR5cCI6IkpXVCJ9...")]
    pub access_token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    /// Seconds until the access token expires.
    #[schema(example = 3600)]
    pub expires_in: i64,
}

fn issue_token(state: &AppState, user: User) -> ApiResult<AuthResponse> {
    let access_token = state
        .jwt_config
        .generate_access_token(user.id, &user.email)
        .map_err(|e| {
            error!(error = %e, user_id = %user.id, "Failed to sign access token");
            ApiError::internal("Token generation failed", "TOKEN_GENERATION_ERROR")
        })?;

    Ok(AuthResponse {
        user: user.into(),
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt_config.access_token_expiry,
    })
}

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Authentication",
    request_body = RegisterInput,
    responses(
        (status = 201, description = "Registration successful", body = AuthResponse),
        (status = 400, description = "Validation error or email already registered", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterInput>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let user = state.engine.register(payload)?;
    record_auth_attempt("register", AuthOutcome::Success);
    Ok((StatusCode::CREATED, Json(issue_token(&state, user)?)))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Authentication",
    request_body = LoginInput,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ApiError),
        (status = 403, description = "Account is inactive", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginInput>,
) -> ApiResult<Json<AuthResponse>> {
    let user = state
        .engine
        .authenticate(&payload.email, &payload.password)
        .inspect_err(|e| match e {
            EngineError::InvalidCredentials => {
                record_auth_attempt("login", AuthOutcome::InvalidCredentials)
            }
            EngineError::AccountInactive => {
                record_auth_attempt("login", AuthOutcome::AccountInactive)
            }
            _ => {}
        })?;

    record_auth_attempt("login", AuthOutcome::Success);
    Ok(Json(issue_token(&state, user)?))
}
