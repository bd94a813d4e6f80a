//! Bearer token authentication.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::warn;
use uuid::Uuid;

use crate::engine::EngineError;
use crate::error::ApiError;
use crate::telemetry::metrics::{record_auth_attempt, AuthOutcome};
use crate::AppState;

/// The authenticated user a request acts as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub email: String,
}

fn reject(error: &str, code: &str) -> Response {
    ApiError::unauthorized(error, code).into_response()
}

/// Verifies the access token, then reloads the user so deactivation takes
/// effect on tokens that are still unexpired.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| reject("Missing authorization header", "MISSING_AUTH_HEADER"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| reject("Invalid authorization header format", "INVALID_AUTH_FORMAT"))?;

    let claims = state.jwt_config.verify_access_token(token).map_err(|e| {
        warn!(error = %e, "Rejected access token");
        record_auth_attempt("token", AuthOutcome::InvalidToken);
        reject("Invalid or expired token", "INVALID_TOKEN")
    })?;

    let user = match state.engine.current_user(claims.sub) {
        Ok(user) => user,
        Err(EngineError::NotFound) => {
            record_auth_attempt("token", AuthOutcome::InvalidToken);
            return Err(reject("Invalid or expired token", "INVALID_TOKEN"));
        }
        Err(e) => {
            let (status, body) = <(StatusCode, Json<ApiError>)>::from(e);
            return Err((status, body).into_response());
        }
    };

    if !user.is_active {
        warn!(user_id = %user.id, "Token presented for inactive account");
        record_auth_attempt("token", AuthOutcome::AccountInactive);
        return Err(reject("Account is inactive", "ACCOUNT_INACTIVE"));
    }

    req.extensions_mut().insert(Actor {
        id: user.id,
        email: user.email,
    });
    Ok(next.run(req).await)
}
