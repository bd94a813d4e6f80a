//! The signed-in user's own account, plus the member picker search.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    engine::users::{ChangePasswordInput, UpdateProfileInput, UserSummary, UserView},
    error::{ApiError, ApiResult},
    middleware::auth::Actor,
    store::UserStats,
    AppState,
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserSearchParams {
    /// Case-insensitive substring of email or full name.
    pub search: Option<String>,
}

#[utoipa::path(
    get,
    path = "/users/me",
    tag = "Users",
    responses(
        (status = 200, description = "Current user", body = UserView),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_me(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<Json<UserView>> {
    Ok(Json(state.engine.current_user(actor.id)?.into()))
}

#[utoipa::path(
    put,
    path = "/users/me",
    tag = "Users",
    request_body = UpdateProfileInput,
    responses(
        (status = 200, description = "Profile updated", body = UserView),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_me(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<UpdateProfileInput>,
) -> ApiResult<Json<UserView>> {
    Ok(Json(state.engine.update_profile(actor.id, payload)?.into()))
}

#[utoipa::path(
    delete,
    path = "/users/me",
    tag = "Users",
    responses(
        (status = 204, description = "Account deactivated; authored records are kept"),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn deactivate_me(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<StatusCode> {
    state.engine.deactivate(actor.id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/users/me/password",
    tag = "Users",
    request_body = ChangePasswordInput,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Wrong current password or weak new password", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn change_password(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<ChangePasswordInput>,
) -> ApiResult<StatusCode> {
    state.engine.change_password(actor.id, payload)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/users/me/stats",
    tag = "Users",
    responses(
        (status = 200, description = "Activity counters", body = UserStats),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn my_stats(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<Json<UserStats>> {
    Ok(Json(state.engine.user_stats(actor.id)?))
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    params(UserSearchParams),
    responses(
        (status = 200, description = "Matching active users", body = Vec<UserSummary>),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn search_users(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<UserSearchParams>,
) -> ApiResult<Json<Vec<UserSummary>>> {
    Ok(Json(
        state
            .engine
            .search_active_users(actor.id, params.search.as_deref())?,
    ))
}
