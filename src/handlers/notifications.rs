//! Notification inbox handlers.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    engine::notifications::NotificationListParams,
    error::{ApiError, ApiResult},
    middleware::auth::Actor,
    models::Notification,
    pagination::{PaginatedResponse, PaginationParams},
    AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct MarkAllReadResponse {
    #[schema(example = 3)]
    pub updated: usize,
}

#[utoipa::path(
    get,
    path = "/notifications",
    tag = "Notifications",
    params(NotificationListParams, PaginationParams),
    responses(
        (status = 200, description = "Notifications, newest first", body = PaginatedResponse<Notification>),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<NotificationListParams>,
    Query(page): Query<PaginationParams>,
) -> ApiResult<Json<PaginatedResponse<Notification>>> {
    Ok(Json(state.engine.list_notifications(actor.id, &params, &page)?))
}

#[utoipa::path(
    patch,
    path = "/notifications/{notification_id}/read",
    tag = "Notifications",
    params(("notification_id" = Uuid, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification marked read", body = Notification),
        (status = 404, description = "Notification not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(notification_id): Path<Uuid>,
) -> ApiResult<Json<Notification>> {
    Ok(Json(state.engine.mark_read(actor.id, notification_id)?))
}

#[utoipa::path(
    post,
    path = "/notifications/read-all",
    tag = "Notifications",
    responses(
        (status = 200, description = "Every unread notification marked read", body = MarkAllReadResponse),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<Json<MarkAllReadResponse>> {
    let updated = state.engine.mark_all_read(actor.id)?;
    Ok(Json(MarkAllReadResponse { updated }))
}
