//! Task comment handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

use crate::{
    engine::comments::{AddCommentInput, CommentView},
    error::{ApiError, ApiResult},
    middleware::auth::Actor,
    AppState,
};

#[utoipa::path(
    get,
    path = "/tasks/{task_id}/comments",
    tag = "Comments",
    params(("task_id" = Uuid, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Comments, oldest first", body = Vec<CommentView>),
        (status = 404, description = "Task not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_comments(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<Vec<CommentView>>> {
    Ok(Json(state.engine.list_comments(actor.id, task_id)?))
}

#[utoipa::path(
    post,
    path = "/tasks/{task_id}/comments",
    tag = "Comments",
    params(("task_id" = Uuid, Path, description = "Task ID")),
    request_body = AddCommentInput,
    responses(
        (status = 201, description = "Comment added", body = CommentView),
        (status = 400, description = "Empty comment", body = ApiError),
        (status = 404, description = "Task not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn add_comment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<AddCommentInput>,
) -> ApiResult<(StatusCode, Json<CommentView>)> {
    let comment = state.engine.add_comment(actor.id, task_id, payload)?;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[utoipa::path(
    delete,
    path = "/comments/{comment_id}",
    tag = "Comments",
    params(("comment_id" = Uuid, Path, description = "Comment ID")),
    responses(
        (status = 204, description = "Comment deleted"),
        (status = 404, description = "Comment not found or not authored by the caller", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(comment_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.engine.delete_comment(actor.id, comment_id)?;
    Ok(StatusCode::NO_CONTENT)
}
