//! Project roster handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

use crate::{
    engine::members::{AddMemberInput, MemberView},
    error::{ApiError, ApiResult},
    middleware::auth::Actor,
    AppState,
};

#[utoipa::path(
    get,
    path = "/projects/{project_id}/members",
    tag = "Members",
    params(("project_id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project members", body = Vec<MemberView>),
        (status = 404, description = "Project not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_members(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Vec<MemberView>>> {
    Ok(Json(state.engine.list_members(actor.id, project_id)?))
}

#[utoipa::path(
    post,
    path = "/projects/{project_id}/members",
    tag = "Members",
    params(("project_id" = Uuid, Path, description = "Project ID")),
    request_body = AddMemberInput,
    responses(
        (status = 201, description = "Member added", body = MemberView),
        (status = 400, description = "Unknown user or already a member", body = ApiError),
        (status = 404, description = "Project not found or caller is not the owner", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn add_member(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<AddMemberInput>,
) -> ApiResult<(StatusCode, Json<MemberView>)> {
    let member = state.engine.add_member(actor.id, project_id, payload)?;
    Ok((StatusCode::CREATED, Json(member)))
}

#[utoipa::path(
    delete,
    path = "/projects/{project_id}/members/{member_id}",
    tag = "Members",
    params(
        ("project_id" = Uuid, Path, description = "Project ID"),
        ("member_id" = Uuid, Path, description = "Membership ID")
    ),
    responses(
        (status = 204, description = "Member removed"),
        (status = 404, description = "Membership not found in this project", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path((project_id, member_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    state.engine.remove_member(actor.id, project_id, member_id)?;
    Ok(StatusCode::NO_CONTENT)
}
