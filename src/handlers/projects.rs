//! Project handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

use crate::{
    engine::projects::{
        CreateProjectInput, ProjectDetail, ProjectListParams, ProjectWithRole, UpdateProjectInput,
    },
    error::{ApiError, ApiResult},
    middleware::auth::Actor,
    models::Project,
    pagination::{PaginatedResponse, PaginationParams},
    AppState,
};

#[utoipa::path(
    post,
    path = "/projects",
    tag = "Projects",
    request_body = CreateProjectInput,
    responses(
        (status = 201, description = "Project created; the caller is its owner", body = Project),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_project(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<CreateProjectInput>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let project = state.engine.create_project(actor.id, payload)?;
    Ok((StatusCode::CREATED, Json(project)))
}

#[utoipa::path(
    get,
    path = "/projects",
    tag = "Projects",
    params(ProjectListParams, PaginationParams),
    responses(
        (status = 200, description = "Projects the caller owns or belongs to", body = PaginatedResponse<ProjectWithRole>),
        (status = 400, description = "Unknown status filter", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_projects(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<ProjectListParams>,
    Query(page): Query<PaginationParams>,
) -> ApiResult<Json<PaginatedResponse<ProjectWithRole>>> {
    Ok(Json(state.engine.list_projects(actor.id, &params, &page)?))
}

#[utoipa::path(
    get,
    path = "/projects/{project_id}",
    tag = "Projects",
    params(("project_id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project with the caller's role and the roster", body = ProjectDetail),
        (status = 404, description = "Project not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_project(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<ProjectDetail>> {
    Ok(Json(state.engine.get_project(actor.id, project_id)?))
}

#[utoipa::path(
    put,
    path = "/projects/{project_id}",
    tag = "Projects",
    params(("project_id" = Uuid, Path, description = "Project ID")),
    request_body = UpdateProjectInput,
    responses(
        (status = 200, description = "Project updated", body = Project),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 404, description = "Project not found or caller is not the owner", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_project(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<UpdateProjectInput>,
) -> ApiResult<Json<Project>> {
    Ok(Json(state.engine.update_project(actor.id, project_id, payload)?))
}

#[utoipa::path(
    delete,
    path = "/projects/{project_id}",
    tag = "Projects",
    params(("project_id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 204, description = "Project and everything in it deleted"),
        (status = 404, description = "Project not found or caller is not the owner", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_project(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.engine.delete_project(actor.id, project_id)?;
    Ok(StatusCode::NO_CONTENT)
}
