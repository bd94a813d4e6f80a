//! Task handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

use crate::{
    engine::tasks::{ChangeStatusInput, CreateTaskInput, TaskListParams, UpdateTaskInput},
    error::{ApiError, ApiResult},
    middleware::auth::Actor,
    models::Task,
    pagination::{PaginatedResponse, PaginationParams},
    AppState,
};

#[utoipa::path(
    get,
    path = "/tasks",
    tag = "Tasks",
    params(TaskListParams, PaginationParams),
    responses(
        (status = 200, description = "Tasks across every visible project", body = PaginatedResponse<Task>),
        (status = 400, description = "Unknown status or priority filter", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<TaskListParams>,
    Query(page): Query<PaginationParams>,
) -> ApiResult<Json<PaginatedResponse<Task>>> {
    Ok(Json(state.engine.list_tasks(actor.id, None, &params, &page)?))
}

#[utoipa::path(
    get,
    path = "/projects/{project_id}/tasks",
    tag = "Tasks",
    params(("project_id" = Uuid, Path, description = "Project ID"), TaskListParams, PaginationParams),
    responses(
        (status = 200, description = "Tasks in the project", body = PaginatedResponse<Task>),
        (status = 404, description = "Project not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_project_tasks(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(project_id): Path<Uuid>,
    Query(params): Query<TaskListParams>,
    Query(page): Query<PaginationParams>,
) -> ApiResult<Json<PaginatedResponse<Task>>> {
    Ok(Json(
        state
            .engine
            .list_tasks(actor.id, Some(project_id), &params, &page)?,
    ))
}

#[utoipa::path(
    post,
    path = "/projects/{project_id}/tasks",
    tag = "Tasks",
    params(("project_id" = Uuid, Path, description = "Project ID")),
    request_body = CreateTaskInput,
    responses(
        (status = 201, description = "Task created", body = Task),
        (status = 400, description = "Validation error, including an assignee outside the project", body = ApiError),
        (status = 404, description = "Project not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_task(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<CreateTaskInput>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let task = state.engine.create_task(actor.id, project_id, payload)?;
    Ok((StatusCode::CREATED, Json(task)))
}

#[utoipa::path(
    get,
    path = "/tasks/{task_id}",
    tag = "Tasks",
    params(("task_id" = Uuid, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task", body = Task),
        (status = 404, description = "Task not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_task(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<Task>> {
    Ok(Json(state.engine.get_task(actor.id, task_id)?))
}

#[utoipa::path(
    put,
    path = "/tasks/{task_id}",
    tag = "Tasks",
    params(("task_id" = Uuid, Path, description = "Task ID")),
    request_body = UpdateTaskInput,
    responses(
        (status = 200, description = "Task updated", body = Task),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 404, description = "Task not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_task(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<UpdateTaskInput>,
) -> ApiResult<Json<Task>> {
    Ok(Json(state.engine.update_task(actor.id, task_id, payload)?))
}

#[utoipa::path(
    patch,
    path = "/tasks/{task_id}/status",
    tag = "Tasks",
    params(("task_id" = Uuid, Path, description = "Task ID")),
    request_body = ChangeStatusInput,
    responses(
        (status = 200, description = "Status changed", body = Task),
        (status = 400, description = "Unknown status or transition not allowed", body = ApiError),
        (status = 404, description = "Task not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn change_status(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<ChangeStatusInput>,
) -> ApiResult<Json<Task>> {
    Ok(Json(
        state
            .engine
            .change_status(actor.id, task_id, &payload.status)?,
    ))
}

#[utoipa::path(
    delete,
    path = "/tasks/{task_id}",
    tag = "Tasks",
    params(("task_id" = Uuid, Path, description = "Task ID")),
    responses(
        (status = 204, description = "Task and its comments deleted"),
        (status = 404, description = "Task not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.engine.delete_task(actor.id, task_id)?;
    Ok(StatusCode::NO_CONTENT)
}
