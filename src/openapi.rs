//! OpenAPI documentation, served as JSON at `/api-docs/openapi.json`.

use axum::{routing::get, Json, Router};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Taskboard API",
        version = "1.0.0",
        description = "Multi-tenant project and task tracker.\n\n\
        ## Access model\n\
        A project is visible to its owner and its members. Tasks and comments \
        inherit visibility from their project. Anything outside that boundary \
        answers 404, exactly like a resource that does not exist.\n\n\
        ## Authentication\n\
        1. Register or login to get an access token\n\
        2. Include the token in requests: `Authorization: Bearer <token>`",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "/", description = "Current server")
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Authentication", description = "Registration and login"),
        (name = "Users", description = "The signed-in user's account"),
        (name = "Projects", description = "Projects the caller owns or belongs to"),
        (name = "Members", description = "Project rosters"),
        (name = "Tasks", description = "Tasks inside visible projects"),
        (name = "Comments", description = "Task discussion"),
        (name = "Notifications", description = "Assignment and completion notices")
    ),
    paths(
        crate::handlers::health::health_check_simple,
        crate::handlers::health::health_check,
        crate::handlers::health::ready_check,
        crate::handlers::health::live_check,

        crate::handlers::auth::register,
        crate::handlers::auth::login,

        crate::handlers::users::get_me,
        crate::handlers::users::update_me,
        crate::handlers::users::deactivate_me,
        crate::handlers::users::change_password,
        crate::handlers::users::my_stats,
        crate::handlers::users::search_users,

        crate::handlers::projects::create_project,
        crate::handlers::projects::list_projects,
        crate::handlers::projects::get_project,
        crate::handlers::projects::update_project,
        crate::handlers::projects::delete_project,

        crate::handlers::members::list_members,
        crate::handlers::members::add_member,
        crate::handlers::members::remove_member,

        crate::handlers::tasks::list_tasks,
        crate::handlers::tasks::list_project_tasks,
        crate::handlers::tasks::create_task,
        crate::handlers::tasks::get_task,
        crate::handlers::tasks::update_task,
        crate::handlers::tasks::change_status,
        crate::handlers::tasks::delete_task,

        crate::handlers::comments::list_comments,
        crate::handlers::comments::add_comment,
        crate::handlers::comments::delete_comment,

        crate::handlers::notifications::list_notifications,
        crate::handlers::notifications::mark_read,
        crate::handlers::notifications::mark_all_read,
    ),
    components(
        schemas(
            crate::error::ApiError,
            crate::engine::FieldIssue,
            crate::pagination::PaginationMeta,
            crate::models::TaskStatus,
            crate::models::TaskPriority,
            crate::models::ProjectStatus,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Access token from /auth/login or /auth/register.\n\
                            Send as: `Authorization: Bearer <token>`",
                        ))
                        .build(),
                ),
            );
        }
    }
}

pub fn docs_router() -> Router {
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDoc::openapi()) }),
    )
}
