//! Taskboard - multi-tenant project and task tracking with ownership- and
//! membership-scoped access control.

pub mod access;
pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod helpers;
pub mod middleware;
pub mod models;
pub mod openapi;
pub mod pagination;
pub mod schema;
pub mod store;
pub mod telemetry;
pub mod workflow;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, patch, post},
    Router,
};

use diesel::r2d2::{self, ConnectionManager};
use diesel::PgConnection;
use std::sync::Arc;
use std::time::Duration;

use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use auth::jwt::JwtConfig;
use auth::password::PasswordPolicy;
use engine::Engine;
use error::ApiError;
use middleware::{metrics::metrics_middleware, request_id::request_id_middleware};
use store::Store;
use telemetry::MetricsState;

pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub jwt_config: Arc<JwtConfig>,
    pub metrics: MetricsState,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, jwt_config: JwtConfig, config: &Config) -> Self {
        let password_policy = PasswordPolicy::from_settings(
            config.security.min_password_length,
            config.security.require_password_complexity,
        );
        let engine = Engine::new(store)
            .with_transition_policy(config.tasks.transitions)
            .with_password_policy(password_policy, config.security.password_hash_cost);

        Self {
            engine,
            jwt_config: Arc::new(jwt_config),
            metrics: MetricsState::new(config.telemetry.metrics_enabled),
        }
    }
}

pub fn create_router(state: AppState, config: &config::Config) -> Router {
    let cors = build_cors_layer(config);
    let body_limit = RequestBodyLimitLayer::new(config.server.max_body_size);

    #[allow(deprecated)]
    let timeout = TimeoutLayer::new(Duration::from_secs(config.server.request_timeout_secs));

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let metrics_state = state.metrics.clone();
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check_simple))
        .route("/health/status", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::ready_check))
        .route("/health/live", get(handlers::health::live_check))
        .route(
            "/metrics",
            get(telemetry::metrics::metrics_handler).with_state(metrics_state),
        )
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route(
            "/users/me",
            get(handlers::users::get_me)
                .put(handlers::users::update_me)
                .delete(handlers::users::deactivate_me),
        )
        .route(
            "/users/me/password",
            axum::routing::put(handlers::users::change_password),
        )
        .route("/users/me/stats", get(handlers::users::my_stats))
        .route("/users", get(handlers::users::search_users))
        .route(
            "/projects",
            get(handlers::projects::list_projects).post(handlers::projects::create_project),
        )
        .route(
            "/projects/{project_id}",
            get(handlers::projects::get_project)
                .put(handlers::projects::update_project)
                .delete(handlers::projects::delete_project),
        )
        .route(
            "/projects/{project_id}/members",
            get(handlers::members::list_members).post(handlers::members::add_member),
        )
        .route(
            "/projects/{project_id}/members/{member_id}",
            delete(handlers::members::remove_member),
        )
        .route(
            "/projects/{project_id}/tasks",
            get(handlers::tasks::list_project_tasks).post(handlers::tasks::create_task),
        )
        .route("/tasks", get(handlers::tasks::list_tasks))
        .route(
            "/tasks/{task_id}",
            get(handlers::tasks::get_task)
                .put(handlers::tasks::update_task)
                .delete(handlers::tasks::delete_task),
        )
        .route("/tasks/{task_id}/status", patch(handlers::tasks::change_status))
        .route(
            "/tasks/{task_id}/comments",
            get(handlers::comments::list_comments).post(handlers::comments::add_comment),
        )
        .route(
            "/comments/{comment_id}",
            delete(handlers::comments::delete_comment),
        )
        .route(
            "/notifications",
            get(handlers::notifications::list_notifications),
        )
        .route(
            "/notifications/{notification_id}/read",
            patch(handlers::notifications::mark_read),
        )
        .route(
            "/notifications/read-all",
            post(handlers::notifications::mark_all_read),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(openapi::docs_router())
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(fallback_handler)
        .layer(axum_middleware::from_fn(metrics_middleware))
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(trace_layer)
        .layer(timeout)
        .layer(body_limit)
        .layer(cors)
}

async fn fallback_handler() -> error::ApiResult<()> {
    Err(ApiError::not_found("Not found", "NOT_FOUND"))
}

fn build_cors_layer(config: &config::Config) -> CorsLayer {
    use axum::http::header::HeaderName;
    use axum::http::Method;

    let is_wildcard_origin = config.cors.allowed_origins.iter().any(|o| o == "*")
        || config.cors.allowed_origins.is_empty();

    let methods: Vec<Method> = config
        .cors
        .allowed_methods
        .iter()
        .filter_map(|m| m.parse().ok())
        .collect();

    let headers: Vec<HeaderName> = config
        .cors
        .allowed_headers
        .iter()
        .filter_map(|h| h.parse().ok())
        .collect();

    let cors = match (is_wildcard_origin, config.cors.allow_credentials) {
        // Credentials forbid a literal `*`, so echo the caller's origin instead.
        (true, true) => CorsLayer::new()
            .allow_origin(tower_http::cors::AllowOrigin::mirror_request())
            .allow_credentials(true),
        (true, false) => CorsLayer::new().allow_origin(Any),
        (false, allow_credentials) => {
            let origins: Vec<_> = config
                .cors
                .allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_credentials(allow_credentials)
        }
    };

    cors.allow_methods(methods)
        .allow_headers(headers)
        .max_age(Duration::from_secs(config.cors.max_age_secs))
}

pub fn create_db_pool(config: &config::Config) -> Result<DbPool, r2d2::PoolError> {
    let manager = ConnectionManager::<PgConnection>::new(&config.database.url);
    r2d2::Pool::builder()
        .max_size(config.database.max_connections)
        .min_idle(Some(config.database.min_connections))
        .connection_timeout(Duration::from_secs(config.database.connection_timeout_secs))
        .idle_timeout(Some(Duration::from_secs(config.database.idle_timeout_secs)))
        .build(manager)
}

pub fn init_tracing(config: &config::Config) {
    telemetry::init_telemetry(config);
}

pub use config::Config;
