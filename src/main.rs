use std::sync::Arc;

use taskboard::{
    auth::jwt::JwtConfig, create_db_pool, create_router, init_tracing, store::PgStore, AppState,
    Config,
};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    init_tracing(&config);

    info!(
        service = %config.telemetry.service_name,
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.server.environment,
        strict_task_transitions = config.tasks.transitions.is_strict(),
        "Starting server"
    );

    let issues = config.validate_for_production();
    if !issues.is_empty() {
        for issue in &issues {
            warn!(issue = %issue, "Configuration warning");
        }
    }

    info!(
        database_url = %config.database.url.split('@').next_back().unwrap_or("***"),
        max_connections = config.database.max_connections,
        "Connecting to database"
    );

    let db_pool = create_db_pool(&config).unwrap_or_else(|e| {
        error!(error = %e, "Failed to create database pool");
        std::process::exit(1);
    });

    info!("Database connection pool created");

    let jwt_config = JwtConfig::from_env(&config.jwt).unwrap_or_else(|e| {
        error!(error = %e, "Failed to load JWT signing key");
        std::process::exit(1);
    });

    let state = AppState::new(Arc::new(PgStore::new(db_pool)), jwt_config, &config);
    let app = create_router(state, &config);

    let http_addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .unwrap_or_else(|e| {
            error!(error = %e, address = %http_addr, "Failed to bind HTTP server");
            std::process::exit(1);
        });

    info!(
        http_address = %http_addr,
        docs_url = %format!("http://{}/api-docs/openapi.json", http_addr),
        "HTTP server ready"
    );

    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
        info!("Shutdown signal received");
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
    {
        error!(error = %e, "HTTP server error");
    }

    info!("Server shutdown complete");
}
