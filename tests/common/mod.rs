//! Common test utilities and helpers for integration tests.
//!
//! Each `TestApp` runs the real router on a loopback port. `spawn` backs it
//! with its own in-memory store, so those tests never share state;
//! `spawn_postgres` backs it with the database named by `TEST_DATABASE_URL`.

#![allow(dead_code)]

use diesel::connection::SimpleConnection;
use once_cell::sync::Lazy;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use uuid::Uuid;

use taskboard::{
    auth::jwt::JwtConfig,
    create_db_pool, create_router,
    store::{MemoryStore, PgStore, Store},
    workflow::TransitionPolicy,
    AppState, Config, DbPool,
};

/// Test database URL. Postgres-backed tests are skipped when it is unset.
pub static TEST_DATABASE_URL: Lazy<Option<String>> = Lazy::new(|| {
    std::env::var("TEST_DATABASE_URL")
        .ok()
        .filter(|url| !url.trim().is_empty())
});

const SCHEMA_SQL: &str =
    include_str!("../../migrations/2026-01-01-000000_create_tables/up.sql");

/// One pool per test binary, created on first use with the schema applied.
static TEST_DB_POOL: Lazy<Option<DbPool>> = Lazy::new(|| {
    let Some(url) = TEST_DATABASE_URL.as_ref() else {
        eprintln!("TEST_DATABASE_URL is not set; skipping Postgres-backed tests");
        return None;
    };
    let mut config = Config::default_for_testing();
    config.database.url = url.clone();
    config.database.max_connections = 16;

    let pool = create_db_pool(&config).expect("Failed to connect to test database");
    pool.get()
        .expect("Failed to check out test connection")
        .batch_execute(SCHEMA_SQL)
        .expect("Failed to apply schema to test database");
    Some(pool)
});

/// Pool for the test database, or `None` when `TEST_DATABASE_URL` is unset.
pub fn test_db_pool() -> Option<DbPool> {
    TEST_DB_POOL.clone()
}

/// Pre-generated Ed25519 private key shared by every test server.
pub static TEST_JWT_PRIVATE_KEY: Lazy<String> = Lazy::new(|| {
    let (private_key, _) = JwtConfig::generate_key_pair();
    private_key
});

pub const TEST_PASSWORD: &str = "password123";

/// A test application instance with its own HTTP client and base URL.
pub struct TestApp {
    pub client: Client,
    pub base_url: String,
    pub jwt_config: JwtConfig,
}

/// Response from user registration or login.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// User data returned from API.
#[derive(Debug, Clone, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub created_at: chrono::NaiveDateTime,
}

/// Test user with credentials and token.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub password: String,
    pub access_token: String,
}

impl TestApp {
    /// Spawns a fresh application with the default test configuration.
    pub async fn spawn() -> Self {
        Self::spawn_with(Config::default_for_testing()).await
    }

    /// Spawns a fresh application that enforces forward-only task transitions.
    pub async fn spawn_strict() -> Self {
        let mut config = Config::default_for_testing();
        config.tasks.transitions = TransitionPolicy::Strict;
        Self::spawn_with(config).await
    }

    /// Spawns an application backed by [`PgStore`] on the test database, or
    /// `None` when `TEST_DATABASE_URL` is unset.
    pub async fn spawn_postgres() -> Option<Self> {
        let pool = test_db_pool()?;
        Some(Self::spawn_on(Arc::new(PgStore::new(pool)), Config::default_for_testing()).await)
    }

    pub async fn spawn_with(config: Config) -> Self {
        Self::spawn_on(Arc::new(MemoryStore::new()), config).await
    }

    pub async fn spawn_on(store: Arc<dyn Store>, config: Config) -> Self {
        let jwt_config = JwtConfig::from_base64(&TEST_JWT_PRIVATE_KEY)
            .expect("Failed to load test signing key")
            .with_settings(&config.jwt);
        let state = AppState::new(store, jwt_config.clone(), &config);
        let app = create_router(state, &config);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test server");
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            client: Client::new(),
            base_url: format!("http://127.0.0.1:{}", port),
            jwt_config,
        }
    }

    /// Generates a unique email for testing.
    pub fn unique_email() -> String {
        format!("test_{}@example.com", Uuid::new_v4())
    }

    /// Registers a new user and returns the test user data.
    pub async fn register_user(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<TestUser, reqwest::Error> {
        let response = self
            .client
            .post(format!("{}/auth/register", self.base_url))
            .json(&json!({
                "email": email,
                "password": password,
                "full_name": full_name
            }))
            .send()
            .await?
            .error_for_status()?;

        let auth: AuthResponse = response.json().await?;

        Ok(TestUser {
            id: auth.user.id,
            email: auth.user.email,
            password: password.to_string(),
            access_token: auth.access_token,
        })
    }

    /// Logs in an existing user.
    pub async fn login_user(&self, email: &str, password: &str) -> Result<TestUser, reqwest::Error> {
        let response = self
            .client
            .post(format!("{}/auth/login", self.base_url))
            .json(&json!({
                "email": email,
                "password": password
            }))
            .send()
            .await?
            .error_for_status()?;

        let auth: AuthResponse = response.json().await?;

        Ok(TestUser {
            id: auth.user.id,
            email: auth.user.email,
            password: password.to_string(),
            access_token: auth.access_token,
        })
    }

    /// Creates a project owned by `user` and returns its id.
    pub async fn create_project(&self, user: &TestUser, name: &str) -> Uuid {
        let response = self
            .post("/projects", &user.access_token, json!({ "name": name }))
            .await;
        assert_eq!(response.status().as_u16(), 201, "project creation failed");
        let body: Value = response.json().await.expect("Failed to parse project");
        body["id"].as_str().unwrap().parse().unwrap()
    }

    /// Adds `member` to `project_id` on behalf of its owner; returns the membership id.
    pub async fn add_member(
        &self,
        owner: &TestUser,
        project_id: Uuid,
        member: &TestUser,
        role: &str,
    ) -> Uuid {
        let response = self
            .post(
                &format!("/projects/{}/members", project_id),
                &owner.access_token,
                json!({ "user_id": member.id, "role": role }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201, "adding member failed");
        let body: Value = response.json().await.expect("Failed to parse member");
        body["id"].as_str().unwrap().parse().unwrap()
    }

    /// Creates a task in `project_id`; returns the task body.
    pub async fn create_task(&self, user: &TestUser, project_id: Uuid, body: Value) -> Value {
        let response = self
            .post(
                &format!("/projects/{}/tasks", project_id),
                &user.access_token,
                body,
            )
            .await;
        assert_eq!(response.status().as_u16(), 201, "task creation failed");
        response.json().await.expect("Failed to parse task")
    }

    /// Makes an authenticated GET request.
    pub async fn get(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to send GET request")
    }

    /// Makes an authenticated POST request with JSON body.
    pub async fn post(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to send POST request")
    }

    /// Makes an authenticated PUT request with JSON body.
    pub async fn put(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .put(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to send PUT request")
    }

    /// Makes an authenticated PATCH request with JSON body.
    pub async fn patch(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .patch(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to send PATCH request")
    }

    /// Makes an authenticated DELETE request.
    pub async fn delete(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .delete(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to send DELETE request")
    }

    /// Makes an unauthenticated GET request.
    pub async fn get_public(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("Failed to send GET request")
    }

    /// Makes an unauthenticated POST request with JSON body.
    pub async fn post_public(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await
            .expect("Failed to send POST request")
    }
}

/// Creates a test user with a unique email.
pub async fn create_test_user(app: &TestApp) -> TestUser {
    let email = TestApp::unique_email();
    app.register_user(&email, TEST_PASSWORD, Some("Test User"))
        .await
        .expect("Failed to create test user")
}

/// Three users and a project: `owner` owns it, `member` belongs to it as
/// DEVELOPER and `outsider` has no relation to it.
pub struct Team {
    pub owner: TestUser,
    pub member: TestUser,
    pub outsider: TestUser,
    pub project_id: Uuid,
    pub membership_id: Uuid,
}

pub async fn create_team(app: &TestApp) -> Team {
    let owner = create_test_user(app).await;
    let member = create_test_user(app).await;
    let outsider = create_test_user(app).await;
    let project_id = app.create_project(&owner, "Redesign").await;
    let membership_id = app.add_member(&owner, project_id, &member, "DEVELOPER").await;

    Team {
        owner,
        member,
        outsider,
        project_id,
        membership_id,
    }
}

/// Reads a JSON body and returns the `code` of its first field issue.
pub async fn first_issue_code(response: reqwest::Response) -> (String, String) {
    let body: Value = response.json().await.expect("Failed to parse error body");
    assert_eq!(body["code"], "VALIDATION_ERROR");
    let issue = &body["issues"][0];
    (
        issue["field"].as_str().unwrap().to_string(),
        issue["code"].as_str().unwrap().to_string(),
    )
}

/// Asserts that a response has a specific status code.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $expected:expr) => {
        assert_eq!(
            $response.status().as_u16(),
            $expected,
            "Expected status {}, got {}",
            $expected,
            $response.status()
        );
    };
}
