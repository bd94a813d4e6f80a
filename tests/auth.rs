//! Authentication integration tests.
//!
//! These tests verify registration, login and the bearer-token middleware.

mod common;

use common::{create_test_user, first_issue_code, TestApp, TEST_PASSWORD};
use serde_json::json;

// ============================================================================
// Registration Tests
// ============================================================================

#[tokio::test]
async fn register_returns_201_for_valid_data() {
    // Arrange
    let app = TestApp::spawn().await;
    let email = TestApp::unique_email();

    // Act
    let response = app
        .post_public(
            "/auth/register",
            json!({
                "email": email,
                "password": "password123",
                "full_name": "Test User"
            }),
        )
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 201);

    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["user"]["email"].as_str().unwrap(), email);
    assert_eq!(body["user"]["role"], "USER");
    assert_eq!(body["user"]["is_active"], true);
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 3600);
    assert!(body["access_token"].as_str().is_some());
    assert!(body["user"]["password_hash"].is_null());
}

#[tokio::test]
async fn register_lowercases_email() {
    let app = TestApp::spawn().await;
    let email = format!("Mixed.{}@Example.COM", uuid::Uuid::new_v4().simple());

    let user = app
        .register_user(&email, TEST_PASSWORD, None)
        .await
        .expect("Failed to register");

    assert_eq!(user.email, email.to_lowercase());
    app.login_user(&email.to_lowercase(), TEST_PASSWORD)
        .await
        .expect("Lower-cased email should log in");
}

#[tokio::test]
async fn register_returns_400_for_invalid_email() {
    // Arrange
    let app = TestApp::spawn().await;

    // Act
    let response = app
        .post_public(
            "/auth/register",
            json!({
                "email": "not-an-email",
                "password": "password123"
            }),
        )
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 400);
    let (field, _) = first_issue_code(response).await;
    assert_eq!(field, "email");
}

#[tokio::test]
async fn register_returns_400_for_short_password() {
    let app = TestApp::spawn().await;

    let response = app
        .post_public(
            "/auth/register",
            json!({
                "email": TestApp::unique_email(),
                "password": "short"
            }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 400);
    let (field, _) = first_issue_code(response).await;
    assert_eq!(field, "password");
}

#[tokio::test]
async fn register_rejects_taken_email_as_validation_error() {
    let app = TestApp::spawn().await;
    let user = create_test_user(&app).await;

    let response = app
        .post_public(
            "/auth/register",
            json!({
                "email": user.email,
                "password": "anotherpassword"
            }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 400);
    let (field, code) = first_issue_code(response).await;
    assert_eq!(field, "email");
    assert_eq!(code, "EMAIL_TAKEN");
}

// ============================================================================
// Login Tests
// ============================================================================

#[tokio::test]
async fn login_returns_token_for_valid_credentials() {
    let app = TestApp::spawn().await;
    let user = create_test_user(&app).await;

    let response = app
        .post_public(
            "/auth/login",
            json!({ "email": user.email, "password": TEST_PASSWORD }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["user"]["id"], user.id.to_string());

    let claims = app
        .jwt_config
        .verify_access_token(body["access_token"].as_str().unwrap())
        .expect("Issued token should verify");
    assert_eq!(claims.sub, user.id);
    assert_eq!(claims.email, user.email);
}

#[tokio::test]
async fn login_returns_401_for_wrong_password() {
    let app = TestApp::spawn().await;
    let user = create_test_user(&app).await;

    let response = app
        .post_public(
            "/auth/login",
            json!({ "email": user.email, "password": "wrongpassword" }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn login_unknown_email_is_indistinguishable_from_wrong_password() {
    let app = TestApp::spawn().await;

    let response = app
        .post_public(
            "/auth/login",
            json!({ "email": TestApp::unique_email(), "password": TEST_PASSWORD }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn login_returns_403_for_deactivated_account() {
    let app = TestApp::spawn().await;
    let user = create_test_user(&app).await;
    assert_eq!(
        app.delete("/users/me", &user.access_token).await.status().as_u16(),
        204
    );

    let response = app
        .post_public(
            "/auth/login",
            json!({ "email": user.email, "password": TEST_PASSWORD }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 403);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "ACCOUNT_INACTIVE");
}

// ============================================================================
// Middleware Tests
// ============================================================================

#[tokio::test]
async fn protected_route_requires_authorization_header() {
    let app = TestApp::spawn().await;

    let response = app.get_public("/users/me").await;

    assert_eq!(response.status().as_u16(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "MISSING_AUTH_HEADER");
}

#[tokio::test]
async fn protected_route_rejects_non_bearer_scheme() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(format!("{}/users/me", app.base_url))
        .header("Authorization", "Basic dXNlcjpwYXNz")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_AUTH_FORMAT");
}

#[tokio::test]
async fn protected_route_rejects_garbage_token() {
    let app = TestApp::spawn().await;

    let response = app.get("/projects", "not.a.token").await;

    assert_eq!(response.status().as_u16(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn token_for_unknown_user_is_rejected() {
    let app = TestApp::spawn().await;
    let token = app
        .jwt_config
        .generate_access_token(uuid::Uuid::new_v4(), "ghost@example.com")
        .unwrap();

    let response = app.get("/users/me", &token).await;

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn token_stops_working_after_deactivation() {
    let app = TestApp::spawn().await;
    let user = create_test_user(&app).await;

    app.delete("/users/me", &user.access_token).await;
    let response = app.get("/users/me", &user.access_token).await;

    assert_eq!(response.status().as_u16(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "ACCOUNT_INACTIVE");
}
