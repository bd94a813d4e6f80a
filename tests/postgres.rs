//! End-to-end flows against the Postgres-backed store.
//!
//! Skipped unless `TEST_DATABASE_URL` points at a reachable database.

mod common;

use common::{create_team, first_issue_code, TestApp};
use serde_json::{json, Value};
use serial_test::serial;

#[tokio::test]
#[serial]
async fn team_workflow_persists_through_postgres() {
    let Some(app) = TestApp::spawn_postgres().await else {
        return;
    };

    // Arrange
    let team = create_team(&app).await;

    // Act
    let task = app
        .create_task(
            &team.owner,
            team.project_id,
            json!({ "title": "Wireframes", "assignee_id": team.member.id, "priority": "HIGH" }),
        )
        .await;
    let task_path = format!("/tasks/{}", task["id"].as_str().unwrap());
    let comment = app
        .post(
            &format!("{}/comments", task_path),
            &team.member.access_token,
            json!({ "content": "On it" }),
        )
        .await;
    let done = app
        .patch(
            &format!("{}/status", task_path),
            &team.member.access_token,
            json!({ "status": "DONE" }),
        )
        .await;

    // Assert
    assert_eq!(comment.status().as_u16(), 201);
    assert_eq!(done.status().as_u16(), 200);

    let hidden = app.get(&task_path, &team.outsider.access_token).await;
    assert_eq!(hidden.status().as_u16(), 404);

    let inbox: Value = app
        .get("/notifications", &team.member.access_token)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(inbox["data"][0]["kind"], "TASK_ASSIGNED");

    let stats: Value = app
        .get("/users/me/stats", &team.member.access_token)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(stats["visible_projects"], 1);
    assert_eq!(stats["assigned_tasks"], 1);
    assert_eq!(stats["completed_tasks"], 1);
    assert_eq!(stats["authored_comments"], 1);
}

#[tokio::test]
#[serial]
async fn duplicate_member_is_rejected_by_postgres() {
    let Some(app) = TestApp::spawn_postgres().await else {
        return;
    };
    let team = create_team(&app).await;

    let response = app
        .post(
            &format!("/projects/{}/members", team.project_id),
            &team.owner.access_token,
            json!({ "user_id": team.member.id }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 400);
    let (_, code) = first_issue_code(response).await;
    assert_eq!(code, "ALREADY_MEMBER");
}

#[tokio::test]
#[serial]
async fn deleting_project_cascades_in_postgres() {
    let Some(app) = TestApp::spawn_postgres().await else {
        return;
    };
    let team = create_team(&app).await;
    let task = app
        .create_task(&team.owner, team.project_id, json!({ "title": "Gone soon" }))
        .await;
    app.post(
        &format!("/tasks/{}/comments", task["id"].as_str().unwrap()),
        &team.member.access_token,
        json!({ "content": "Soon gone" }),
    )
    .await;

    let response = app
        .delete(
            &format!("/projects/{}", team.project_id),
            &team.owner.access_token,
        )
        .await;

    assert_eq!(response.status().as_u16(), 204);
    let stats: Value = app
        .get("/users/me/stats", &team.member.access_token)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(stats["visible_projects"], 0);
    assert_eq!(stats["authored_comments"], 0);
}
