//! Task endpoints

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
};
use taskx_core::task::{NewTask, Task, TaskPatch};
use taskx_core::tasks::{TaskDeletion, TaskMutation};

use crate::auth::AuthUser;
use crate::routes::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/todos", get(list_tasks).post(create_task))
        .route("/api/todos/{id}", patch(update_task).delete(delete_task))
}

/// GET /api/todos - The user's tasks, newest first
async fn list_tasks(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Task>>, AppError> {
    Ok(Json(state.tasks.list(&user.uid).await?))
}

/// POST /api/todos
async fn create_task(
    State(state): State<AppState>,
    user: AuthUser,
    Json(new): Json<NewTask>,
) -> Result<(StatusCode, Json<TaskMutation>), AppError> {
    let created = state.tasks.create(&user.uid, new).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PATCH /api/todos/:id
async fn update_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(patch): Json<TaskPatch>,
) -> Result<Json<TaskMutation>, AppError> {
    Ok(Json(state.tasks.update(&user.uid, &id, patch).await?))
}

/// DELETE /api/todos/:id - Also removes the mirrored calendar event
async fn delete_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<TaskDeletion>, AppError> {
    Ok(Json(state.tasks.delete(&user.uid, &id).await?))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::{Duration, Utc};
    use serde_json::json;
    use taskx_core::store::TaskStore;

    use crate::routes::test_support::*;

    async fn connect(app: &TestApp) {
        let request = Request::builder()
            .uri(format!("/api/integrate?code=auth-code&state={UID}"))
            .body(Body::empty())
            .unwrap();
        send(&app.router, request).await;
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let app = test_app();

        let (status, body) = send(
            &app.router,
            request("POST", "/api/todos", Some(json!({ "text": "Water plants" }))),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["task"]["text"], "Water plants");
        assert_eq!(body["task"]["priority"], 4);
        assert_eq!(body["task"]["userId"], UID);
        assert_eq!(body["calendar"]["status"], "skipped");

        let (status, body) = send(&app.router, request("GET", "/api/todos", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_text_is_rejected() {
        let app = test_app();

        let (status, _) = send(
            &app.router,
            request("POST", "/api/todos", Some(json!({ "text": "   " }))),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_deadline_is_mirrored_when_connected() {
        let app = test_app();
        connect(&app).await;
        let deadline = (Utc::now() + Duration::days(1)).to_rfc3339();

        let (status, body) = send(
            &app.router,
            request(
                "POST",
                "/api/todos",
                Some(json!({ "text": "Dentist", "deadline": deadline })),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["calendar"]["status"], "synced");
        assert_eq!(body["calendar"]["eventId"], body["task"]["calendarEventId"]);
        assert_eq!(app.calendar.events().len(), 1);
    }

    #[tokio::test]
    async fn test_patch_completes_task() {
        let app = test_app();
        let (_, created) = send(
            &app.router,
            request("POST", "/api/todos", Some(json!({ "text": "Laundry" }))),
        )
        .await;
        let id = created["task"]["id"].as_str().unwrap();

        let (status, body) = send(
            &app.router,
            request(
                "PATCH",
                &format!("/api/todos/{id}"),
                Some(json!({ "completed": true })),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["task"]["completed"], true);
        assert!(body["task"]["completedAt"].is_string());
    }

    #[tokio::test]
    async fn test_delete_removes_task_even_if_event_delete_fails() {
        let app = test_app();
        connect(&app).await;
        let deadline = (Utc::now() + Duration::days(1)).to_rfc3339();
        let (_, created) = send(
            &app.router,
            request(
                "POST",
                "/api/todos",
                Some(json!({ "text": "Dentist", "deadline": deadline })),
            ),
        )
        .await;
        let id = created["task"]["id"].as_str().unwrap().to_string();
        app.calendar.fail_delete(true);

        let (status, body) =
            send(&app.router, request("DELETE", &format!("/api/todos/{id}"), None)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["taskId"], id.as_str());
        assert_eq!(body["calendar"]["status"], "failed");
        assert!(app.store.get_task(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_task_is_not_found() {
        let app = test_app();

        let (status, body) = send(
            &app.router,
            request("PATCH", "/api/todos/missing", Some(json!({ "priority": 1 }))),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Task missing not found");
    }
}
