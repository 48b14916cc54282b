//! Google Calendar connection and event mirroring endpoints

use axum::{
    Json, Router,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use taskx_core::TaskxError;
use taskx_core::calendar::SyncTaskRequest;

use crate::auth::AuthUser;
use crate::routes::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/integrate", get(integrate))
        .route("/api/integrate/url", get(authorization_url))
        .route("/api/sync-calendar", post(sync_calendar))
        .route("/api/delete-calendar-event", delete(delete_calendar_event))
        .route("/api/disconnect-calendar", post(disconnect_calendar))
}

#[derive(Deserialize)]
pub struct IntegrateParams {
    code: Option<String>,
    state: Option<String>,
}

/// GET /api/integrate - OAuth callback; `state` carries the user id
async fn integrate(
    State(state): State<AppState>,
    Query(params): Query<IntegrateParams>,
) -> Result<Response, AppError> {
    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        return Err(TaskxError::InvalidInput("Missing authorization code".into()).into());
    };
    let Some(uid) = params.state.filter(|s| !s.is_empty()) else {
        return Err(TaskxError::InvalidInput("Missing user identification".into()).into());
    };

    let outcome = match state.connector.connect(&code, &uid).await {
        Ok(calendar_id) => {
            tracing::info!(user_id = %uid, calendar_id = %calendar_id, "Google Calendar connected");
            "success"
        }
        Err(e) => {
            tracing::error!(user_id = %uid, error = %e, "Integration error");
            "error"
        }
    };

    let location = format!("{}/?integration={outcome}", state.app_url);
    Ok(Redirect::temporary(&location).into_response())
}

#[derive(Serialize)]
pub struct AuthorizationUrl {
    pub url: String,
    pub connected: bool,
}

/// GET /api/integrate/url - Consent page to start the connect flow
async fn authorization_url(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<AuthorizationUrl>, AppError> {
    Ok(Json(AuthorizationUrl {
        url: state.connector.authorization_url(&user.uid),
        connected: state.connector.is_connected(&user.uid).await?,
    }))
}

/// POST /api/sync-calendar - Create or update the event mirroring a task
async fn sync_calendar(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<SyncTaskRequest>,
) -> Result<Json<Value>, AppError> {
    let task = request.validate()?;
    let outcome = state.connector.sync_task(&user.uid, &task).await?;

    Ok(Json(json!({
        "success": true,
        "eventId": outcome.event_id,
        "created": outcome.created,
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteEventRequest {
    #[serde(default)]
    event_id: Option<String>,
}

/// DELETE /api/delete-calendar-event - Remove a mirrored event
async fn delete_calendar_event(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<DeleteEventRequest>,
) -> Result<Json<Value>, AppError> {
    let event_id = request.event_id.unwrap_or_default();
    state.connector.delete_event(&user.uid, &event_id).await?;

    Ok(Json(json!({ "success": true })))
}

/// POST /api/disconnect-calendar - Forget the user's Google tokens
async fn disconnect_calendar(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Value>, AppError> {
    state.connector.disconnect(&user.uid).await?;
    Ok(Json(json!({ "success": true })))
}
