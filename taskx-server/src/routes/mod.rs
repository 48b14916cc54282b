pub mod calendar;
pub mod profile;
pub mod reminders;
pub mod tasks;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use taskx_core::TaskxError;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// The full API with CORS and request tracing.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(calendar::router())
        .merge(tasks::router())
        .merge(profile::router())
        .merge(reminders::router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Standard API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(rename = "needsIntegration", skip_serializing_if = "Option::is_none")]
    pub needs_integration: Option<bool>,
}

impl ErrorResponse {
    fn new(error: impl Into<String>) -> Self {
        ErrorResponse {
            error: error.into(),
            details: None,
            needs_integration: None,
        }
    }

    fn needs_integration(mut self) -> Self {
        self.needs_integration = Some(true);
        self
    }

    fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Convert errors to HTTP responses
#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl AppError {
    fn status_and_body(&self) -> (StatusCode, ErrorResponse) {
        let Some(err) = self.0.downcast_ref::<TaskxError>() else {
            return internal(&self.0);
        };

        match err {
            TaskxError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, ErrorResponse::new("Unauthorized")),
            TaskxError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new(format!("{what} not found")),
            ),
            TaskxError::IntegrationNotConnected => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new(err.to_string()).needs_integration(),
            ),
            TaskxError::AuthExpired(_) => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::new("Authentication expired").needs_integration(),
            ),
            TaskxError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, ErrorResponse::new(msg.clone())),
            other => internal(other),
        }
    }
}

fn internal(err: &dyn std::fmt::Display) -> (StatusCode, ErrorResponse) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorResponse::new("Internal server error").with_details(err.to_string()),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        } else {
            tracing::debug!(%status, error = %self.0, "Request rejected");
        }
        (status, Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use axum::body::Body;
    use axum::http::Request;

    #[test]
    fn test_error_mapping() {
        let cases = [
            (TaskxError::Unauthorized("bad".into()), 401, None),
            (TaskxError::NotFound("Task t1".into()), 404, None),
            (TaskxError::IntegrationNotConnected, 400, Some(true)),
            (TaskxError::AuthExpired("revoked".into()), 401, Some(true)),
            (TaskxError::InvalidInput("Missing event ID".into()), 400, None),
            (TaskxError::Upstream("Rate Limit Exceeded".into()), 500, None),
        ];

        for (err, status, needs_integration) in cases {
            let (got, body) = AppError::from(err).status_and_body();
            assert_eq!(got.as_u16(), status);
            assert_eq!(body.needs_integration, needs_integration);
        }
    }

    #[test]
    fn test_internal_errors_carry_details() {
        let (_, body) = AppError::from(TaskxError::Upstream("Rate Limit Exceeded".into()))
            .status_and_body();
        assert_eq!(body.error, "Internal server error");
        assert_eq!(
            body.details.as_deref(),
            Some("Upstream error: Rate Limit Exceeded")
        );
    }

    #[tokio::test]
    async fn test_missing_bearer_token_is_unauthorized() {
        let app = test_app();
        let request = Request::builder()
            .uri("/api/todos")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(&app.router, request).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized");
    }

    #[tokio::test]
    async fn test_unknown_token_is_unauthorized() {
        let app = test_app();
        let request = Request::builder()
            .uri("/api/todos")
            .header("authorization", "Bearer forged")
            .body(Body::empty())
            .unwrap();

        let (status, _) = send(&app.router, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
