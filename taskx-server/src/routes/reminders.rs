//! Reminder dispatch endpoint, called by an external scheduler

use axum::{Json, Router, extract::State, routing::get};
use chrono::Utc;
use taskx_core::reminder::DispatchSummary;

use crate::routes::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/sendReminders", get(send_reminders))
}

/// GET /api/sendReminders - One dispatcher pass
async fn send_reminders(State(state): State<AppState>) -> Result<Json<DispatchSummary>, AppError> {
    let summary = state.dispatcher.run(Utc::now()).await?;
    tracing::info!(message = %summary.message, "Reminder pass finished");
    Ok(Json(summary))
}
