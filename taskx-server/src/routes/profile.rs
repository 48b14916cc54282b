//! Profile endpoints

use axum::{
    Json, Router,
    extract::State,
    routing::{get, put},
};
use serde::Serialize;
use taskx_core::TaskxError;
use taskx_core::user::{NotificationPreferences, NotificationType, UserProfile};

use crate::auth::AuthUser;
use crate::routes::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/profile", get(get_profile))
        .route("/api/profile/notifications", put(update_notifications))
}

/// A user profile without the stored OAuth tokens.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub uid: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub notification_type: NotificationType,
    pub display_name: Option<String>,
    pub username: Option<String>,
    pub calendar_connected: bool,
}

impl From<UserProfile> for ProfileView {
    fn from(profile: UserProfile) -> Self {
        ProfileView {
            calendar_connected: profile.is_calendar_connected(),
            uid: profile.uid,
            email: profile.email,
            phone_number: profile.phone_number,
            notification_type: profile.notification_type,
            display_name: profile.display_name,
            username: profile.username,
        }
    }
}

/// GET /api/profile
async fn get_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ProfileView>, AppError> {
    let profile = state
        .users
        .get_user(&user.uid)
        .await?
        .ok_or_else(|| TaskxError::NotFound(format!("User {}", user.uid)))?;

    Ok(Json(profile.into()))
}

/// PUT /api/profile/notifications - Reminder channel and phone number
async fn update_notifications(
    State(state): State<AppState>,
    user: AuthUser,
    Json(prefs): Json<NotificationPreferences>,
) -> Result<Json<ProfileView>, AppError> {
    let prefs = prefs.validate()?;
    let profile = state
        .users
        .update_notification_preferences(&user.uid, &prefs)
        .await?;

    tracing::info!(
        user_id = %user.uid,
        notification_type = ?prefs.notification_type,
        "Updated notification preferences"
    );
    Ok(Json(profile.into()))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;
    use taskx_core::store::UserStore;
    use taskx_core::user::NotificationType;

    use crate::routes::test_support::*;

    #[tokio::test]
    async fn test_first_request_creates_profile() {
        let app = test_app();

        let (status, body) = send(&app.router, request("GET", "/api/profile", None)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["uid"], UID);
        assert_eq!(body["email"], "me@example.com");
        assert_eq!(body["notificationType"], "email");
        assert_eq!(body["calendarConnected"], false);
        assert!(body.get("googleTokens").is_none());
    }

    #[tokio::test]
    async fn test_sms_preference_requires_phone_number() {
        let app = test_app();

        let (status, body) = send(
            &app.router,
            request(
                "PUT",
                "/api/profile/notifications",
                Some(json!({ "notificationType": "both", "phoneNumber": "123" })),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("phone number"));
    }

    #[tokio::test]
    async fn test_update_notification_preferences() {
        let app = test_app();

        let (status, body) = send(
            &app.router,
            request(
                "PUT",
                "/api/profile/notifications",
                Some(json!({ "notificationType": "mobile", "phoneNumber": " +15551234567 " })),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phoneNumber"], "+15551234567");

        let user = app.store.get_user(UID).await.unwrap().unwrap();
        assert_eq!(user.notification_type, NotificationType::Mobile);
    }
}
