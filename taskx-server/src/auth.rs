//! Bearer token authentication for the API routes.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use taskx_core::TaskxError;

use crate::routes::AppError;
use crate::state::AppState;

/// The signed-in user making the request.
///
/// Extracting it verifies `Authorization: Bearer <identity token>` and makes
/// sure the user has a profile document.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub uid: String,
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| TaskxError::Unauthorized("Missing bearer token".into()))?;

        let identity = state.identity.verify(token).await?;
        state
            .users
            .ensure_user(&identity.uid, identity.email.as_deref())
            .await?;

        Ok(AuthUser { uid: identity.uid })
    }
}
