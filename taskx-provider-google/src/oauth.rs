//! OAuth authorization-code flow against Google.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use google_calendar::{AccessToken, Client};
use taskx_core::calendar::OAuthFlow;
use taskx_core::config::GoogleConfig;
use taskx_core::user::TokenBundle;
use taskx_core::{TaskxError, TaskxResult};
use url::Url;

pub const SCOPES: &[&str] = &["https://www.googleapis.com/auth/calendar"];

const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Google account access for one OAuth client (the web app's).
///
/// Implements both [`OAuthFlow`] and [`taskx_core::calendar::CalendarApi`];
/// every call builds a short-lived `google_calendar::Client` from the
/// caller's tokens.
#[derive(Debug, Clone)]
pub struct GoogleCalendar {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl GoogleCalendar {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        GoogleCalendar {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
        }
    }

    pub fn from_config(config: &GoogleConfig, redirect_uri: impl Into<String>) -> Self {
        Self::new(&config.client_id, &config.client_secret, redirect_uri)
    }

    pub(crate) fn client(&self, access_token: &str, refresh_token: &str) -> Client {
        Client::new(
            self.client_id.clone(),
            self.client_secret.clone(),
            self.redirect_uri.clone(),
            access_token.to_string(),
            refresh_token.to_string(),
        )
    }

    pub(crate) fn client_for(&self, tokens: &TokenBundle) -> Client {
        self.client(
            &tokens.access_token,
            tokens.refresh_token.as_deref().unwrap_or_default(),
        )
    }
}

#[async_trait]
impl OAuthFlow for GoogleCalendar {
    fn authorization_url(&self, state: &str) -> String {
        let scope = SCOPES.join(" ");
        let params = [
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("state", state),
        ];

        Url::parse_with_params(AUTH_ENDPOINT, &params)
            .map(String::from)
            .unwrap_or_else(|_| AUTH_ENDPOINT.to_string())
    }

    async fn exchange_code(&self, code: &str) -> TaskxResult<TokenBundle> {
        let mut client = self.client("", "");

        let token = client
            .get_access_token(code, "")
            .await
            .map_err(|e| TaskxError::Upstream(format!("Failed to exchange authorization code: {e}")))?;

        if token.access_token.is_empty() {
            return Err(TaskxError::Upstream(
                "Token exchange returned no access token".into(),
            ));
        }

        Ok(bundle_from(token, Utc::now()))
    }

    async fn refresh(&self, tokens: &TokenBundle) -> TaskxResult<TokenBundle> {
        let Some(refresh_token) = tokens.refresh_token.as_deref() else {
            return Err(TaskxError::Upstream("No refresh token stored".into()));
        };

        let token = self
            .client(&tokens.access_token, refresh_token)
            .refresh_access_token()
            .await
            .map_err(|e| TaskxError::Upstream(format!("Failed to refresh token: {e}")))?;

        Ok(bundle_from(token, Utc::now()))
    }
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

/// Google leaves fields it did not send empty rather than absent.
fn bundle_from(token: AccessToken, now: DateTime<Utc>) -> TokenBundle {
    let expiry_date = (token.expires_in > 0).then(|| now + Duration::seconds(token.expires_in));

    TokenBundle {
        access_token: token.access_token,
        refresh_token: non_empty(token.refresh_token),
        scope: non_empty(token.scope),
        token_type: non_empty(token.token_type),
        expiry_date,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn google() -> GoogleCalendar {
        GoogleCalendar::new(
            "client-id.apps.googleusercontent.com",
            "secret",
            "https://taskx.example.com/api/integrate",
        )
    }

    #[test]
    fn test_authorization_url_requests_offline_calendar_access() {
        let url = Url::parse(&google().authorization_url("user-42")).unwrap();
        let query: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("accounts.google.com"));
        assert_eq!(query["access_type"], "offline");
        assert_eq!(query["prompt"], "consent");
        assert_eq!(query["response_type"], "code");
        assert_eq!(query["scope"], "https://www.googleapis.com/auth/calendar");
        assert_eq!(query["state"], "user-42");
        assert_eq!(
            query["redirect_uri"],
            "https://taskx.example.com/api/integrate"
        );
    }

    #[test]
    fn test_bundle_from_refresh_response_without_refresh_token() {
        let now = Utc.with_ymd_and_hms(2025, 3, 20, 15, 0, 0).unwrap();
        let token = AccessToken {
            access_token: "ya29.new".into(),
            expires_in: 3599,
            token_type: "Bearer".into(),
            ..Default::default()
        };

        let bundle = bundle_from(token, now);

        assert_eq!(bundle.access_token, "ya29.new");
        assert_eq!(bundle.refresh_token, None);
        assert_eq!(bundle.scope, None);
        assert_eq!(bundle.token_type.as_deref(), Some("Bearer"));
        assert_eq!(bundle.expiry_date, Some(now + Duration::seconds(3599)));
    }

    #[test]
    fn test_bundle_without_lifetime_has_no_expiry() {
        let token = AccessToken {
            access_token: "ya29.forever".into(),
            refresh_token: "1//refresh".into(),
            ..Default::default()
        };

        let bundle = bundle_from(token, Utc::now());

        assert_eq!(bundle.refresh_token.as_deref(), Some("1//refresh"));
        assert!(bundle.expiry_date.is_none());
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token_fails_before_calling_google() {
        let tokens = TokenBundle {
            access_token: "stale".into(),
            refresh_token: None,
            scope: None,
            token_type: None,
            expiry_date: None,
        };

        let err = google().refresh(&tokens).await.unwrap_err();
        assert!(matches!(err, TaskxError::Upstream(_)));
    }
}
