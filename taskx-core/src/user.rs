//! User profiles, notification preferences and stored OAuth tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{TaskxError, TaskxResult};

/// Shortest phone number accepted for SMS reminders.
const MIN_PHONE_LEN: usize = 8;

/// How a user wants to be reminded about upcoming deadlines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    #[default]
    Email,
    Mobile,
    Both,
}

impl NotificationType {
    pub fn wants_email(self) -> bool {
        matches!(self, NotificationType::Email | NotificationType::Both)
    }

    pub fn wants_sms(self) -> bool {
        matches!(self, NotificationType::Mobile | NotificationType::Both)
    }
}

/// OAuth tokens for the user's Google account, stored as `googleTokens`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBundle {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Access token expiry, in epoch milliseconds on the wire.
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expiry_date: Option<DateTime<Utc>>,
}

impl TokenBundle {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date.is_some_and(|expiry| expiry < now)
    }

    /// Fold a refresh response into these tokens. Google usually omits the
    /// refresh token when refreshing, so the old one is kept.
    pub fn merge_refreshed(&self, refreshed: TokenBundle) -> TokenBundle {
        TokenBundle {
            refresh_token: refreshed
                .refresh_token
                .filter(|t| !t.is_empty())
                .or_else(|| self.refresh_token.clone()),
            scope: refreshed.scope.or_else(|| self.scope.clone()),
            token_type: refreshed.token_type.or_else(|| self.token_type.clone()),
            ..refreshed
        }
    }
}

/// A user document from the `users` collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub notification_type: NotificationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_tokens: Option<TokenBundle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_calendar_id: Option<String>,
}

impl UserProfile {
    pub fn new(uid: impl Into<String>) -> Self {
        UserProfile {
            uid: uid.into(),
            ..Default::default()
        }
    }

    /// Tokens and calendar id, if the Google Calendar integration is set up.
    pub fn calendar_link(&self) -> Option<(&TokenBundle, &str)> {
        match (&self.google_tokens, &self.google_calendar_id) {
            (Some(tokens), Some(calendar_id)) => Some((tokens, calendar_id.as_str())),
            _ => None,
        }
    }

    pub fn is_calendar_connected(&self) -> bool {
        self.calendar_link().is_some()
    }

    pub fn email_address(&self) -> Option<&str> {
        self.email.as_deref().filter(|e| !e.trim().is_empty())
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone_number.as_deref().filter(|p| !p.trim().is_empty())
    }
}

/// Reminder settings a user can edit from the profile page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    pub notification_type: NotificationType,
    #[serde(default)]
    pub phone_number: Option<String>,
}

impl NotificationPreferences {
    pub fn validate(mut self) -> TaskxResult<Self> {
        self.phone_number = self
            .phone_number
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        if self.notification_type.wants_sms() {
            let long_enough = self
                .phone_number
                .as_ref()
                .is_some_and(|p| p.len() >= MIN_PHONE_LEN);
            if !long_enough {
                return Err(TaskxError::InvalidInput(
                    "A valid phone number is required for mobile notifications".into(),
                ));
            }
        }

        Ok(self)
    }
}
