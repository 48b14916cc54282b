use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::{CalendarApi, OAuthFlow, TaskEvent};
use crate::config::CalendarConfig;
use crate::error::{TaskxError, TaskxResult};
use crate::store::UserStore;
use crate::user::TokenBundle;

/// Body of a sync request, as sent by the web client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncTaskRequest {
    #[serde(default)]
    pub todo_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub calendar_event_id: Option<String>,
}

impl SyncTaskRequest {
    pub fn validate(self) -> TaskxResult<SyncTask> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        let (Some(task_id), Some(text), Some(deadline)) = (
            non_empty(self.todo_id),
            non_empty(self.text),
            non_empty(self.deadline),
        ) else {
            return Err(TaskxError::InvalidInput("Missing required fields".into()));
        };

        let deadline = DateTime::parse_from_rfc3339(&deadline)
            .map_err(|e| TaskxError::InvalidInput(format!("Invalid deadline '{deadline}': {e}")))?
            .with_timezone(&Utc);

        Ok(SyncTask {
            task_id,
            text,
            deadline,
            calendar_event_id: non_empty(self.calendar_event_id),
        })
    }
}

/// A task deadline to mirror into the calendar.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncTask {
    pub task_id: String,
    pub text: String,
    pub deadline: DateTime<Utc>,
    /// Event created by an earlier sync, updated in place when present.
    pub calendar_event_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub event_id: String,
    /// True when a new event was inserted; the caller must store its id.
    pub created: bool,
}

/// Connects user accounts to the calendar provider and mirrors task
/// deadlines as events in a dedicated calendar.
pub struct CalendarConnector {
    users: Arc<dyn UserStore>,
    oauth: Arc<dyn OAuthFlow>,
    calendar: Arc<dyn CalendarApi>,
    config: CalendarConfig,
}

impl CalendarConnector {
    pub fn new(
        users: Arc<dyn UserStore>,
        oauth: Arc<dyn OAuthFlow>,
        calendar: Arc<dyn CalendarApi>,
        config: CalendarConfig,
    ) -> Self {
        CalendarConnector {
            users,
            oauth,
            calendar,
            config,
        }
    }

    /// URL to send the user to; the callback carries their id as `state`.
    pub fn authorization_url(&self, uid: &str) -> String {
        self.oauth.authorization_url(uid)
    }

    /// Finish the OAuth redirect: exchange the code, find or create the
    /// dedicated calendar and store both on the user's profile.
    ///
    /// Returns the dedicated calendar id.
    pub async fn connect(&self, code: &str, uid: &str) -> TaskxResult<String> {
        let tokens = self.oauth.exchange_code(code).await?;

        let calendar_id = match self
            .calendar
            .find_calendar(&tokens, &self.config.name)
            .await?
        {
            Some(id) => {
                tracing::info!(user_id = uid, calendar_id = %id, "Reusing dedicated calendar");
                id
            }
            None => {
                let id = self
                    .calendar
                    .create_calendar(&tokens, &self.config.name, &self.config.calendar_time_zone)
                    .await?;
                tracing::info!(user_id = uid, calendar_id = %id, "Created dedicated calendar");
                id
            }
        };

        self.users
            .save_calendar_link(uid, &tokens, &calendar_id)
            .await?;

        Ok(calendar_id)
    }

    /// Make sure the task's deadline is on the calendar, updating the linked
    /// event or inserting a new one.
    pub async fn sync_task(&self, uid: &str, task: &SyncTask) -> TaskxResult<SyncOutcome> {
        let (tokens, calendar_id) = self.session(uid).await?;

        let event = TaskEvent::for_task(
            &task.task_id,
            &task.text,
            task.deadline,
            &self.config.event_time_zone,
        );

        match &task.calendar_event_id {
            Some(event_id) => {
                self.calendar
                    .update_event(&tokens, &calendar_id, event_id, &event)
                    .await?;
                tracing::debug!(task_id = %task.task_id, event_id = %event_id, "Updated calendar event");
                Ok(SyncOutcome {
                    event_id: event_id.clone(),
                    created: false,
                })
            }
            None => {
                let event_id = self
                    .calendar
                    .insert_event(&tokens, &calendar_id, &event)
                    .await?;
                tracing::info!(task_id = %task.task_id, event_id = %event_id, "Created calendar event");
                Ok(SyncOutcome {
                    event_id,
                    created: true,
                })
            }
        }
    }

    pub async fn delete_event(&self, uid: &str, event_id: &str) -> TaskxResult<()> {
        if event_id.trim().is_empty() {
            return Err(TaskxError::InvalidInput("Missing event ID".into()));
        }

        let (tokens, calendar_id) = self.session(uid).await?;
        self.calendar
            .delete_event(&tokens, &calendar_id, event_id)
            .await?;

        tracing::info!(user_id = uid, event_id, "Deleted calendar event");
        Ok(())
    }

    pub async fn disconnect(&self, uid: &str) -> TaskxResult<()> {
        self.users.clear_calendar_link(uid).await?;
        tracing::info!(user_id = uid, "Disconnected Google Calendar");
        Ok(())
    }

    /// Whether the user has finished the connect flow.
    pub async fn is_connected(&self, uid: &str) -> TaskxResult<bool> {
        Ok(self
            .users
            .get_user(uid)
            .await?
            .is_some_and(|u| u.is_calendar_connected()))
    }

    /// Tokens and calendar id for a connected user, refreshed if expired.
    async fn session(&self, uid: &str) -> TaskxResult<(TokenBundle, String)> {
        let user = self
            .users
            .get_user(uid)
            .await?
            .ok_or_else(|| TaskxError::NotFound(format!("User {uid}")))?;

        let (tokens, calendar_id) = user
            .calendar_link()
            .ok_or(TaskxError::IntegrationNotConnected)?;

        let tokens = self.fresh_tokens(uid, tokens, Utc::now()).await?;
        Ok((tokens, calendar_id.to_string()))
    }

    /// Return `tokens` untouched while they are valid; otherwise refresh once,
    /// persist the result and return it. A failed refresh is `AuthExpired`.
    pub async fn fresh_tokens(
        &self,
        uid: &str,
        tokens: &TokenBundle,
        now: DateTime<Utc>,
    ) -> TaskxResult<TokenBundle> {
        if !tokens.is_expired_at(now) {
            return Ok(tokens.clone());
        }

        tracing::debug!(user_id = uid, "Access token expired, refreshing");

        let refreshed = match self.oauth.refresh(tokens).await {
            Ok(refreshed) => tokens.merge_refreshed(refreshed),
            Err(e) => {
                tracing::warn!(user_id = uid, error = %e, "Token refresh failed");
                return Err(TaskxError::AuthExpired(e.to_string()));
            }
        };

        self.users.update_tokens(uid, &refreshed).await?;
        Ok(refreshed)
    }
}
