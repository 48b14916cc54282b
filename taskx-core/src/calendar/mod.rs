//! External calendar integration.
//!
//! Task deadlines are mirrored into a dedicated calendar on the user's
//! Google account. The connector only knows the [`OAuthFlow`] and
//! [`CalendarApi`] traits; the Google implementation lives in
//! `taskx-provider-google`.

mod connector;
mod event;

pub use connector::{CalendarConnector, SyncOutcome, SyncTask, SyncTaskRequest};
pub use event::{EVENT_DURATION_MINUTES, POPUP_REMINDER_MINUTES, TaskEvent};

use async_trait::async_trait;

use crate::error::TaskxResult;
use crate::user::TokenBundle;

/// OAuth authorization-code flow against the calendar provider.
#[async_trait]
pub trait OAuthFlow: Send + Sync {
    /// Consent page URL. `state` comes back verbatim on the callback.
    fn authorization_url(&self, state: &str) -> String;

    /// Exchange an authorization code for an access/refresh token pair.
    async fn exchange_code(&self, code: &str) -> TaskxResult<TokenBundle>;

    /// Obtain a new access token using the refresh token.
    async fn refresh(&self, tokens: &TokenBundle) -> TaskxResult<TokenBundle>;
}

/// Calendar and event operations, authenticated with the user's tokens.
#[async_trait]
pub trait CalendarApi: Send + Sync {
    /// Id of the calendar named `name`, if the account has one.
    async fn find_calendar(&self, tokens: &TokenBundle, name: &str) -> TaskxResult<Option<String>>;

    async fn create_calendar(
        &self,
        tokens: &TokenBundle,
        name: &str,
        time_zone: &str,
    ) -> TaskxResult<String>;

    /// Insert an event and return the id the provider assigned to it.
    async fn insert_event(
        &self,
        tokens: &TokenBundle,
        calendar_id: &str,
        event: &TaskEvent,
    ) -> TaskxResult<String>;

    async fn update_event(
        &self,
        tokens: &TokenBundle,
        calendar_id: &str,
        event_id: &str,
        event: &TaskEvent,
    ) -> TaskxResult<()>;

    /// Delete an event. An event that is already gone counts as deleted.
    async fn delete_event(
        &self,
        tokens: &TokenBundle,
        calendar_id: &str,
        event_id: &str,
    ) -> TaskxResult<()>;
}
