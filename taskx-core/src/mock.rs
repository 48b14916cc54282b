//! In-memory stand-ins for the external collaborators, so services can be
//! exercised without Google, SMTP or Twilio.
//!
//! Each mock records what it was asked to do and can be told to fail.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::calendar::{CalendarApi, OAuthFlow, TaskEvent};
use crate::error::{TaskxError, TaskxResult};
use crate::identity::{IdentityVerifier, VerifiedIdentity};
use crate::reminder::{EmailMessage, Mailer, SmsMessage, SmsSender};
use crate::user::TokenBundle;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A call received by [`MockCalendar`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarCall {
    Exchange,
    Refresh,
    FindCalendar(String),
    CreateCalendar(String),
    InsertEvent,
    UpdateEvent(String),
    DeleteEvent(String),
}

#[derive(Default)]
struct CalendarState {
    calls: Vec<CalendarCall>,
    calendars: Vec<(String, String)>,
    events: Vec<(String, TaskEvent)>,
    next_id: u32,
    refreshes: u32,
    fail_exchange: bool,
    fail_refresh: bool,
    fail_events: bool,
    fail_delete: bool,
}

/// Fake OAuth server and calendar in one.
#[derive(Default)]
pub struct MockCalendar {
    state: Mutex<CalendarState>,
}

impl MockCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_calendar(&self, id: &str, name: &str) {
        lock(&self.state)
            .calendars
            .push((id.to_string(), name.to_string()));
    }

    pub fn fail_exchange(&self, fail: bool) {
        lock(&self.state).fail_exchange = fail;
    }

    pub fn fail_refresh(&self, fail: bool) {
        lock(&self.state).fail_refresh = fail;
    }

    /// Make inserts and updates fail.
    pub fn fail_events(&self, fail: bool) {
        lock(&self.state).fail_events = fail;
    }

    pub fn fail_delete(&self, fail: bool) {
        lock(&self.state).fail_delete = fail;
    }

    pub fn calls(&self) -> Vec<CalendarCall> {
        lock(&self.state).calls.clone()
    }

    /// Events currently on the calendar, as `(event id, event)`.
    pub fn events(&self) -> Vec<(String, TaskEvent)> {
        lock(&self.state).events.clone()
    }

    fn record(&self, call: CalendarCall) -> MutexGuard<'_, CalendarState> {
        let mut state = lock(&self.state);
        state.calls.push(call);
        state
    }
}

#[async_trait]
impl OAuthFlow for MockCalendar {
    fn authorization_url(&self, state: &str) -> String {
        format!("https://accounts.example.com/o/oauth2/auth?state={state}")
    }

    async fn exchange_code(&self, _code: &str) -> TaskxResult<TokenBundle> {
        let state = self.record(CalendarCall::Exchange);
        if state.fail_exchange {
            return Err(TaskxError::Upstream("invalid_grant".into()));
        }
        Ok(TokenBundle {
            access_token: "access-0".into(),
            refresh_token: Some("refresh-0".into()),
            scope: Some("https://www.googleapis.com/auth/calendar".into()),
            token_type: Some("Bearer".into()),
            expiry_date: Some(Utc::now() + Duration::hours(1)),
        })
    }

    async fn refresh(&self, _tokens: &TokenBundle) -> TaskxResult<TokenBundle> {
        let mut state = self.record(CalendarCall::Refresh);
        if state.fail_refresh {
            return Err(TaskxError::Upstream("invalid_grant: Token has been revoked".into()));
        }
        state.refreshes += 1;
        Ok(TokenBundle {
            access_token: format!("access-{}", state.refreshes),
            refresh_token: None,
            scope: None,
            token_type: None,
            expiry_date: Some(Utc::now() + Duration::hours(1)),
        })
    }
}

#[async_trait]
impl CalendarApi for MockCalendar {
    async fn find_calendar(&self, _tokens: &TokenBundle, name: &str) -> TaskxResult<Option<String>> {
        let state = self.record(CalendarCall::FindCalendar(name.to_string()));
        Ok(state
            .calendars
            .iter()
            .find(|(_, n)| n == name)
            .map(|(id, _)| id.clone()))
    }

    async fn create_calendar(
        &self,
        _tokens: &TokenBundle,
        name: &str,
        _time_zone: &str,
    ) -> TaskxResult<String> {
        let mut state = self.record(CalendarCall::CreateCalendar(name.to_string()));
        state.next_id += 1;
        let id = format!("calendar-{}", state.next_id);
        state.calendars.push((id.clone(), name.to_string()));
        Ok(id)
    }

    async fn insert_event(
        &self,
        _tokens: &TokenBundle,
        _calendar_id: &str,
        event: &TaskEvent,
    ) -> TaskxResult<String> {
        let mut state = self.record(CalendarCall::InsertEvent);
        if state.fail_events {
            return Err(TaskxError::Upstream("Rate Limit Exceeded".into()));
        }
        state.next_id += 1;
        let id = format!("event-{}", state.next_id);
        state.events.push((id.clone(), event.clone()));
        Ok(id)
    }

    async fn update_event(
        &self,
        _tokens: &TokenBundle,
        _calendar_id: &str,
        event_id: &str,
        event: &TaskEvent,
    ) -> TaskxResult<()> {
        let mut state = self.record(CalendarCall::UpdateEvent(event_id.to_string()));
        if state.fail_events {
            return Err(TaskxError::Upstream("Rate Limit Exceeded".into()));
        }
        match state.events.iter_mut().find(|(id, _)| id == event_id) {
            Some((_, stored)) => {
                *stored = event.clone();
                Ok(())
            }
            None => Err(TaskxError::Upstream("Not Found".into())),
        }
    }

    async fn delete_event(
        &self,
        _tokens: &TokenBundle,
        _calendar_id: &str,
        event_id: &str,
    ) -> TaskxResult<()> {
        let mut state = self.record(CalendarCall::DeleteEvent(event_id.to_string()));
        if state.fail_delete {
            return Err(TaskxError::Upstream("Backend Error".into()));
        }
        state.events.retain(|(id, _)| id != event_id);
        Ok(())
    }
}

struct OutboxState<T> {
    sent: Vec<T>,
    fail: bool,
}

impl<T> Default for OutboxState<T> {
    fn default() -> Self {
        OutboxState {
            sent: Vec::new(),
            fail: false,
        }
    }
}

/// Records emails instead of sending them.
#[derive(Default)]
pub struct MockMailer {
    state: Mutex<OutboxState<EmailMessage>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, fail: bool) {
        lock(&self.state).fail = fail;
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        lock(&self.state).sent.clone()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, message: &EmailMessage) -> TaskxResult<()> {
        let mut state = lock(&self.state);
        if state.fail {
            return Err(TaskxError::Upstream("535 Authentication failed".into()));
        }
        state.sent.push(message.clone());
        Ok(())
    }
}

/// Records text messages instead of sending them.
#[derive(Default)]
pub struct MockSms {
    state: Mutex<OutboxState<SmsMessage>>,
}

impl MockSms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, fail: bool) {
        lock(&self.state).fail = fail;
    }

    pub fn sent(&self) -> Vec<SmsMessage> {
        lock(&self.state).sent.clone()
    }
}

#[async_trait]
impl SmsSender for MockSms {
    async fn send(&self, message: &SmsMessage) -> TaskxResult<()> {
        let mut state = lock(&self.state);
        if state.fail {
            return Err(TaskxError::Upstream("The 'To' number is not a valid phone number".into()));
        }
        state.sent.push(message.clone());
        Ok(())
    }
}

/// Accepts a fixed set of tokens.
#[derive(Default)]
pub struct StaticIdentity {
    users: HashMap<String, VerifiedIdentity>,
}

impl StaticIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, token: &str, uid: &str, email: Option<&str>) -> Self {
        self.users.insert(
            token.to_string(),
            VerifiedIdentity {
                uid: uid.to_string(),
                email: email.map(str::to_string),
            },
        );
        self
    }
}

#[async_trait]
impl IdentityVerifier for StaticIdentity {
    async fn verify(&self, id_token: &str) -> TaskxResult<VerifiedIdentity> {
        self.users
            .get(id_token)
            .cloned()
            .ok_or_else(|| TaskxError::Unauthorized("Invalid identity token".into()))
    }
}
