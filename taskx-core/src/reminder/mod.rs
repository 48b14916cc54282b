//! Deadline reminders by email and SMS.

mod dispatcher;
mod message;

pub use dispatcher::{DispatchDetails, DispatchSummary, FailedReminder, ReminderDispatcher};
pub use message::ReminderContent;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::config::ReminderConfig;
use crate::error::TaskxResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsMessage {
    pub to: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> TaskxResult<()>;
}

#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send(&self, message: &SmsMessage) -> TaskxResult<()>;
}

/// The slice of upcoming time a dispatcher run looks at.
///
/// With the defaults a run at `T` picks up deadlines in `[T+9m, T+10m]`.
/// A scheduler calling less often than the window width can miss tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderWindow {
    pub start: Duration,
    pub end: Duration,
}

impl Default for ReminderWindow {
    fn default() -> Self {
        ReminderWindow {
            start: Duration::minutes(9),
            end: Duration::minutes(10),
        }
    }
}

impl ReminderWindow {
    pub fn from_config(config: &ReminderConfig) -> Self {
        ReminderWindow {
            start: Duration::minutes(config.window_start_minutes.into()),
            end: Duration::minutes(config.window_end_minutes.into()),
        }
    }

    pub fn bounds(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (now + self.start, now + self.end)
    }
}
