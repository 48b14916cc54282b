//! Task and user persistence.
//!
//! The services only talk to the [`TaskStore`] and [`UserStore`] traits, so
//! the backing document database can be swapped without touching them.

mod document;

pub use document::DocumentStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::TaskxResult;
use crate::task::{PatchEffect, Task, TaskPatch};
use crate::user::{NotificationPreferences, TokenBundle, UserProfile};

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert_task(&self, task: Task) -> TaskxResult<Task>;

    async fn get_task(&self, id: &str) -> TaskxResult<Option<Task>>;

    /// All tasks owned by a user, newest first.
    async fn tasks_for_user(&self, user_id: &str) -> TaskxResult<Vec<Task>>;

    /// Tasks whose deadline lies in `[from, to]`, both ends included.
    async fn tasks_due_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> TaskxResult<Vec<Task>>;

    /// Apply `patch` to the stored task in a single step and return the
    /// result. Fields the patch does not touch, `reminderSent` included, keep
    /// their stored value. Fails with `NotFound` if the task does not exist.
    async fn patch_task(
        &self,
        id: &str,
        patch: TaskPatch,
        now: DateTime<Utc>,
    ) -> TaskxResult<(Task, PatchEffect)>;

    async fn set_calendar_event_id(&self, id: &str, event_id: Option<&str>) -> TaskxResult<()>;

    /// Set `reminderSent` only if it is still false.
    ///
    /// Returns `true` when this call flipped the flag, `false` when somebody
    /// else already had.
    async fn claim_reminder(&self, id: &str) -> TaskxResult<bool>;

    /// Undo a claim whose notifications all failed.
    async fn release_reminder(&self, id: &str) -> TaskxResult<()>;

    async fn delete_task(&self, id: &str) -> TaskxResult<()>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, uid: &str) -> TaskxResult<Option<UserProfile>>;

    /// Create the profile on first sign-in, filling in a missing email.
    async fn ensure_user(&self, uid: &str, email: Option<&str>) -> TaskxResult<UserProfile>;

    /// Store tokens and calendar id, leaving every other profile field alone.
    /// Creates the profile if it does not exist yet.
    async fn save_calendar_link(
        &self,
        uid: &str,
        tokens: &TokenBundle,
        calendar_id: &str,
    ) -> TaskxResult<()>;

    async fn update_tokens(&self, uid: &str, tokens: &TokenBundle) -> TaskxResult<()>;

    async fn clear_calendar_link(&self, uid: &str) -> TaskxResult<()>;

    async fn update_notification_preferences(
        &self,
        uid: &str,
        prefs: &NotificationPreferences,
    ) -> TaskxResult<UserProfile>;
}
