//! To-do items and the edits that can be applied to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{TaskxError, TaskxResult};

/// Priority given to tasks created without one (lowest urgency).
pub const DEFAULT_PRIORITY: u8 = 4;

/// Tasks at or below this priority show up in the "important" view.
pub const IMPORTANT_PRIORITY: u8 = 2;

/// A to-do item as stored in the `todos` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub user_id: String,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Lower is more urgent.
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    /// Free-form recurrence descriptor (e.g. "daily", "weekly").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar_event_id: Option<String>,
    #[serde(default)]
    pub reminder_sent: bool,
}

fn default_priority() -> u8 {
    DEFAULT_PRIORITY
}

impl Task {
    pub fn new(user_id: impl Into<String>, text: impl Into<String>) -> Self {
        Task {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            text: text.into(),
            completed: false,
            created_at: Utc::now(),
            completed_at: None,
            priority: DEFAULT_PRIORITY,
            project: None,
            deadline: None,
            recurring: None,
            calendar_event_id: None,
            reminder_sent: false,
        }
    }

    pub fn is_important(&self) -> bool {
        self.priority <= IMPORTANT_PRIORITY
    }

    /// Mark the task done (or not done), keeping `completed_at` in step.
    pub fn set_completed(&mut self, completed: bool, now: DateTime<Utc>) {
        self.completed = completed;
        self.completed_at = if completed { Some(now) } else { None };
    }

    /// Move the deadline. A new deadline is a new reminder instance, so the
    /// reminded flag starts over.
    pub fn set_deadline(&mut self, deadline: Option<DateTime<Utc>>) {
        if self.deadline != deadline {
            self.deadline = deadline;
            self.reminder_sent = false;
        }
    }
}

/// Fields accepted when creating a task.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub text: String,
    #[serde(default)]
    pub priority: Option<u8>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub recurring: Option<String>,
}

impl NewTask {
    pub fn into_task(self, user_id: &str) -> TaskxResult<Task> {
        let text = validate_text(&self.text)?;

        let mut task = Task::new(user_id, text);
        task.priority = self.priority.unwrap_or(DEFAULT_PRIORITY);
        task.project = self.project.filter(|p| !p.trim().is_empty());
        task.deadline = self.deadline;
        task.recurring = self.recurring.filter(|r| !r.trim().is_empty());
        Ok(task)
    }
}

/// Partial update of a task. `deadline: Some(None)` clears the deadline.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub priority: Option<u8>,
    #[serde(default, deserialize_with = "double_option")]
    pub project: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub deadline: Option<Option<DateTime<Utc>>>,
    #[serde(default)]
    pub completed: Option<bool>,
}

/// What changed after applying a [`TaskPatch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchEffect {
    pub text_changed: bool,
    pub deadline_changed: bool,
}

impl TaskPatch {
    pub fn apply(self, task: &mut Task, now: DateTime<Utc>) -> TaskxResult<PatchEffect> {
        let mut effect = PatchEffect::default();

        if let Some(text) = self.text {
            let text = validate_text(&text)?;
            effect.text_changed = text != task.text;
            task.text = text;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(project) = self.project {
            task.project = project.filter(|p| !p.trim().is_empty());
        }
        if let Some(deadline) = self.deadline {
            effect.deadline_changed = deadline != task.deadline;
            task.set_deadline(deadline);
        }
        if let Some(completed) = self.completed {
            if completed != task.completed {
                task.set_completed(completed, now);
            }
        }

        Ok(effect)
    }
}

fn validate_text(text: &str) -> TaskxResult<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(TaskxError::InvalidInput("Task text must not be empty".into()));
    }
    Ok(text.to_string())
}

// Distinguishes an absent field from an explicit `null`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
