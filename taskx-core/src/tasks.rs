//! Task mutations that keep the mirrored calendar event in step.
//!
//! A calendar failure never undoes a task change: the caller gets the saved
//! task plus a [`CalendarSync`] status describing what happened remotely.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::calendar::{CalendarConnector, SyncTask};
use crate::error::{TaskxError, TaskxResult};
use crate::store::TaskStore;
use crate::task::{NewTask, Task, TaskPatch};

/// What happened on the calendar side of a task mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum CalendarSync {
    /// Nothing to mirror.
    Skipped,
    NotConnected,
    Synced {
        #[serde(rename = "eventId")]
        event_id: String,
    },
    /// The linked event was deleted.
    Removed,
    Failed {
        error: String,
        #[serde(rename = "needsIntegration")]
        needs_integration: bool,
    },
}

impl CalendarSync {
    fn failed(err: &TaskxError) -> Self {
        CalendarSync::Failed {
            error: err.to_string(),
            needs_integration: err.needs_integration(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskMutation {
    pub task: Task,
    pub calendar: CalendarSync,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDeletion {
    pub task_id: String,
    pub calendar: CalendarSync,
}

pub struct TaskService {
    tasks: Arc<dyn TaskStore>,
    connector: Arc<CalendarConnector>,
}

impl TaskService {
    pub fn new(tasks: Arc<dyn TaskStore>, connector: Arc<CalendarConnector>) -> Self {
        TaskService { tasks, connector }
    }

    pub async fn list(&self, uid: &str) -> TaskxResult<Vec<Task>> {
        self.tasks.tasks_for_user(uid).await
    }

    pub async fn create(&self, uid: &str, new: NewTask) -> TaskxResult<TaskMutation> {
        let task = self.tasks.insert_task(new.into_task(uid)?).await?;
        tracing::info!(task_id = %task.id, user_id = uid, "Created task");

        if task.deadline.is_none() {
            return Ok(TaskMutation {
                task,
                calendar: CalendarSync::Skipped,
            });
        }

        let (task, calendar) = self.mirror(uid, task).await;
        Ok(TaskMutation { task, calendar })
    }

    pub async fn update(&self, uid: &str, id: &str, patch: TaskPatch) -> TaskxResult<TaskMutation> {
        self.owned(uid, id).await?;
        let (task, effect) = self.tasks.patch_task(id, patch, Utc::now()).await?;

        let needs_sync = effect.text_changed
            || effect.deadline_changed
            || task.calendar_event_id.is_none();

        let (task, calendar) = match (task.deadline, task.calendar_event_id.clone()) {
            (Some(_), _) if needs_sync => self.mirror(uid, task).await,
            (None, Some(event_id)) => self.unlink(uid, task, &event_id).await,
            _ => (task, CalendarSync::Skipped),
        };

        Ok(TaskMutation { task, calendar })
    }

    /// Delete a task, removing its calendar event first. The task is deleted
    /// even when the event cannot be.
    pub async fn delete(&self, uid: &str, id: &str) -> TaskxResult<TaskDeletion> {
        let task = self.owned(uid, id).await?;

        let calendar = match &task.calendar_event_id {
            Some(event_id) => match self.connector.delete_event(uid, event_id).await {
                Ok(()) => CalendarSync::Removed,
                Err(e) => {
                    tracing::warn!(
                        task_id = %task.id,
                        event_id = %event_id,
                        error = %e,
                        "Could not delete calendar event, deleting task anyway"
                    );
                    CalendarSync::failed(&e)
                }
            },
            None => CalendarSync::Skipped,
        };

        self.tasks.delete_task(&task.id).await?;
        tracing::info!(task_id = %task.id, user_id = uid, "Deleted task");

        Ok(TaskDeletion {
            task_id: task.id,
            calendar,
        })
    }

    async fn owned(&self, uid: &str, id: &str) -> TaskxResult<Task> {
        match self.tasks.get_task(id).await? {
            Some(task) if task.user_id == uid => Ok(task),
            _ => Err(TaskxError::NotFound(format!("Task {id}"))),
        }
    }

    /// Push the task's deadline to the calendar, storing a new event id.
    async fn mirror(&self, uid: &str, mut task: Task) -> (Task, CalendarSync) {
        let Some(deadline) = task.deadline else {
            return (task, CalendarSync::Skipped);
        };

        let request = SyncTask {
            task_id: task.id.clone(),
            text: task.text.clone(),
            deadline,
            calendar_event_id: task.calendar_event_id.clone(),
        };

        let outcome = match self.connector.sync_task(uid, &request).await {
            Ok(outcome) => outcome,
            Err(TaskxError::IntegrationNotConnected) => {
                return (task, CalendarSync::NotConnected);
            }
            Err(e) => {
                tracing::warn!(task_id = %task.id, error = %e, "Calendar sync failed");
                return (task, CalendarSync::failed(&e));
            }
        };

        if outcome.created {
            match self
                .tasks
                .set_calendar_event_id(&task.id, Some(&outcome.event_id))
                .await
            {
                Ok(()) => task.calendar_event_id = Some(outcome.event_id.clone()),
                Err(e) => {
                    tracing::error!(
                        task_id = %task.id,
                        event_id = %outcome.event_id,
                        error = %e,
                        "Failed to store calendar event id"
                    );
                    return (task, CalendarSync::failed(&e));
                }
            }
        }

        let event_id = outcome.event_id;
        (task, CalendarSync::Synced { event_id })
    }

    /// The deadline is gone, so the mirrored event goes too.
    async fn unlink(&self, uid: &str, mut task: Task, event_id: &str) -> (Task, CalendarSync) {
        if let Err(e) = self.connector.delete_event(uid, event_id).await {
            tracing::warn!(task_id = %task.id, event_id, error = %e, "Could not delete calendar event");
            return (task, CalendarSync::failed(&e));
        }

        if let Err(e) = self.tasks.set_calendar_event_id(&task.id, None).await {
            return (task, CalendarSync::failed(&e));
        }
        task.calendar_event_id = None;
        (task, CalendarSync::Removed)
    }
}
