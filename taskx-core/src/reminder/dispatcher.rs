use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::error::TaskxResult;
use crate::reminder::{
    EmailMessage, Mailer, ReminderContent, ReminderWindow, SmsMessage, SmsSender,
};
use crate::store::{TaskStore, UserStore};
use crate::task::Task;

/// Result of one dispatcher run, returned verbatim by the reminders endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchSummary {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<DispatchDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DispatchDetails {
    /// Ids of tasks that got at least one notification.
    pub successful: Vec<String>,
    pub failed: Vec<FailedReminder>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedReminder {
    pub task_id: String,
    pub reason: String,
}

impl DispatchSummary {
    fn nothing_to_do(message: &str) -> Self {
        DispatchSummary {
            success: true,
            message: message.to_string(),
            details: None,
        }
    }

    fn processed(details: DispatchDetails) -> Self {
        DispatchSummary {
            success: true,
            message: format!(
                "Reminders processed: {} sent successfully, {} failed.",
                details.successful.len(),
                details.failed.len()
            ),
            details: Some(details),
        }
    }
}

enum Outcome {
    Sent,
    /// Another run claimed the task first.
    Claimed,
}

/// Scans for tasks due shortly and notifies their owners.
///
/// Each task is reminded at most once: it is claimed with a conditional write
/// before anything is sent, and the claim is only given back when every
/// notification failed.
pub struct ReminderDispatcher {
    tasks: Arc<dyn TaskStore>,
    users: Arc<dyn UserStore>,
    mailer: Arc<dyn Mailer>,
    sms: Arc<dyn SmsSender>,
    window: ReminderWindow,
    display_tz: Tz,
}

impl ReminderDispatcher {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        users: Arc<dyn UserStore>,
        mailer: Arc<dyn Mailer>,
        sms: Arc<dyn SmsSender>,
        window: ReminderWindow,
        display_tz: Tz,
    ) -> Self {
        ReminderDispatcher {
            tasks,
            users,
            mailer,
            sms,
            window,
            display_tz,
        }
    }

    /// One pass over the tasks due in the window following `now`.
    ///
    /// Only a failing task query fails the run; per-task problems end up in
    /// the `failed` list.
    pub async fn run(&self, now: DateTime<Utc>) -> TaskxResult<DispatchSummary> {
        let (from, to) = self.window.bounds(now);
        tracing::info!(%from, %to, "Looking for tasks due in reminder window");

        let due = self.tasks.tasks_due_between(from, to).await?;
        tracing::info!(count = due.len(), "Found tasks in the time window");

        if due.is_empty() {
            return Ok(DispatchSummary::nothing_to_do(
                "No todos due in the target time window.",
            ));
        }

        let pending: Vec<Task> = due
            .into_iter()
            .filter(|task| {
                if task.reminder_sent {
                    tracing::debug!(task_id = %task.id, "Skipping task, reminder already sent");
                }
                !task.reminder_sent
            })
            .collect();

        if pending.is_empty() {
            return Ok(DispatchSummary::nothing_to_do("No new reminders needed."));
        }

        let mut details = DispatchDetails::default();

        for task in pending {
            match self.remind(&task).await {
                Ok(Outcome::Sent) => details.successful.push(task.id),
                Ok(Outcome::Claimed) => {
                    tracing::debug!(task_id = %task.id, "Task claimed by a concurrent run");
                }
                Err(reason) => {
                    tracing::warn!(task_id = %task.id, %reason, "Reminder failed");
                    details.failed.push(FailedReminder {
                        task_id: task.id,
                        reason,
                    });
                }
            }
        }

        tracing::info!(
            sent = details.successful.len(),
            failed = details.failed.len(),
            "Reminder run finished"
        );

        Ok(DispatchSummary::processed(details))
    }

    async fn remind(&self, task: &Task) -> Result<Outcome, String> {
        let user = match self.users.get_user(&task.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::warn!(task_id = %task.id, user_id = %task.user_id, "No user found for task");
                return Err("User not found".to_string());
            }
            Err(e) => return Err(format!("Processing error: {e}")),
        };

        let Some(deadline) = task.deadline else {
            return Err("Processing error: task has no deadline".to_string());
        };

        let content = ReminderContent::new(&task.text, deadline, self.display_tz);
        let preference = user.notification_type;

        let email = if preference.wants_email() {
            let message = user.email_address().map(|to| content.email(to));
            if message.is_none() {
                tracing::warn!(user_id = %user.uid, "Email reminder requested but no email on file");
            }
            message
        } else {
            None
        };

        let sms = if preference.wants_sms() {
            let message = user.phone().map(|to| content.sms(to));
            if message.is_none() {
                tracing::warn!(user_id = %user.uid, "SMS reminder requested but no phone number on file");
            }
            message
        } else {
            None
        };

        if email.is_none() && sms.is_none() {
            return Err("No notification channel available".to_string());
        }

        match self.tasks.claim_reminder(&task.id).await {
            Ok(true) => {}
            Ok(false) => return Ok(Outcome::Claimed),
            Err(e) => return Err(format!("Processing error: {e}")),
        }

        let (email_sent, sms_sent) = tokio::join!(
            self.send_email(&task.id, email.as_ref()),
            self.send_sms(&task.id, sms.as_ref()),
        );

        if email_sent || sms_sent {
            tracing::info!(task_id = %task.id, email_sent, sms_sent, "Task marked as reminded");
            return Ok(Outcome::Sent);
        }

        // Give the task back so a later run can try again
        if let Err(e) = self.tasks.release_reminder(&task.id).await {
            tracing::error!(task_id = %task.id, error = %e, "Failed to release reminder claim");
        }
        Err("All notification methods failed".to_string())
    }

    async fn send_email(&self, task_id: &str, message: Option<&EmailMessage>) -> bool {
        let Some(message) = message else {
            return false;
        };

        match self.mailer.send(message).await {
            Ok(()) => {
                tracing::info!(task_id, to = %message.to, "Email reminder sent");
                true
            }
            Err(e) => {
                tracing::error!(task_id, to = %message.to, error = %e, "Email reminder failed");
                false
            }
        }
    }

    async fn send_sms(&self, task_id: &str, message: Option<&SmsMessage>) -> bool {
        let Some(message) = message else {
            return false;
        };

        match self.sms.send(message).await {
            Ok(()) => {
                tracing::info!(task_id, to = %message.to, "SMS reminder sent");
                true
            }
            Err(e) => {
                tracing::error!(task_id, to = %message.to, error = %e, "SMS reminder failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockMailer, MockSms};
    use crate::store::DocumentStore;
    use crate::task::{PatchEffect, TaskPatch};
    use crate::user::{NotificationPreferences, NotificationType};
    use async_trait::async_trait;
    use chrono::Duration;

    struct Harness {
        store: Arc<DocumentStore>,
        mailer: Arc<MockMailer>,
        sms: Arc<MockSms>,
        dispatcher: ReminderDispatcher,
    }

    fn harness() -> Harness {
        let store = Arc::new(DocumentStore::in_memory());
        let mailer = Arc::new(MockMailer::new());
        let sms = Arc::new(MockSms::new());
        let dispatcher = ReminderDispatcher::new(
            store.clone(),
            store.clone(),
            mailer.clone(),
            sms.clone(),
            ReminderWindow::default(),
            chrono_tz::Asia::Kolkata,
        );
        Harness {
            store,
            mailer,
            sms,
            dispatcher,
        }
    }

    async fn add_user(store: &DocumentStore, uid: &str, kind: NotificationType) {
        store.ensure_user(uid, Some("owner@example.com")).await.unwrap();
        store
            .update_notification_preferences(
                uid,
                &NotificationPreferences {
                    notification_type: kind,
                    phone_number: Some("+919876543210".into()),
                },
            )
            .await
            .unwrap();
    }

    async fn add_task(store: &DocumentStore, uid: &str, deadline: DateTime<Utc>) -> Task {
        let mut task = Task::new(uid, "Renew passport");
        task.deadline = Some(deadline);
        store.insert_task(task).await.unwrap()
    }

    #[tokio::test]
    async fn test_both_channels_sent_and_task_marked() {
        let h = harness();
        let now = Utc::now();
        add_user(&h.store, "u1", NotificationType::Both).await;
        let task = add_task(&h.store, "u1", now + Duration::seconds(570)).await;

        let summary = h.dispatcher.run(now).await.unwrap();

        assert_eq!(h.mailer.sent().len(), 1);
        assert_eq!(h.sms.sent().len(), 1);
        let details = summary.details.unwrap();
        assert_eq!(details.successful, vec![task.id.clone()]);
        assert!(details.failed.is_empty());
        assert!(h.store.get_task(&task.id).await.unwrap().unwrap().reminder_sent);
    }

    #[tokio::test]
    async fn test_sms_success_is_enough_when_email_fails() {
        let h = harness();
        let now = Utc::now();
        add_user(&h.store, "u1", NotificationType::Both).await;
        let task = add_task(&h.store, "u1", now + Duration::seconds(570)).await;
        h.mailer.fail(true);

        let summary = h.dispatcher.run(now).await.unwrap();

        assert_eq!(summary.details.unwrap().successful, vec![task.id.clone()]);
        assert!(h.store.get_task(&task.id).await.unwrap().unwrap().reminder_sent);
    }

    #[tokio::test]
    async fn test_rerun_never_sends_twice() {
        let h = harness();
        let now = Utc::now();
        add_user(&h.store, "u1", NotificationType::Email).await;
        add_task(&h.store, "u1", now + Duration::seconds(570)).await;

        h.dispatcher.run(now).await.unwrap();
        let second = h
            .dispatcher
            .run(now + Duration::seconds(20))
            .await
            .unwrap();

        assert_eq!(h.mailer.sent().len(), 1);
        assert_eq!(second.message, "No new reminders needed.");
    }

    #[tokio::test]
    async fn test_task_outside_window_is_ignored() {
        let h = harness();
        let now = Utc::now();
        add_user(&h.store, "u1", NotificationType::Both).await;
        add_task(&h.store, "u1", now + Duration::minutes(20)).await;

        let summary = h.dispatcher.run(now).await.unwrap();

        assert_eq!(summary.message, "No todos due in the target time window.");
        assert!(summary.details.is_none());
        assert!(h.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_all_channels_failing_leaves_task_eligible() {
        let h = harness();
        let now = Utc::now();
        add_user(&h.store, "u1", NotificationType::Both).await;
        let task = add_task(&h.store, "u1", now + Duration::seconds(570)).await;
        h.mailer.fail(true);
        h.sms.fail(true);

        let summary = h.dispatcher.run(now).await.unwrap();

        let details = summary.details.unwrap();
        assert!(details.successful.is_empty());
        assert_eq!(details.failed[0].reason, "All notification methods failed");
        assert!(!h.store.get_task(&task.id).await.unwrap().unwrap().reminder_sent);
    }

    #[tokio::test]
    async fn test_missing_user_fails_task_but_not_batch() {
        let h = harness();
        let now = Utc::now();
        add_user(&h.store, "u1", NotificationType::Email).await;
        let orphan = add_task(&h.store, "ghost", now + Duration::seconds(560)).await;
        let owned = add_task(&h.store, "u1", now + Duration::seconds(580)).await;

        let summary = h.dispatcher.run(now).await.unwrap();

        let details = summary.details.unwrap();
        assert_eq!(details.successful, vec![owned.id]);
        assert_eq!(
            details.failed,
            vec![FailedReminder {
                task_id: orphan.id,
                reason: "User not found".into()
            }]
        );
        assert_eq!(summary.message, "Reminders processed: 1 sent successfully, 1 failed.");
    }

    #[tokio::test]
    async fn test_email_preference_does_not_send_sms() {
        let h = harness();
        let now = Utc::now();
        add_user(&h.store, "u1", NotificationType::Email).await;
        add_task(&h.store, "u1", now + Duration::seconds(570)).await;

        h.dispatcher.run(now).await.unwrap();

        assert_eq!(h.mailer.sent().len(), 1);
        assert!(h.sms.sent().is_empty());
    }

    #[tokio::test]
    async fn test_mobile_without_phone_has_no_channel() {
        let h = harness();
        let now = Utc::now();
        h.store.ensure_user("u1", Some("owner@example.com")).await.unwrap();
        // The store does not validate, so this mimics an old profile
        h.store
            .update_notification_preferences(
                "u1",
                &NotificationPreferences {
                    notification_type: NotificationType::Mobile,
                    phone_number: None,
                },
            )
            .await
            .unwrap();
        let task = add_task(&h.store, "u1", now + Duration::seconds(570)).await;

        let summary = h.dispatcher.run(now).await.unwrap();

        assert_eq!(
            summary.details.unwrap().failed,
            vec![FailedReminder {
                task_id: task.id,
                reason: "No notification channel available".into()
            }]
        );
        assert!(h.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_summary_json_shape() {
        let h = harness();
        let now = Utc::now();
        add_user(&h.store, "u1", NotificationType::Email).await;
        let task = add_task(&h.store, "u1", now + Duration::seconds(570)).await;

        let summary = h.dispatcher.run(now).await.unwrap();
        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["details"]["successful"][0], task.id);
        assert!(json["details"]["failed"].as_array().unwrap().is_empty());
    }

    /// Hands out the due tasks, then claims them before the caller can,
    /// the way an overlapping run would.
    struct RacingRun(Arc<DocumentStore>);

    #[async_trait]
    impl TaskStore for RacingRun {
        async fn insert_task(&self, task: Task) -> TaskxResult<Task> {
            self.0.insert_task(task).await
        }

        async fn get_task(&self, id: &str) -> TaskxResult<Option<Task>> {
            self.0.get_task(id).await
        }

        async fn tasks_for_user(&self, user_id: &str) -> TaskxResult<Vec<Task>> {
            self.0.tasks_for_user(user_id).await
        }

        async fn tasks_due_between(
            &self,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> TaskxResult<Vec<Task>> {
            let due = self.0.tasks_due_between(from, to).await?;
            for task in &due {
                self.0.claim_reminder(&task.id).await?;
            }
            Ok(due)
        }

        async fn patch_task(
            &self,
            id: &str,
            patch: TaskPatch,
            now: DateTime<Utc>,
        ) -> TaskxResult<(Task, PatchEffect)> {
            self.0.patch_task(id, patch, now).await
        }

        async fn set_calendar_event_id(
            &self,
            id: &str,
            event_id: Option<&str>,
        ) -> TaskxResult<()> {
            self.0.set_calendar_event_id(id, event_id).await
        }

        async fn claim_reminder(&self, id: &str) -> TaskxResult<bool> {
            self.0.claim_reminder(id).await
        }

        async fn release_reminder(&self, id: &str) -> TaskxResult<()> {
            self.0.release_reminder(id).await
        }

        async fn delete_task(&self, id: &str) -> TaskxResult<()> {
            self.0.delete_task(id).await
        }
    }

    #[tokio::test]
    async fn test_task_claimed_by_overlapping_run_is_left_alone() {
        let store = Arc::new(DocumentStore::in_memory());
        let mailer = Arc::new(MockMailer::new());
        let sms = Arc::new(MockSms::new());
        let dispatcher = ReminderDispatcher::new(
            Arc::new(RacingRun(store.clone())),
            store.clone(),
            mailer.clone(),
            sms.clone(),
            ReminderWindow::default(),
            chrono_tz::Asia::Kolkata,
        );
        let now = Utc::now();
        add_user(&store, "u1", NotificationType::Both).await;
        let task = add_task(&store, "u1", now + Duration::seconds(570)).await;

        let summary = dispatcher.run(now).await.unwrap();

        let details = summary.details.unwrap();
        assert!(details.successful.is_empty());
        assert!(details.failed.is_empty());
        assert!(mailer.sent().is_empty());
        assert!(sms.sent().is_empty());
        // The claim belongs to the other run and is not released
        assert!(store.get_task(&task.id).await.unwrap().unwrap().reminder_sent);
    }

    #[tokio::test]
    async fn test_failed_claim_write_leaves_task_unmarked() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let store = Arc::new(DocumentStore::open(&data_dir).await.unwrap());
        let mailer = Arc::new(MockMailer::new());
        let dispatcher = ReminderDispatcher::new(
            store.clone(),
            store.clone(),
            mailer.clone(),
            Arc::new(MockSms::new()),
            ReminderWindow::default(),
            chrono_tz::Asia::Kolkata,
        );
        let now = Utc::now();
        add_user(&store, "u1", NotificationType::Email).await;
        let task = add_task(&store, "u1", now + Duration::seconds(570)).await;
        std::fs::remove_dir_all(&data_dir).unwrap();

        let first = dispatcher.run(now).await.unwrap();

        let failed = first.details.unwrap().failed;
        assert_eq!(failed.len(), 1);
        assert!(failed[0].reason.starts_with("Processing error"));
        assert!(!store.get_task(&task.id).await.unwrap().unwrap().reminder_sent);

        std::fs::create_dir_all(&data_dir).unwrap();
        let second = dispatcher.run(now + Duration::seconds(20)).await.unwrap();

        assert_eq!(second.details.unwrap().successful, vec![task.id]);
        assert_eq!(mailer.sent().len(), 1);
    }
}
