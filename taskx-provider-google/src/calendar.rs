//! Dedicated calendar and event calls.

use async_trait::async_trait;
use google_calendar::types::{Calendar, MinAccessRole, SendUpdates};
use taskx_core::calendar::{CalendarApi, TaskEvent};
use taskx_core::user::TokenBundle;
use taskx_core::{TaskxError, TaskxResult};

use crate::oauth::GoogleCalendar;
use crate::to_google::ToGoogle;

fn upstream(context: String, e: impl std::fmt::Display) -> TaskxError {
    TaskxError::Upstream(format!("{context}: {e}"))
}

/// Google answers 410 for an event that was already deleted.
fn is_gone(message: &str) -> bool {
    message.contains("410") || message.contains("Gone")
}

#[async_trait]
impl CalendarApi for GoogleCalendar {
    async fn find_calendar(&self, tokens: &TokenBundle, name: &str) -> TaskxResult<Option<String>> {
        let calendars = self
            .client_for(tokens)
            .calendar_list()
            .list_all(MinAccessRole::default(), false, false)
            .await
            .map_err(|e| upstream("Failed to fetch calendars".into(), e))?
            .body;

        Ok(calendars
            .into_iter()
            .find(|cal| cal.summary == name)
            .map(|cal| cal.id))
    }

    async fn create_calendar(
        &self,
        tokens: &TokenBundle,
        name: &str,
        time_zone: &str,
    ) -> TaskxResult<String> {
        let calendar = Calendar {
            summary: name.to_string(),
            time_zone: time_zone.to_string(),
            ..Default::default()
        };

        let created = self
            .client_for(tokens)
            .calendars()
            .insert(&calendar)
            .await
            .map_err(|e| upstream(format!("Failed to create calendar: {name}"), e))?
            .body;

        Ok(created.id)
    }

    async fn insert_event(
        &self,
        tokens: &TokenBundle,
        calendar_id: &str,
        event: &TaskEvent,
    ) -> TaskxResult<String> {
        let google_event = event.to_google();

        let created = self
            .client_for(tokens)
            .events()
            .insert(
                calendar_id,
                0,
                0,
                false,
                SendUpdates::None,
                false,
                &google_event,
            )
            .await
            .map_err(|e| upstream(format!("Failed to create event: {}", event.summary), e))?
            .body;

        if created.id.is_empty() {
            return Err(TaskxError::Upstream(
                "Calendar returned an event without an id".into(),
            ));
        }

        Ok(created.id)
    }

    async fn update_event(
        &self,
        tokens: &TokenBundle,
        calendar_id: &str,
        event_id: &str,
        event: &TaskEvent,
    ) -> TaskxResult<()> {
        let google_event = event.to_google();

        self.client_for(tokens)
            .events()
            .update(
                calendar_id,
                event_id,
                0,
                0,
                false,
                SendUpdates::None,
                false,
                &google_event,
            )
            .await
            .map_err(|e| upstream(format!("Failed to update event: {event_id}"), e))?;

        Ok(())
    }

    async fn delete_event(
        &self,
        tokens: &TokenBundle,
        calendar_id: &str,
        event_id: &str,
    ) -> TaskxResult<()> {
        let result = self
            .client_for(tokens)
            .events()
            .delete(calendar_id, event_id, false, SendUpdates::None)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                let message = e.to_string();
                if is_gone(&message) {
                    tracing::debug!(event_id, "Event already deleted");
                    Ok(())
                } else {
                    Err(upstream(format!("Failed to delete event: {event_id}"), message))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gone_errors_count_as_deleted() {
        assert!(is_gone("code: 410 Gone, error: Resource has been deleted"));
        assert!(!is_gone("code: 404 Not Found"));
    }
}
