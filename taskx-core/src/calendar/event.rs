use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Length of the event that mirrors a task deadline.
pub const EVENT_DURATION_MINUTES: i64 = 60;

/// Popup reminder shown this many minutes before the deadline.
pub const POPUP_REMINDER_MINUTES: i64 = 30;

/// Calendar event mirroring a task's text and deadline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEvent {
    pub summary: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub time_zone: String,
    pub reminder_minutes: i64,
}

impl TaskEvent {
    pub fn for_task(task_id: &str, text: &str, deadline: DateTime<Utc>, time_zone: &str) -> Self {
        TaskEvent {
            summary: text.to_string(),
            description: format!("Task from TaskX (ID: {task_id})"),
            start: deadline,
            end: deadline + Duration::minutes(EVENT_DURATION_MINUTES),
            time_zone: time_zone.to_string(),
            reminder_minutes: POPUP_REMINDER_MINUTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_event_lasts_one_hour_with_half_hour_popup() {
        let deadline = Utc.with_ymd_and_hms(2025, 3, 20, 15, 0, 0).unwrap();
        let event = TaskEvent::for_task("t1", "Dentist", deadline, "UTC");

        assert_eq!(event.end - event.start, Duration::hours(1));
        assert_eq!(event.reminder_minutes, 30);
        assert_eq!(event.description, "Task from TaskX (ID: t1)");
    }
}
