use google_calendar::types::{Event, EventDateTime, EventReminder, Reminders};
use taskx_core::calendar::TaskEvent;

pub trait ToGoogle {
    fn to_google(&self) -> Event;
}

impl ToGoogle for TaskEvent {
    fn to_google(&self) -> Event {
        let start = EventDateTime {
            date: None,
            date_time: Some(self.start),
            time_zone: self.time_zone.clone(),
        };
        let end = EventDateTime {
            date: None,
            date_time: Some(self.end),
            time_zone: self.time_zone.clone(),
        };

        let reminders = Reminders {
            overrides: vec![EventReminder {
                method: "popup".to_string(),
                minutes: self.reminder_minutes,
            }],
            use_default: false,
        };

        Event {
            summary: self.summary.clone(),
            description: self.description.clone(),
            start: Some(start),
            end: Some(end),
            reminders: Some(reminders),
            visibility: "public".to_string(),
            transparency: "opaque".to_string(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_task_event_to_google() {
        let deadline = Utc.with_ymd_and_hms(2025, 3, 20, 15, 0, 0).unwrap();
        let event = TaskEvent::for_task("t1", "Dentist", deadline, "UTC").to_google();

        assert!(event.id.is_empty());
        assert_eq!(event.summary, "Dentist");
        assert_eq!(event.description, "Task from TaskX (ID: t1)");
        assert_eq!(event.visibility, "public");
        assert_eq!(event.transparency, "opaque");

        let start = event.start.unwrap();
        assert_eq!(start.date_time, Some(deadline));
        assert_eq!(start.time_zone, "UTC");
        assert_eq!(
            event.end.unwrap().date_time,
            Some(deadline + chrono::Duration::hours(1))
        );

        let reminders = event.reminders.unwrap();
        assert!(!reminders.use_default);
        assert_eq!(reminders.overrides.len(), 1);
        assert_eq!(reminders.overrides[0].method, "popup");
        assert_eq!(reminders.overrides[0].minutes, 30);
    }
}
