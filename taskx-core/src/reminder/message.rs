use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::reminder::{EmailMessage, SmsMessage};

/// Text of a reminder for one task, rendered for the user's eyes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderContent {
    pub text: String,
    /// Deadline as shown to the user, e.g. "March 20, 2025, 08:30 PM".
    pub due: String,
}

impl ReminderContent {
    pub fn new(text: &str, deadline: DateTime<Utc>, tz: Tz) -> Self {
        ReminderContent {
            text: text.to_string(),
            due: deadline
                .with_timezone(&tz)
                .format("%B %-d, %Y, %I:%M %p")
                .to_string(),
        }
    }

    pub fn email(&self, to: &str) -> EmailMessage {
        let text = html_escape(&self.text);
        let due = html_escape(&self.due);

        let html = format!(
            r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px; border: 1px solid #e0e0e0; border-radius: 5px;">
  <div style="background-color: #4a86e8; padding: 15px; border-radius: 5px 5px 0 0;">
    <h1 style="color: white; margin: 0; font-size: 22px;">Task Reminder</h1>
  </div>
  <div style="padding: 20px; background-color: #f9f9f9;">
    <p style="font-size: 16px; color: #333;">Hi there,</p>
    <p style="font-size: 16px; color: #333;">Just a friendly reminder that your task is due soon:</p>
    <div style="background-color: white; padding: 15px; border-left: 4px solid #4a86e8; margin: 15px 0;">
      <h2 style="margin-top: 0; color: #333; font-size: 18px;">{text}</h2>
      <p style="color: #666; margin-bottom: 0;"><strong>Due:</strong> {due}</p>
    </div>
    <p style="font-size: 16px; color: #333;">Don't forget to complete it on time!</p>
    <div style="margin-top: 30px; padding-top: 15px; border-top: 1px solid #e0e0e0;">
      <p style="font-size: 14px; color: #777; margin: 0;">This is an automated reminder from your task management app.</p>
    </div>
  </div>
</div>"#
        );

        EmailMessage {
            to: to.to_string(),
            subject: format!("Reminder: {}", self.text),
            html,
            text: format!(
                "Reminder: Your task \"{}\" is due at {}.\n\nDon't forget to complete it!",
                self.text, self.due
            ),
        }
    }

    pub fn sms(&self, to: &str) -> SmsMessage {
        SmsMessage {
            to: to.to_string(),
            body: format!(
                "Reminder: Your task \"{}\" is due at {}. Don't forget to complete it!",
                self.text, self.due
            ),
        }
    }
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
