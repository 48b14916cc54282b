//! Delivery channels for deadline reminders.

mod email;
mod sms;

pub use email::SmtpMailer;
pub use sms::TwilioSms;
