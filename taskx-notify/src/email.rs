//! Reminder emails over authenticated SMTP.

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use taskx_core::config::SmtpConfig;
use taskx_core::reminder::{EmailMessage, Mailer};
use taskx_core::{TaskxError, TaskxResult};

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build a mailer relaying through `config.host` over TLS.
    ///
    /// No connection is made until the first message is sent.
    pub fn from_config(config: &SmtpConfig) -> TaskxResult<Self> {
        let address: Address = config.username.parse().map_err(|e| {
            TaskxError::Config(format!("Invalid smtp.username '{}': {e}", config.username))
        })?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| TaskxError::Config(format!("Invalid smtp.host '{}': {e}", config.host)))?
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(SmtpMailer {
            transport,
            from: Mailbox::new(Some(config.from_name.clone()), address),
        })
    }

    fn build(&self, message: &EmailMessage) -> TaskxResult<Message> {
        let to: Mailbox = message.to.parse().map_err(|e| {
            TaskxError::InvalidInput(format!("Invalid recipient '{}': {e}", message.to))
        })?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&message.subject)
            .multipart(MultiPart::alternative_plain_html(
                message.text.clone(),
                message.html.clone(),
            ))
            .map_err(|e| TaskxError::Upstream(format!("Failed to build email: {e}")))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &EmailMessage) -> TaskxResult<()> {
        let email = self.build(message)?;

        let response = self
            .transport
            .send(email)
            .await
            .map_err(|e| TaskxError::Upstream(format!("SMTP delivery failed: {e}")))?;

        tracing::debug!(to = %message.to, code = %response.code(), "Email accepted by SMTP relay");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mailer() -> SmtpMailer {
        SmtpMailer::from_config(&SmtpConfig {
            username: "reminders@example.com".into(),
            password: "app-password".into(),
            ..Default::default()
        })
        .unwrap()
    }

    fn message(to: &str) -> EmailMessage {
        EmailMessage {
            to: to.into(),
            subject: "Reminder: Dentist".into(),
            html: "<h2>Dentist</h2>".into(),
            text: "Reminder: Your task \"Dentist\" is due soon.".into(),
        }
    }

    #[tokio::test]
    async fn test_message_has_sender_name_and_both_parts() {
        let email = mailer().build(&message("me@example.com")).unwrap();
        let raw = String::from_utf8(email.formatted()).unwrap();

        let from = raw.lines().find(|l| l.starts_with("From: ")).unwrap();
        assert!(from.contains("Task Reminder"));
        assert!(from.contains("<reminders@example.com>"));
        assert!(raw.contains("To: me@example.com"));
        assert!(raw.contains("Subject: Reminder: Dentist"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/plain"));
        assert!(raw.contains("text/html"));
    }

    #[tokio::test]
    async fn test_invalid_recipient_is_rejected() {
        let err = mailer().build(&message("not an address")).unwrap_err();
        assert!(matches!(err, TaskxError::InvalidInput(_)));
    }

    #[test]
    fn test_invalid_sender_is_a_config_error() {
        let err = SmtpMailer::from_config(&SmtpConfig::default()).err();
        assert!(matches!(err, Some(TaskxError::Config(_))));
    }
}
