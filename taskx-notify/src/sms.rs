//! Reminder text messages through the Twilio REST API.

use async_trait::async_trait;
use serde::Deserialize;
use taskx_core::config::TwilioConfig;
use taskx_core::reminder::{SmsMessage, SmsSender};
use taskx_core::{TaskxError, TaskxResult};

pub struct TwilioSms {
    account_sid: String,
    auth_token: String,
    from_number: String,
    base_url: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct MessageResource {
    sid: String,
    #[serde(default)]
    status: Option<String>,
}

/// Twilio's error body, e.g. `{"code": 21211, "message": "The 'To' number ..."}`.
#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<u32>,
    message: String,
}

impl TwilioSms {
    pub fn from_config(config: &TwilioConfig) -> Self {
        TwilioSms {
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            from_number: config.from_number.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        )
    }
}

#[async_trait]
impl SmsSender for TwilioSms {
    async fn send(&self, message: &SmsMessage) -> TaskxResult<()> {
        let params = [
            ("To", message.to.as_str()),
            ("From", self.from_number.as_str()),
            ("Body", message.body.as_str()),
        ];

        let response = self
            .http
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(|e| TaskxError::Upstream(format!("Twilio request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = match serde_json::from_str::<ApiError>(&body) {
                Ok(ApiError {
                    code: Some(code),
                    message,
                }) => format!("{message} (code {code})"),
                Ok(ApiError { message, .. }) => message,
                Err(_) => body,
            };
            return Err(TaskxError::Upstream(format!(
                "Twilio rejected message (status {status}): {reason}"
            )));
        }

        let resource: MessageResource = response
            .json()
            .await
            .map_err(|e| TaskxError::Upstream(format!("Invalid Twilio response: {e}")))?;

        tracing::debug!(
            to = %message.to,
            sid = %resource.sid,
            status = resource.status.as_deref().unwrap_or("unknown"),
            "SMS queued"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sms(server: &MockServer) -> TwilioSms {
        TwilioSms::from_config(&TwilioConfig {
            account_sid: "AC123".into(),
            auth_token: "secret".into(),
            from_number: "+15550000000".into(),
            base_url: server.uri(),
        })
    }

    fn message() -> SmsMessage {
        SmsMessage {
            to: "+15551234567".into(),
            body: "Reminder: Your task \"Dentist\" is due soon".into(),
        }
    }

    #[tokio::test]
    async fn test_send_posts_form_with_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2010-04-01/Accounts/AC123/Messages.json"))
            .and(header_exists("authorization"))
            .and(body_string_contains("To=%2B15551234567"))
            .and(body_string_contains("From=%2B15550000000"))
            .and(body_string_contains("Body=Reminder"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "sid": "SM1",
                "status": "queued"
            })))
            .expect(1)
            .mount(&server)
            .await;

        sms(&server).send(&message()).await.unwrap();
    }

    #[tokio::test]
    async fn test_api_error_message_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "code": 21211,
                "message": "The 'To' number +1555 is not a valid phone number.",
                "status": 400
            })))
            .mount(&server)
            .await;

        let err = sms(&server).send(&message()).await.unwrap_err();
        let TaskxError::Upstream(reason) = err else {
            panic!("expected upstream error, got {err:?}");
        };
        assert!(reason.contains("not a valid phone number"));
        assert!(reason.contains("21211"));
    }
}
