//! Bearer identity tokens checked against Google Identity Toolkit.

use async_trait::async_trait;
use serde::Deserialize;
use taskx_core::identity::{IdentityVerifier, VerifiedIdentity};
use taskx_core::{TaskxError, TaskxResult};

const DEFAULT_BASE_URL: &str = "https://identitytoolkit.googleapis.com";

/// Verifies identity tokens with the `accounts:lookup` endpoint.
pub struct IdentityToolkit {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
}

impl IdentityToolkit {
    pub fn new(api_key: impl Into<String>) -> Self {
        IdentityToolkit {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl IdentityVerifier for IdentityToolkit {
    async fn verify(&self, id_token: &str) -> TaskxResult<VerifiedIdentity> {
        if id_token.trim().is_empty() {
            return Err(TaskxError::Unauthorized("Missing identity token".into()));
        }

        let response = self
            .http
            .post(format!("{}/v1/accounts:lookup", self.base_url))
            .query(&[("key", &self.api_key)])
            .json(&serde_json::json!({ "idToken": id_token }))
            .send()
            .await
            .map_err(|e| TaskxError::Upstream(format!("Identity lookup failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(%status, body = %body, "Identity token rejected");
            return Err(TaskxError::Unauthorized("Invalid identity token".into()));
        }

        let lookup: LookupResponse = response
            .json()
            .await
            .map_err(|e| TaskxError::Upstream(format!("Invalid identity lookup response: {e}")))?;

        let user = lookup
            .users
            .into_iter()
            .next()
            .ok_or_else(|| TaskxError::Unauthorized("Invalid identity token".into()))?;

        Ok(VerifiedIdentity {
            uid: user.local_id,
            email: user.email,
        })
    }
}
