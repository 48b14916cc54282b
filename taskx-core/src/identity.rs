//! Bearer identity token verification.

use async_trait::async_trait;

use crate::error::TaskxResult;

/// The user behind a verified identity token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub uid: String,
    pub email: Option<String>,
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verify an identity token, failing with `Unauthorized` if it is not valid.
    async fn verify(&self, id_token: &str) -> TaskxResult<VerifiedIdentity>;
}
