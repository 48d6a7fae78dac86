//! Session-source contract.

use async_trait::async_trait;
use thiserror::Error;

use devora_auth::{Credential, Identity};

/// Confirms a credential and returns the identity it belongs to.
///
/// Implementations must be side-effect free on the server: the store calls
/// this on startup and on every entitlement reload.
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    async fn verify(&self, credential: &Credential) -> Result<Identity, VerifyError>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// The source rejected the credential (expired, revoked, unknown).
    #[error("credential rejected")]
    Unauthorized,
    #[error("network error: {0}")]
    Network(String),
    #[error("session source error ({0}): {1}")]
    Api(u16, String),
    #[error("malformed session response: {0}")]
    Malformed(String),
}

impl VerifyError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, VerifyError::Unauthorized)
    }
}
