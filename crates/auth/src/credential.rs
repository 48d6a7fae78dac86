//! Opaque bearer credential.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bearer token used to authorize API calls.
///
/// The value is opaque to the client: it is never decoded, only forwarded.
/// `Debug` is redacted so the token cannot leak through logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token, for the `Authorization` header and persistence only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl core::fmt::Debug for Credential {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Token envelope returned by the login endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedToken {
    pub access_token: Credential,
    pub token_type: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("unsupported token type '{0}' (expected bearer)")]
    UnsupportedTokenType(String),

    #[error("token is empty")]
    Empty,
}

impl IssuedToken {
    /// Accept the envelope only if it carries a non-empty bearer token.
    pub fn into_credential(self) -> Result<Credential, CredentialError> {
        if !self.token_type.eq_ignore_ascii_case("bearer") {
            return Err(CredentialError::UnsupportedTokenType(self.token_type));
        }
        if self.access_token.is_blank() {
            return Err(CredentialError::Empty);
        }
        Ok(self.access_token)
    }
}
