//! HTTP collaborators: session verification, login, and the admin API.
//!
//! Every privileged request carries the session credential as a bearer
//! token. A `401` expires the session; a `402`/`403` means the local
//! entitlement is stale and triggers a reload. Either answer is ignored when
//! the session moved to another credential while the request was in flight.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use devora_auth::{Credential, CredentialError, Identity, IssuedToken, Session};
use devora_session::{ScopeToken, SessionStore, SessionVerifier, VerifyError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("no signed-in session; request not sent")]
    NotAuthenticated,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("session expired")]
    SessionExpired,
    /// The request was refused for a credential that is no longer current.
    #[error("session changed while the request was in flight")]
    SessionChanged,
    #[error("access refused ({0}); entitlement reloaded")]
    Forbidden(u16),
    #[error("network error: {0}")]
    Network(String),
    #[error("api error ({0}): {1}")]
    Api(u16, String),
    #[error("unexpected response body: {0}")]
    Parse(String),
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error("issued token could not be verified: {0}")]
    Verify(#[from] VerifyError),
}

/// Shared HTTP client with the configured request timeout.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, ApiError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ApiError::Network(e.to_string()))
}

fn join(api_url: &str, path: &str) -> String {
    format!("{}{}", api_url.trim_end_matches('/'), path)
}

// ─────────────────────────────────────────────────────────────────────────────
// Session verification
// ─────────────────────────────────────────────────────────────────────────────

/// `GET {api}/auth/me`.
#[derive(Debug, Clone)]
pub struct HttpSessionVerifier {
    http: reqwest::Client,
    api_url: String,
}

impl HttpSessionVerifier {
    pub fn new(http: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            http,
            api_url: api_url.into(),
        }
    }
}

#[async_trait]
impl SessionVerifier for HttpSessionVerifier {
    async fn verify(&self, credential: &Credential) -> Result<Identity, VerifyError> {
        let res = self
            .http
            .get(join(&self.api_url, "/auth/me"))
            .bearer_auth(credential.expose())
            .send()
            .await
            .map_err(|e| VerifyError::Network(e.to_string()))?;

        match res.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(VerifyError::Unauthorized),
            status if status.is_success() => res
                .json::<Identity>()
                .await
                .map_err(|e| VerifyError::Malformed(e.to_string())),
            status => {
                let body = res.text().await.unwrap_or_default();
                Err(VerifyError::Api(status.as_u16(), body))
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Admin models
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminStats {
    pub total_users: u64,
    pub active_subscriptions: u64,
    pub total_revenue: f64,
    pub total_projects: u64,
    pub new_users_this_month: u64,
    /// Percent.
    pub churn_rate: f64,
}

/// Runtime configuration of the backend (payments, email, pricing).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub stripe_api_key: Option<String>,
    #[serde(default)]
    pub stripe_webhook_secret: Option<String>,
    #[serde(default)]
    pub stripe_test_mode: bool,
    #[serde(default)]
    pub resend_api_key: Option<String>,
    #[serde(default)]
    pub resend_from_email: Option<String>,
    pub subscription_price: f64,
    pub free_trial_days: u32,
    pub max_failed_payments: u32,
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemConfigUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stripe_api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stripe_webhook_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stripe_test_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resend_api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resend_from_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_trial_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_failed_payments: Option<u32>,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// API client bound to a session store.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    api_url: String,
    store: SessionStore,
}

impl ApiClient {
    pub fn new(http: reqwest::Client, api_url: impl Into<String>, store: SessionStore) -> Self {
        Self {
            http,
            api_url: api_url.into(),
            store,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Exchange email/password for a credential, verify it, and sign in.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ApiError> {
        let res = self
            .http
            .post(join(&self.api_url, "/auth/login"))
            .json(&LoginRequest { email, password })
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = res.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::InvalidCredentials);
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(ApiError::Api(status.as_u16(), body));
        }

        let issued: IssuedToken = res.json().await.map_err(|e| ApiError::Parse(e.to_string()))?;
        let credential = issued.into_credential()?;

        let verifier = HttpSessionVerifier::new(self.http.clone(), self.api_url.clone());
        let identity = verifier.verify(&credential).await?;
        self.store.login(credential, identity);
        Ok(self.store.snapshot())
    }

    pub async fn admin_stats(&self) -> Result<AdminStats, ApiError> {
        self.send(self.http.get(join(&self.api_url, "/admin/stats")))
            .await
    }

    pub async fn admin_config(&self) -> Result<SystemConfig, ApiError> {
        self.send(self.http.get(join(&self.api_url, "/admin/config")))
            .await
    }

    pub async fn update_admin_config(
        &self,
        update: &SystemConfigUpdate,
    ) -> Result<SystemConfig, ApiError> {
        self.send(self.http.put(join(&self.api_url, "/admin/config")).json(update))
            .await
    }

    /// Attach the credential, send, and map session-relevant statuses.
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let credential = self
            .store
            .snapshot()
            .credential()
            .cloned()
            .ok_or(ApiError::NotAuthenticated)?;

        let res = request
            .bearer_auth(credential.expose())
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = res.status();
        let session_related = matches!(
            status,
            StatusCode::UNAUTHORIZED | StatusCode::PAYMENT_REQUIRED | StatusCode::FORBIDDEN
        );
        if session_related && self.store.snapshot().credential() != Some(&credential) {
            debug!(status = status.as_u16(), "answer for a replaced credential; session left alone");
            return Err(ApiError::SessionChanged);
        }

        match status {
            StatusCode::UNAUTHORIZED => {
                self.store.expire_if(&credential);
                Err(ApiError::SessionExpired)
            }
            status @ (StatusCode::PAYMENT_REQUIRED | StatusCode::FORBIDDEN) => {
                warn!(status = status.as_u16(), signal = "stale_entitlement", "privileged request refused");
                self.store.reload_entitlement(&ScopeToken::detached()).await;
                Err(ApiError::Forbidden(status.as_u16()))
            }
            status if status.is_success() => {
                res.json().await.map_err(|e| ApiError::Parse(e.to_string()))
            }
            status => {
                let body = res.text().await.unwrap_or_default();
                Err(ApiError::Api(status.as_u16(), body))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_omits_unset_fields() {
        let update = SystemConfigUpdate {
            free_trial_days: Some(14),
            stripe_test_mode: Some(false),
            ..SystemConfigUpdate::default()
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({"free_trial_days": 14, "stripe_test_mode": false}));
    }

    #[test]
    fn config_reads_nulls_as_unset() {
        let config: SystemConfig = serde_json::from_value(serde_json::json!({
            "stripe_api_key": null,
            "stripe_test_mode": true,
            "resend_from_email": "noreply@devora.test",
            "subscription_price": 9.9,
            "free_trial_days": 7,
            "max_failed_payments": 3
        }))
        .unwrap();
        assert_eq!(config.stripe_api_key, None);
        assert!(config.stripe_test_mode);
        assert_eq!(config.free_trial_days, 7);
    }

    #[test]
    fn endpoints_join_without_double_slashes() {
        assert_eq!(join("http://h/api/", "/auth/me"), "http://h/api/auth/me");
        assert_eq!(join("http://h/api", "/admin/stats"), "http://h/api/admin/stats");
    }
}
