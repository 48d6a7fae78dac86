//! The signed-in principal and its entitlement attributes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use devora_core::UserId;

/// Billing state of a user's subscription.
///
/// Wire names follow the backend (`past_due`, `inactive`). Unknown strings
/// decode as [`SubscriptionStatus::None`] so that an unexpected value never
/// grants an entitlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum SubscriptionStatus {
    /// No subscription on file.
    #[default]
    None,
    Trialing,
    Active,
    PastDue,
    Canceled,
}

impl From<String> for SubscriptionStatus {
    fn from(value: String) -> Self {
        Self::from_wire(&value)
    }
}

impl SubscriptionStatus {
    pub const ALL: [SubscriptionStatus; 5] = [
        SubscriptionStatus::None,
        SubscriptionStatus::Trialing,
        SubscriptionStatus::Active,
        SubscriptionStatus::PastDue,
        SubscriptionStatus::Canceled,
    ];

    /// Entitlement: a trial counts as subscribed.
    pub fn is_entitled(&self) -> bool {
        matches!(self, SubscriptionStatus::Trialing | SubscriptionStatus::Active)
    }

    /// Lenient decoding of the backend's status string.
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "trialing" => SubscriptionStatus::Trialing,
            "active" => SubscriptionStatus::Active,
            "past_due" | "pastDue" => SubscriptionStatus::PastDue,
            "canceled" | "cancelled" => SubscriptionStatus::Canceled,
            _ => SubscriptionStatus::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::None => "none",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
        }
    }
}

impl core::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authenticated principal as returned by the session source (`/auth/me`).
///
/// `is_admin` and `subscription_status` are independent: an admin is not
/// implicitly subscribed, and a subscriber is never implicitly an admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub subscription_status: SubscriptionStatus,
    #[serde(default)]
    pub current_period_end: Option<DateTime<Utc>>,
}

impl Identity {
    pub fn new(id: UserId, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            full_name: None,
            is_admin: false,
            subscription_status: SubscriptionStatus::None,
            current_period_end: None,
        }
    }

    pub fn with_admin(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin;
        self
    }

    pub fn with_subscription(mut self, status: SubscriptionStatus) -> Self {
        self.subscription_status = status;
        self
    }

    pub fn is_entitled(&self) -> bool {
        self.subscription_status.is_entitled()
    }
}
