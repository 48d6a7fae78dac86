//! Access decision for a protected view.
//!
//! - No IO
//! - No panics
//! - Same inputs, same outcome

use serde::Serialize;

use devora_core::UserId;

use crate::{LoadState, RouteRequirement, Session, SubscriptionStatus};

/// The five mutually exclusive gate outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessOutcome {
    /// Session still loading; render a placeholder and wait.
    Defer,
    /// Render the requested view.
    Allow,
    /// Nobody signed in; send to login.
    DenyUnauthenticated,
    /// Admin-only view; send home.
    DenyForbidden,
    /// Subscription required; send to billing.
    DenyUnentitled,
}

impl AccessOutcome {
    pub fn is_denied(&self) -> bool {
        matches!(
            self,
            AccessOutcome::DenyUnauthenticated
                | AccessOutcome::DenyForbidden
                | AccessOutcome::DenyUnentitled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessOutcome::Defer => "DEFER",
            AccessOutcome::Allow => "ALLOW",
            AccessOutcome::DenyUnauthenticated => "DENY_UNAUTHENTICATED",
            AccessOutcome::DenyForbidden => "DENY_FORBIDDEN",
            AccessOutcome::DenyUnentitled => "DENY_UNENTITLED",
        }
    }
}

impl core::fmt::Display for AccessOutcome {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decide whether `session` may render a view declaring `requirement`.
///
/// Checks run in a fixed order: load state, sign-in, admin, subscription.
/// The order is the precedence between denials.
pub fn decide(session: &Session, requirement: &RouteRequirement) -> AccessOutcome {
    if !session.load_state().is_settled() {
        return AccessOutcome::Defer;
    }

    let Some(identity) = session.identity() else {
        return AccessOutcome::DenyUnauthenticated;
    };

    if requirement.requires_admin && !identity.is_admin {
        return AccessOutcome::DenyForbidden;
    }

    if requirement.requires_subscription && !identity.is_entitled() {
        return AccessOutcome::DenyUnentitled;
    }

    AccessOutcome::Allow
}

// ─────────────────────────────────────────────────────────────────────────────
// Decision explanation (audit trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Why a navigation was allowed, denied or deferred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessExplanation {
    pub outcome: AccessOutcome,
    pub requirement: RouteRequirement,
    pub load_state: LoadState,
    /// Principal attributes the decision looked at. The credential is
    /// deliberately absent.
    pub principal: Option<PrincipalState>,
    pub reason: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrincipalState {
    pub user_id: UserId,
    pub is_admin: bool,
    pub subscription_status: SubscriptionStatus,
    pub entitled: bool,
}

/// Explain the decision [`decide`] takes for the same inputs.
pub fn explain(session: &Session, requirement: &RouteRequirement) -> AccessExplanation {
    let outcome = decide(session, requirement);
    let principal = session.identity().map(|identity| PrincipalState {
        user_id: identity.id.clone(),
        is_admin: identity.is_admin,
        subscription_status: identity.subscription_status,
        entitled: identity.is_entitled(),
    });

    let (reason, suggestions) = match outcome {
        AccessOutcome::Defer => (
            format!("session is {:?}; decision postponed until it settles", session.load_state()),
            Vec::new(),
        ),
        AccessOutcome::DenyUnauthenticated => (
            "no signed-in identity".to_string(),
            vec!["Sign in; the requested path is kept so login can return to it".to_string()],
        ),
        AccessOutcome::DenyForbidden => (
            "view is restricted to administrators".to_string(),
            vec!["Administrator privilege is granted server-side only".to_string()],
        ),
        AccessOutcome::DenyUnentitled => (
            format!(
                "view requires an active or trialing subscription (current: {})",
                principal
                    .as_ref()
                    .map(|p| p.subscription_status)
                    .unwrap_or_default()
            ),
            vec![
                "Start a subscription from the billing page".to_string(),
                "If billing was just updated, reload the entitlement".to_string(),
            ],
        ),
        AccessOutcome::Allow => {
            let reason = match (requirement.requires_admin, requirement.requires_subscription) {
                (true, true) => "administrator with an active entitlement",
                (true, false) => "administrator",
                (false, true) => "signed in with an active entitlement",
                (false, false) => "signed in",
            };
            (reason.to_string(), Vec::new())
        }
    };

    AccessExplanation {
        outcome,
        requirement: *requirement,
        load_state: session.load_state(),
        principal,
        reason,
        suggestions,
    }
}
