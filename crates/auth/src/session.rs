//! Session snapshot: who is signed in, with which credential, and whether
//! that answer is final yet.

use serde::Serialize;

use crate::{Credential, Identity, SubscriptionStatus};

/// Progress of the session load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    /// Nothing has been read yet (application start).
    Uninitialized,
    /// A stored credential is being verified against the session source.
    Loading,
    /// Load finished; `identity` is authoritative (present or absent).
    Ready,
    /// Load failed; decided as "no identity".
    Failed,
}

impl LoadState {
    /// Whether access decisions taken in this state may be acted upon.
    pub fn is_settled(&self) -> bool {
        matches!(self, LoadState::Ready | LoadState::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SignedIn {
    identity: Identity,
    credential: Credential,
}

/// Consistent copy of the authentication state.
///
/// The identity and the credential live together, so one can never be
/// present without the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    load_state: LoadState,
    signed_in: Option<SignedIn>,
}

impl Session {
    pub fn uninitialized() -> Self {
        Self {
            load_state: LoadState::Uninitialized,
            signed_in: None,
        }
    }

    pub fn loading() -> Self {
        Self {
            load_state: LoadState::Loading,
            signed_in: None,
        }
    }

    /// Settled, nobody signed in.
    pub fn signed_out() -> Self {
        Self {
            load_state: LoadState::Ready,
            signed_in: None,
        }
    }

    pub fn failed() -> Self {
        Self {
            load_state: LoadState::Failed,
            signed_in: None,
        }
    }

    pub fn authenticated(identity: Identity, credential: Credential) -> Self {
        Self {
            load_state: LoadState::Ready,
            signed_in: Some(SignedIn { identity, credential }),
        }
    }

    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    /// The identity, if the session is settled and signed in.
    pub fn identity(&self) -> Option<&Identity> {
        self.signed_in.as_ref().map(|s| &s.identity)
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.signed_in.as_ref().map(|s| &s.credential)
    }

    pub fn is_authenticated(&self) -> bool {
        self.signed_in.is_some()
    }

    /// Update the subscription status of the current identity.
    ///
    /// Returns `true` if the value changed; a signed-out session is left
    /// untouched.
    pub fn set_subscription_status(&mut self, status: SubscriptionStatus) -> bool {
        match self.signed_in.as_mut() {
            Some(s) if s.identity.subscription_status != status => {
                s.identity.subscription_status = status;
                true
            }
            _ => false,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::uninitialized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devora_core::UserId;

    fn identity() -> Identity {
        Identity::new(UserId::new(), "kai@example.com")
    }

    #[test]
    fn credential_present_iff_identity_present() {
        let sessions = [
            Session::uninitialized(),
            Session::loading(),
            Session::signed_out(),
            Session::failed(),
            Session::authenticated(identity(), Credential::new("t")),
        ];
        for session in sessions {
            assert_eq!(session.identity().is_some(), session.credential().is_some());
        }
    }

    #[test]
    fn entitlement_update_requires_identity() {
        let mut signed_out = Session::signed_out();
        assert!(!signed_out.set_subscription_status(SubscriptionStatus::Active));
        assert!(signed_out.identity().is_none());

        let mut session = Session::authenticated(identity(), Credential::new("t"));
        assert!(session.set_subscription_status(SubscriptionStatus::Active));
        assert!(!session.set_subscription_status(SubscriptionStatus::Active));
        assert_eq!(
            session.identity().map(|i| i.subscription_status),
            Some(SubscriptionStatus::Active)
        );
    }

    #[test]
    fn only_ready_and_failed_are_settled() {
        assert!(!LoadState::Uninitialized.is_settled());
        assert!(!LoadState::Loading.is_settled());
        assert!(LoadState::Ready.is_settled());
        assert!(LoadState::Failed.is_settled());
    }
}
