//! Navigation side of the gate: turns a decision into a render or a redirect.

use tracing::{debug, error};

use devora_auth::{AccessOutcome, RouteRequirement, explain};
use devora_session::SessionStore;

use crate::router::{Navigator, path_of};

/// Fallback locations for denied navigations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirects {
    pub login: String,
    pub home: String,
    pub billing: String,
}

impl Default for Redirects {
    fn default() -> Self {
        Self {
            login: "/login".to_string(),
            home: "/".to_string(),
            billing: "/billing".to_string(),
        }
    }
}

impl Redirects {
    /// Where `outcome` sends a navigation to `requested`; `None` when it does
    /// not redirect.
    ///
    /// The login target carries the requested location as `next`, percent-encoded.
    pub fn target(&self, outcome: AccessOutcome, requested: &str) -> Option<String> {
        match outcome {
            AccessOutcome::DenyUnauthenticated => Some(format!(
                "{}?next={}",
                self.login,
                urlencoding::encode(requested)
            )),
            AccessOutcome::DenyForbidden => Some(self.home.clone()),
            AccessOutcome::DenyUnentitled => Some(self.billing.clone()),
            AccessOutcome::Defer | AccessOutcome::Allow => None,
        }
    }
}

/// Result of running a navigation through the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered<V> {
    /// Neutral content while the session settles (or when a redirect was refused).
    Placeholder,
    View(V),
    /// A redirect to this location was requested.
    Redirected(String),
    /// No route matches the location.
    NotFound,
}

impl<V> Rendered<V> {
    pub fn view(&self) -> Option<&V> {
        match self {
            Rendered::View(view) => Some(view),
            _ => None,
        }
    }
}

/// Side-effect wrapper around [`devora_auth::decide`].
///
/// Reads one session snapshot per render and never caches a decision.
#[derive(Debug)]
pub struct Guard<N> {
    store: SessionStore,
    navigator: N,
    redirects: Redirects,
}

impl<N: Navigator> Guard<N> {
    pub fn new(store: SessionStore, navigator: N, redirects: Redirects) -> Self {
        Self {
            store,
            navigator,
            redirects,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    pub fn redirects(&self) -> &Redirects {
        &self.redirects
    }

    /// Gate the current location. `build` runs only on `ALLOW`.
    pub fn render<V>(&self, requirement: &RouteRequirement, build: impl FnOnce() -> V) -> Rendered<V> {
        let requested = self.navigator.current_path();
        self.render_at(&requested, requirement, build)
    }

    /// Wait until the session has settled, then gate the current location.
    ///
    /// Coalesces with any other `initialize` in flight.
    pub async fn resolve<V>(
        &self,
        requirement: &RouteRequirement,
        build: impl FnOnce() -> V,
    ) -> Rendered<V> {
        self.store.initialize().await;
        self.render(requirement, build)
    }

    pub(crate) fn render_at<V>(
        &self,
        requested: &str,
        requirement: &RouteRequirement,
        build: impl FnOnce() -> V,
    ) -> Rendered<V> {
        let session = self.store.snapshot();
        let explanation = explain(&session, requirement);
        debug!(
            path = requested,
            outcome = %explanation.outcome,
            reason = %explanation.reason,
            "gate decision"
        );

        match explanation.outcome {
            AccessOutcome::Allow => Rendered::View(build()),
            AccessOutcome::Defer => Rendered::Placeholder,
            denied => match self.redirects.target(denied, requested) {
                Some(target) if path_of(&target) == path_of(requested) => {
                    error!(
                        path = requested,
                        outcome = %denied,
                        "redirect loop: fallback route is gated by the same denial"
                    );
                    Rendered::Placeholder
                }
                Some(target) => {
                    self.navigator.redirect(&target);
                    Rendered::Redirected(target)
                }
                None => Rendered::Placeholder,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use devora_auth::{Credential, Identity, SubscriptionStatus};
    use devora_core::UserId;
    use devora_session::{InMemoryCredentialStore, SessionVerifier, VerifyError};

    use super::*;
    use crate::router::MemoryNavigator;

    struct FixedVerifier(Result<Identity, VerifyError>);

    #[async_trait]
    impl SessionVerifier for FixedVerifier {
        async fn verify(&self, _credential: &Credential) -> Result<Identity, VerifyError> {
            self.0.clone()
        }
    }

    fn member(is_admin: bool, status: SubscriptionStatus) -> Identity {
        Identity::new(UserId::new(), "member@example.com")
            .with_admin(is_admin)
            .with_subscription(status)
    }

    fn guard_at(path: &str, verified: Result<Identity, VerifyError>) -> Guard<MemoryNavigator> {
        let storage = InMemoryCredentialStore::with_entry("token", Credential::new("persisted"));
        let store = SessionStore::new(Arc::new(FixedVerifier(verified)), Arc::new(storage));
        Guard::new(store, MemoryNavigator::new(path), Redirects::default())
    }

    #[test]
    fn login_target_preserves_the_requested_location() {
        let target = Redirects::default().target(AccessOutcome::DenyUnauthenticated, "/editor/7?tab=a b");
        assert_eq!(target.as_deref(), Some("/login?next=%2Feditor%2F7%3Ftab%3Da%20b"));
        assert_eq!(Redirects::default().target(AccessOutcome::Allow, "/"), None);
    }

    #[test]
    fn defers_without_building_until_settled() {
        let guard = guard_at("/dashboard", Err(VerifyError::Unauthorized));
        let built = AtomicUsize::new(0);

        let rendered = guard.render(&RouteRequirement::subscription(), || {
            built.fetch_add(1, Ordering::SeqCst)
        });

        assert_eq!(rendered, Rendered::Placeholder);
        assert_eq!(built.load(Ordering::SeqCst), 0);
        assert!(guard.navigator().redirects().is_empty());
    }

    #[tokio::test]
    async fn signed_out_visitor_is_sent_to_login() {
        let guard = guard_at("/dashboard", Err(VerifyError::Unauthorized));

        let rendered = guard.resolve(&RouteRequirement::subscription(), || "dashboard").await;

        assert_eq!(rendered, Rendered::Redirected("/login?next=%2Fdashboard".to_string()));
        assert_eq!(guard.navigator().current_path(), "/login?next=%2Fdashboard");
    }

    #[tokio::test]
    async fn non_admin_is_sent_home_without_building_the_view() {
        let guard = guard_at("/admin", Ok(member(false, SubscriptionStatus::Active)));
        let built = AtomicUsize::new(0);

        let rendered = guard
            .resolve(&RouteRequirement::admin(), || built.fetch_add(1, Ordering::SeqCst))
            .await;

        assert_eq!(rendered, Rendered::Redirected("/".to_string()));
        assert_eq!(built.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn trialing_member_reaches_the_dashboard() {
        let guard = guard_at("/dashboard", Ok(member(false, SubscriptionStatus::Trialing)));

        let rendered = guard.resolve(&RouteRequirement::subscription(), || "dashboard").await;

        assert_eq!(rendered, Rendered::View("dashboard"));
        assert!(guard.navigator().redirects().is_empty());
    }

    #[tokio::test]
    async fn lapsed_member_is_sent_to_billing() {
        let guard = guard_at("/editor/3", Ok(member(true, SubscriptionStatus::PastDue)));

        let rendered = guard.resolve(&RouteRequirement::subscription(), || "editor").await;

        assert_eq!(rendered, Rendered::Redirected("/billing".to_string()));
    }

    #[tokio::test]
    async fn redirect_back_to_the_requested_path_is_refused() {
        let guard = guard_at("/billing", Ok(member(false, SubscriptionStatus::None)));

        let rendered = guard.resolve(&RouteRequirement::subscription(), || "billing").await;

        assert_eq!(rendered, Rendered::Placeholder);
        assert!(guard.navigator().redirects().is_empty());
    }

    #[tokio::test]
    async fn every_render_reads_the_latest_session() {
        let guard = guard_at("/settings", Err(VerifyError::Unauthorized));
        guard.store().initialize().await;

        let first = guard.render(&RouteRequirement::authenticated(), || "settings");
        assert!(matches!(first, Rendered::Redirected(_)));

        guard
            .store()
            .login(Credential::new("fresh"), member(false, SubscriptionStatus::None));
        guard.navigator().navigate("/settings");

        let second = guard.render(&RouteRequirement::authenticated(), || "settings");
        assert_eq!(second, Rendered::View("settings"));
    }
}
