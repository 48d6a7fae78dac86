//! Process-wide session state with an explicit, injectable owner.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, OnceCell, watch};

use devora_auth::{Credential, Identity, Session, SubscriptionStatus};

use crate::scope::ScopeToken;
use crate::storage::CredentialStore;
use crate::verifier::{SessionVerifier, VerifyError};

/// Storage key of the persisted bearer credential.
pub const DEFAULT_CREDENTIAL_KEY: &str = "token";

/// Owner of the current [`Session`].
///
/// Cloning is cheap and every clone shares the same state. The session is
/// published as a whole value through a watch channel, so readers always see
/// a consistent snapshot and can subscribe to changes.
///
/// # Invariants
/// - `initialize` and `reload_entitlement` never interleave.
/// - Concurrent `initialize` calls share one verification round-trip.
/// - A login/logout supersedes any verification still in flight (epoch check).
/// - No operation returns an error: failures degrade to "signed out".
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

struct Inner {
    state: watch::Sender<Session>,
    verifier: Arc<dyn SessionVerifier>,
    storage: Arc<dyn CredentialStore>,
    credential_key: String,
    serial: Mutex<()>,
    initialized: OnceCell<()>,
    /// Bumped on every identity change (login, logout, expiry).
    epoch: AtomicU64,
}

impl core::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionStore")
            .field("session", &*self.inner.state.borrow())
            .field("credential_key", &self.inner.credential_key)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    pub fn new(verifier: Arc<dyn SessionVerifier>, storage: Arc<dyn CredentialStore>) -> Self {
        Self::with_key(verifier, storage, DEFAULT_CREDENTIAL_KEY)
    }

    pub fn with_key(
        verifier: Arc<dyn SessionVerifier>,
        storage: Arc<dyn CredentialStore>,
        credential_key: impl Into<String>,
    ) -> Self {
        let (state, _) = watch::channel(Session::uninitialized());
        Self {
            inner: Arc::new(Inner {
                state,
                verifier,
                storage,
                credential_key: credential_key.into(),
                serial: Mutex::new(()),
                initialized: OnceCell::new(),
                epoch: AtomicU64::new(0),
            }),
        }
    }

    /// Consistent copy of the current session.
    pub fn snapshot(&self) -> Session {
        self.inner.state.borrow().clone()
    }

    /// Receiver woken on every session change.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.state.subscribe()
    }

    /// Restore the persisted session, once.
    ///
    /// Concurrent callers wait for the same load and observe the same result.
    /// After completion further calls return the current snapshot without
    /// touching storage or the session source.
    pub async fn initialize(&self) -> Session {
        self.inner
            .initialized
            .get_or_init(|| self.load_persisted())
            .await;
        self.snapshot()
    }

    /// Install a freshly issued credential and its identity.
    pub fn login(&self, credential: Credential, identity: Identity) {
        tracing::info!(
            user_id = %identity.id,
            is_admin = identity.is_admin,
            subscription = %identity.subscription_status,
            "signed in"
        );
        self.replace(Session::authenticated(identity, credential), Persist::Store);
    }

    pub fn logout(&self) {
        tracing::info!("signed out");
        self.replace(Session::signed_out(), Persist::Forget);
    }

    /// The API rejected the credential; drop the session.
    pub fn expire(&self) {
        if let Some(credential) = self.snapshot().credential() {
            self.expire_if(credential);
        }
    }

    /// Drop the session only if it still holds `rejected`.
    ///
    /// A rejection of a credential that was replaced in the meantime (login,
    /// logout) is ignored. Returns whether the session was cleared.
    pub fn expire_if(&self, rejected: &Credential) -> bool {
        let inner = &self.inner;
        let expired = inner.state.send_if_modified(|current| {
            if current.credential() != Some(rejected) {
                return false;
            }
            inner.epoch.fetch_add(1, Ordering::SeqCst);
            self.persist(Persist::Forget, None);
            *current = Session::signed_out();
            true
        });
        if expired {
            tracing::warn!(signal = "session_expired", "credential rejected; session cleared");
        } else {
            tracing::debug!("rejected credential is no longer current; ignoring");
        }
        expired
    }

    /// Update the subscription status of the signed-in identity.
    ///
    /// No-op when nobody is signed in. Subscribers are only woken when the
    /// status actually changes.
    pub fn refresh_entitlement(&self, status: SubscriptionStatus) {
        let changed = self
            .inner
            .state
            .send_if_modified(|session| session.set_subscription_status(status));
        if changed {
            tracing::info!(subscription = %status, "entitlement refreshed");
        }
    }

    /// Re-read the entitlement from the session source.
    ///
    /// The result is discarded if `scope` was cancelled or the signed-in
    /// identity changed while the request was in flight. A rejected
    /// credential expires the session; other failures keep the last-known
    /// entitlement.
    pub async fn reload_entitlement(&self, scope: &ScopeToken) -> Session {
        let _serial = self.inner.serial.lock().await;

        let before = self.snapshot();
        let (Some(credential), Some(current)) = (before.credential(), before.identity()) else {
            return self.snapshot();
        };
        let epoch = self.epoch();

        let result = self.inner.verifier.verify(credential).await;

        if scope.is_cancelled() {
            tracing::debug!("view scope closed; discarding entitlement reload");
            return self.snapshot();
        }
        if self.epoch() != epoch {
            tracing::debug!("session changed during entitlement reload; discarding result");
            return self.snapshot();
        }

        match result {
            Ok(identity) if identity.id == current.id => {
                self.refresh_entitlement(identity.subscription_status);
            }
            Ok(identity) => {
                tracing::warn!(
                    expected = %current.id,
                    returned = %identity.id,
                    "session source returned a different identity; keeping last-known entitlement"
                );
            }
            Err(VerifyError::Unauthorized) => self.expire(),
            Err(err) => {
                tracing::warn!(error = %err, "entitlement reload failed; keeping last-known entitlement");
            }
        }

        self.snapshot()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────

    async fn load_persisted(&self) {
        let _serial = self.inner.serial.lock().await;

        if self.snapshot().load_state().is_settled() {
            // A login/logout already decided the session.
            return;
        }
        let epoch = self.epoch();

        let stored = match self.inner.storage.get(&self.inner.credential_key) {
            Ok(stored) => stored,
            Err(err) => {
                tracing::warn!(error = %err, "could not read persisted credential; starting signed out");
                None
            }
        };

        let Some(credential) = stored.filter(|c| !c.is_blank()) else {
            tracing::debug!("no persisted credential");
            self.settle(epoch, Session::signed_out());
            return;
        };

        self.settle(epoch, Session::loading());
        let mut pending = PendingLoad {
            store: self,
            epoch,
            armed: true,
        };

        let result = self.inner.verifier.verify(&credential).await;
        pending.armed = false;

        match result {
            Ok(identity) => {
                let user_id = identity.id.clone();
                if self.settle(epoch, Session::authenticated(identity, credential)) {
                    tracing::info!(%user_id, "session restored");
                } else {
                    tracing::debug!("session changed during verification; discarding restored identity");
                }
            }
            Err(err) => {
                tracing::warn!(
                    signal = "session_load_failure",
                    error = %err,
                    "stored credential could not be verified; continuing signed out"
                );
                self.settle_with(epoch, Session::signed_out(), Persist::Forget);
            }
        }
    }

    fn epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::SeqCst)
    }

    /// Publish `next` unless the identity changed since `epoch` was read.
    fn settle(&self, epoch: u64, next: Session) -> bool {
        self.settle_with(epoch, next, Persist::Keep)
    }

    fn settle_with(&self, epoch: u64, next: Session, persist: Persist) -> bool {
        let inner = &self.inner;
        inner.state.send_if_modified(|current| {
            if inner.epoch.load(Ordering::SeqCst) != epoch {
                return false;
            }
            self.persist(persist, next.credential());
            *current = next;
            true
        })
    }

    /// Publish an identity change.
    ///
    /// Storage is updated under the same lock as the session, so the persisted
    /// credential always belongs to the last published identity.
    fn replace(&self, next: Session, persist: Persist) {
        let inner = &self.inner;
        inner.state.send_modify(|current| {
            inner.epoch.fetch_add(1, Ordering::SeqCst);
            self.persist(persist, next.credential());
            *current = next;
        });
    }

    fn persist(&self, persist: Persist, credential: Option<&Credential>) {
        let key = &self.inner.credential_key;
        let result = match (persist, credential) {
            (Persist::Keep, _) => Ok(()),
            (Persist::Store, Some(credential)) => self.inner.storage.set(key, credential),
            (Persist::Store, None) | (Persist::Forget, _) => self.inner.storage.remove(key),
        };
        if let Err(err) = result {
            tracing::warn!(error = %err, "failed to update persisted credential");
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Persist {
    Keep,
    Store,
    Forget,
}

/// Puts the store back to `Uninitialized` if a load is dropped mid-flight,
/// so a later `initialize` starts over instead of leaving `Loading` behind.
struct PendingLoad<'a> {
    store: &'a SessionStore,
    epoch: u64,
    armed: bool,
}

impl Drop for PendingLoad<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.store.settle(self.epoch, Session::uninitialized());
        }
    }
}
