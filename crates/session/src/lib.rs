//! `devora-session`
//!
//! **Responsibility:** the single source of truth for "who is the current user
//! and what are they entitled to".
//!
//! This crate provides:
//! - `SessionStore`: lifecycle (initialize, login, logout, expiry, entitlement)
//! - `CredentialStore`: persisted credential seam (memory, JSON file)
//! - `SessionVerifier`: session-source seam (implemented over HTTP by the client)
//! - `ViewScope`: cancellation of async results when a view is torn down
//!
//! The store never returns errors; failures degrade to "signed out".

pub mod scope;
pub mod storage;
pub mod store;
pub mod verifier;

pub use scope::{ScopeToken, ViewScope};
pub use storage::{CredentialStore, FileCredentialStore, InMemoryCredentialStore, StorageError};
pub use store::{DEFAULT_CREDENTIAL_KEY, SessionStore};
pub use verifier::{SessionVerifier, VerifyError};
