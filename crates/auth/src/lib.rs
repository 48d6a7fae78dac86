//! `devora-auth`: pure client-side access-control boundary.
//!
//! This crate is intentionally decoupled from HTTP, storage and rendering:
//! it holds the session model and the gate decision, nothing that suspends.

pub mod credential;
pub mod gate;
pub mod identity;
pub mod requirement;
pub mod session;

pub use credential::{Credential, CredentialError, IssuedToken};
pub use gate::{AccessExplanation, AccessOutcome, PrincipalState, decide, explain};
pub use identity::{Identity, SubscriptionStatus};
pub use requirement::RouteRequirement;
pub use session::{LoadState, Session};
