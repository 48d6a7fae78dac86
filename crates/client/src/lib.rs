//! `devora-client`
//!
//! **Responsibility:** the navigation side of the access gate.
//!
//! This crate provides:
//! - `Navigator` / `RouteTable`: the router seam and declared route access
//! - `Guard`: decision → placeholder, view or redirect
//! - `Dispatcher`: re-evaluation on session and route changes
//! - HTTP collaborators (feature `http`): session verification, login, admin API
//! - `ClientConfig`: environment configuration

pub mod config;
pub mod dispatcher;
pub mod guard;
pub mod router;

#[cfg(feature = "http")]
pub mod api;

pub use config::{ClientConfig, ConfigError};
pub use dispatcher::Dispatcher;
pub use guard::{Guard, Redirects, Rendered};
pub use router::{Access, MemoryNavigator, Navigator, RoutePattern, RouteTable};

#[cfg(feature = "http")]
pub use api::{AdminStats, ApiClient, ApiError, HttpSessionVerifier, SystemConfig, SystemConfigUpdate};
