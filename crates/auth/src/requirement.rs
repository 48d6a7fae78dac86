//! Access constraints declared by a protected view.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What a view needs before it may render.
///
/// Authentication is implied by any use of the gate, so it has no flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RouteRequirement {
    #[serde(default)]
    pub requires_subscription: bool,
    #[serde(default)]
    pub requires_admin: bool,
}

impl RouteRequirement {
    /// Signed-in users only.
    pub const fn authenticated() -> Self {
        Self {
            requires_subscription: false,
            requires_admin: false,
        }
    }

    pub const fn subscription() -> Self {
        Self {
            requires_subscription: true,
            requires_admin: false,
        }
    }

    pub const fn admin() -> Self {
        Self {
            requires_subscription: false,
            requires_admin: true,
        }
    }

    /// Decode a requirement from route metadata.
    ///
    /// Missing flags default to `false`. Anything that is not an object of
    /// known boolean flags is treated as [`RouteRequirement::authenticated`].
    pub fn from_value(value: &Value) -> Self {
        match serde_json::from_value::<RouteRequirement>(value.clone()) {
            Ok(requirement) => requirement,
            Err(err) => {
                tracing::warn!(error = %err, raw = %value, "unrecognized route requirement; requiring sign-in only");
                Self::authenticated()
            }
        }
    }
}
