//! View lifetimes for async session work.

use std::sync::{Arc, Weak};

/// Owned by a mounted view. Dropping it cancels every [`ScopeToken`] handed
/// out from it.
#[derive(Debug, Default)]
pub struct ViewScope {
    alive: Arc<()>,
}

impl ViewScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> ScopeToken {
        ScopeToken {
            alive: Some(Arc::downgrade(&self.alive)),
        }
    }
}

/// Cheap handle checked before an async result is applied.
#[derive(Debug, Clone)]
pub struct ScopeToken {
    alive: Option<Weak<()>>,
}

impl ScopeToken {
    /// A token not tied to any view; never cancelled.
    pub fn detached() -> Self {
        Self { alive: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.alive.as_ref().is_some_and(|w| w.strong_count() == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropping_the_scope_cancels_its_tokens() {
        let scope = ViewScope::new();
        let token = scope.token();
        let copy = token.clone();
        assert!(!token.is_cancelled());

        drop(scope);
        assert!(token.is_cancelled());
        assert!(copy.is_cancelled());
    }

    #[test]
    fn detached_tokens_stay_live() {
        assert!(!ScopeToken::detached().is_cancelled());
    }
}
