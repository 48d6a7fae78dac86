//! Routing seam and the route table.
//!
//! The router itself is an external collaborator; the gate only needs to read
//! the requested path and ask for a redirect. `RouteTable` maps path patterns
//! to what a navigation there requires.

use std::sync::Mutex;

use serde_json::Value;

use devora_auth::RouteRequirement;
use devora_core::{DomainError, DomainResult};

use crate::config::ConfigError;
use crate::guard::Redirects;

/// What the gate needs from the router.
pub trait Navigator: Send + Sync {
    /// Path (and query) currently requested.
    fn current_path(&self) -> String;

    /// Record a user navigation to `target` as a new history entry.
    fn navigate(&self, target: &str);

    /// Replace the current location with `target`.
    fn redirect(&self, target: &str);
}

/// In-memory history, used by tests and the CLI.
#[derive(Debug, Default)]
pub struct MemoryNavigator {
    state: Mutex<History>,
}

#[derive(Debug, Default)]
struct History {
    entries: Vec<String>,
    redirects: Vec<String>,
}

impl MemoryNavigator {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(History {
                entries: vec![initial.into()],
                redirects: Vec::new(),
            }),
        }
    }

    pub fn history(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.entries.clone())
            .unwrap_or_default()
    }

    /// Every redirect target requested so far, oldest first.
    pub fn redirects(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.redirects.clone())
            .unwrap_or_default()
    }
}

impl Navigator for MemoryNavigator {
    fn current_path(&self) -> String {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.entries.last().cloned())
            .unwrap_or_else(|| "/".to_string())
    }

    fn navigate(&self, target: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.entries.push(target.to_string());
        }
    }

    fn redirect(&self, target: &str) {
        if let Ok(mut state) = self.state.lock() {
            // Redirects replace the entry so "back" does not bounce into the gate again.
            state.entries.pop();
            state.entries.push(target.to_string());
            state.redirects.push(target.to_string());
        }
    }
}

/// Path part of a location: query and fragment stripped, trailing slash removed.
pub fn path_of(location: &str) -> &str {
    let end = location.find(['?', '#']).unwrap_or(location.len());
    let path = &location[..end];
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Route table
// ─────────────────────────────────────────────────────────────────────────────

/// Access declared for a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Rendered without consulting the gate.
    Public,
    Protected(RouteRequirement),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A path pattern such as `/editor/:projectId`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        if !raw.starts_with('/') {
            return Err(DomainError::validation(format!(
                "route pattern must start with '/': {raw}"
            )));
        }

        let mut segments = Vec::new();
        for part in path_of(raw).split('/').filter(|s| !s.is_empty()) {
            match part.strip_prefix(':') {
                Some("") => {
                    return Err(DomainError::validation(format!(
                        "route pattern has an unnamed parameter: {raw}"
                    )));
                }
                Some(name) => segments.push(Segment::Param(name.to_string())),
                None => segments.push(Segment::Literal(part.to_string())),
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the pattern has no parameters.
    pub fn is_static(&self) -> bool {
        self.segments.iter().all(|s| matches!(s, Segment::Literal(_)))
    }

    fn matches(&self, path: &str) -> bool {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        parts.len() == self.segments.len()
            && self.segments.iter().zip(parts).all(|(segment, part)| match segment {
                Segment::Literal(lit) => lit == part,
                Segment::Param(_) => true,
            })
    }

    fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }
}

/// Path pattern → access. The most specific match wins (most literal segments).
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<(RoutePattern, Access)>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The Devora application's routes.
    pub fn devora_default() -> Self {
        let declared = [
            ("/", Access::Public),
            ("/login", Access::Public),
            ("/billing", Access::Public),
            ("/settings", Access::Protected(RouteRequirement::authenticated())),
            ("/dashboard", Access::Protected(RouteRequirement::subscription())),
            ("/editor", Access::Protected(RouteRequirement::subscription())),
            ("/editor/:projectId", Access::Protected(RouteRequirement::subscription())),
            ("/admin", Access::Protected(RouteRequirement::admin())),
        ];

        let mut table = Self::new();
        for (pattern, access) in declared {
            if let Ok(pattern) = RoutePattern::parse(pattern) {
                table.routes.push((pattern, access));
            }
        }
        table
    }

    /// Add or replace the route for `pattern`.
    pub fn insert(&mut self, pattern: &str, access: Access) -> DomainResult<()> {
        let pattern = RoutePattern::parse(pattern)?;
        match self.routes.iter_mut().find(|(p, _)| p.segments == pattern.segments) {
            Some(existing) => *existing = (pattern, access),
            None => self.routes.push((pattern, access)),
        }
        Ok(())
    }

    /// Load from JSON: `{"<pattern>": "public" | {<requirement>}}`.
    ///
    /// Requirement objects are read leniently (see [`RouteRequirement::from_value`]).
    pub fn from_json(value: &Value) -> Result<Self, ConfigError> {
        let Value::Object(entries) = value else {
            return Err(ConfigError::RouteTable(
                "route table must be a JSON object".to_string(),
            ));
        };

        let mut table = Self::new();
        for (pattern, declared) in entries {
            let access = match declared {
                Value::String(s) if s.eq_ignore_ascii_case("public") => Access::Public,
                other => Access::Protected(RouteRequirement::from_value(other)),
            };
            table
                .insert(pattern, access)
                .map_err(|e| ConfigError::RouteTable(e.to_string()))?;
        }
        Ok(table)
    }

    /// Access for a requested location, if any route matches.
    pub fn resolve(&self, location: &str) -> Option<Access> {
        let path = path_of(location);
        self.routes
            .iter()
            .filter(|(pattern, _)| pattern.matches(path))
            .max_by_key(|(pattern, _)| pattern.literal_count())
            .map(|(_, access)| *access)
    }

    pub fn patterns(&self) -> impl Iterator<Item = &RoutePattern> {
        self.routes.iter().map(|(pattern, _)| pattern)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Every fallback target must be a public route, otherwise a denial could
    /// redirect into another denial.
    pub fn validate(&self, redirects: &Redirects) -> Result<(), ConfigError> {
        for target in [&redirects.login, &redirects.home, &redirects.billing] {
            match self.resolve(target) {
                Some(Access::Public) => {}
                Some(Access::Protected(_)) => {
                    return Err(ConfigError::RouteTable(format!(
                        "fallback route {target} must be public"
                    )));
                }
                None => {
                    return Err(ConfigError::RouteTable(format!(
                        "fallback route {target} is not declared"
                    )));
                }
            }
        }
        Ok(())
    }
}
