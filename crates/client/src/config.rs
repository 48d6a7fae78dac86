//! Environment-driven client configuration.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use devora_session::{DEFAULT_CREDENTIAL_KEY, FileCredentialStore, StorageError};

use crate::guard::Redirects;
use crate::router::RouteTable;

pub const DEFAULT_API_URL: &str = "http://localhost:8001/api";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {var}={value:?}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("route table: {0}")]
    RouteTable(String),
    #[error("io error: {0}")]
    Io(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the REST API, without a trailing slash.
    pub api_url: String,
    pub redirects: Redirects,
    pub credential_key: String,
    /// `None`: the platform data directory.
    pub data_dir: Option<PathBuf>,
    pub http_timeout: Duration,
    pub routes_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            redirects: Redirects::default(),
            credential_key: DEFAULT_CREDENTIAL_KEY.to_string(),
            data_dir: None,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            routes_file: None,
        }
    }
}

impl ClientConfig {
    /// Read `DEVORA_*` variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(url) = get("DEVORA_API_URL") {
            config.api_url = url.trim_end_matches('/').to_string();
        }
        if let Some(path) = get("DEVORA_LOGIN_PATH") {
            config.redirects.login = route_path("DEVORA_LOGIN_PATH", path)?;
        }
        if let Some(path) = get("DEVORA_HOME_PATH") {
            config.redirects.home = route_path("DEVORA_HOME_PATH", path)?;
        }
        if let Some(path) = get("DEVORA_BILLING_PATH") {
            config.redirects.billing = route_path("DEVORA_BILLING_PATH", path)?;
        }
        if let Some(key) = get("DEVORA_CREDENTIAL_KEY") {
            config.credential_key = key;
        }
        if let Some(dir) = get("DEVORA_DATA_DIR") {
            config.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(raw) = get("DEVORA_HTTP_TIMEOUT_SECS") {
            let secs = match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: "DEVORA_HTTP_TIMEOUT_SECS",
                        value: raw,
                        reason: "expected a positive number of seconds".to_string(),
                    });
                }
            };
            config.http_timeout = Duration::from_secs(secs);
        }
        if let Some(file) = get("DEVORA_ROUTES") {
            config.routes_file = Some(PathBuf::from(file));
        }

        Ok(config)
    }

    /// The configured route table (or the default one), checked against the
    /// fallback locations.
    pub fn route_table(&self) -> Result<RouteTable, ConfigError> {
        let table = match &self.routes_file {
            None => RouteTable::devora_default(),
            Some(file) => {
                let raw = std::fs::read_to_string(file)
                    .map_err(|e| ConfigError::Io(format!("{}: {e}", file.display())))?;
                let value: serde_json::Value = serde_json::from_str(&raw)
                    .map_err(|e| ConfigError::RouteTable(format!("{}: {e}", file.display())))?;
                RouteTable::from_json(&value)?
            }
        };
        table.validate(&self.redirects)?;
        Ok(table)
    }

    pub fn credential_store(&self) -> Result<FileCredentialStore, ConfigError> {
        match &self.data_dir {
            Some(dir) => Ok(FileCredentialStore::in_dir(dir)),
            None => Ok(FileCredentialStore::in_data_dir()?),
        }
    }
}

fn route_path(var: &'static str, value: String) -> Result<String, ConfigError> {
    if value.starts_with('/') {
        Ok(value)
    } else {
        Err(ConfigError::InvalidValue {
            var,
            value,
            reason: "route paths start with '/'".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = ClientConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.api_url, "http://localhost:8001/api");
        assert_eq!(config.route_table().unwrap().len(), 8);
    }

    #[test]
    fn reads_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("DEVORA_API_URL", "https://api.devora.test/api/"),
            ("DEVORA_BILLING_PATH", "/upgrade"),
            ("DEVORA_CREDENTIAL_KEY", "devora_token"),
            ("DEVORA_HTTP_TIMEOUT_SECS", "3"),
            ("DEVORA_DATA_DIR", "/tmp/devora"),
        ]))
        .unwrap();

        assert_eq!(config.api_url, "https://api.devora.test/api");
        assert_eq!(config.redirects.billing, "/upgrade");
        assert_eq!(config.credential_key, "devora_token");
        assert_eq!(config.http_timeout, Duration::from_secs(3));
        assert_eq!(
            config.credential_store().unwrap().path(),
            std::path::Path::new("/tmp/devora/credentials.json")
        );
        // `/upgrade` is not a declared public route.
        assert!(matches!(config.route_table(), Err(ConfigError::RouteTable(_))));
    }

    #[test]
    fn rejects_bad_values() {
        for raw in ["0", "-1", "soon"] {
            let err = ClientConfig::from_lookup(lookup(&[("DEVORA_HTTP_TIMEOUT_SECS", raw)])).unwrap_err();
            assert!(err.to_string().contains("DEVORA_HTTP_TIMEOUT_SECS"));
        }
        assert!(ClientConfig::from_lookup(lookup(&[("DEVORA_LOGIN_PATH", "login")])).is_err());
    }

    #[test]
    fn loads_a_route_file() {
        let dir = std::env::temp_dir().join(format!("devora-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("routes.json");
        std::fs::write(
            &file,
            r#"{"/": "public", "/login": "public", "/billing": "public", "/admin": {"requiresAdmin": true}}"#,
        )
        .unwrap();

        let config = ClientConfig {
            routes_file: Some(file),
            ..ClientConfig::default()
        };
        assert_eq!(config.route_table().unwrap().len(), 4);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
