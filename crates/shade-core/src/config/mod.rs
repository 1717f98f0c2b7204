//! Runtime configuration for ShadeStash clients.
//!
//! `ShadeConfig` is read from an optional JSON file and then overridden by
//! `SHADE_*` environment variables. None of it is needed by the sync engine
//! itself; clients use it to build a ledger, a store and the signals.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::UserId;
use crate::remote::FirestoreConfig;
use crate::util::{is_http_url, normalize_text_option};

const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

pub const ENV_FIRESTORE_PROJECT: &str = "SHADE_FIRESTORE_PROJECT";
pub const ENV_FIRESTORE_API_KEY: &str = "SHADE_FIRESTORE_API_KEY";
pub const ENV_FIRESTORE_BASE_URL: &str = "SHADE_FIRESTORE_BASE_URL";
pub const ENV_ID_TOKEN: &str = "SHADE_ID_TOKEN";
pub const ENV_USER_ID: &str = "SHADE_USER_ID";
pub const ENV_DB_PATH: &str = "SHADE_DB_PATH";
pub const ENV_POLL_INTERVAL_SECS: &str = "SHADE_POLL_INTERVAL_SECS";
pub const ENV_PROBE_ADDR: &str = "SHADE_PROBE_ADDR";

/// Client configuration. Every field is optional; empty text counts as unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ShadeConfig {
    #[serde(default)]
    pub firestore_project: Option<String>,
    #[serde(default)]
    pub firestore_api_key: Option<String>,
    #[serde(default)]
    pub firestore_base_url: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    /// `host:port` probed for reachability
    #[serde(default)]
    pub probe_addr: Option<String>,
}

impl ShadeConfig {
    /// Parse and validate a JSON config payload.
    pub fn from_json(payload: &str) -> Result<Self, String> {
        let config: Self = serde_json::from_str(payload)
            .map_err(|error| format!("invalid config JSON: {error}"))?;
        config.normalized().validated()
    }

    /// Read a JSON config file.
    pub fn load_file(path: &Path) -> Result<Self, String> {
        let payload = std::fs::read_to_string(path)
            .map_err(|error| format!("failed to read config {}: {error}", path.display()))?;
        Self::from_json(&payload)
    }

    /// Apply overrides from the process environment.
    pub fn with_process_env(self) -> Result<Self, String> {
        self.with_env(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup`; set variables win over file values.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let text = |name: &str| normalize_text_option(lookup(name));

        if let Some(value) = text(ENV_FIRESTORE_PROJECT) {
            self.firestore_project = Some(value);
        }
        if let Some(value) = text(ENV_FIRESTORE_API_KEY) {
            self.firestore_api_key = Some(value);
        }
        if let Some(value) = text(ENV_FIRESTORE_BASE_URL) {
            self.firestore_base_url = Some(value);
        }
        if let Some(value) = text(ENV_ID_TOKEN) {
            self.id_token = Some(value);
        }
        if let Some(value) = text(ENV_USER_ID) {
            self.user_id = Some(value);
        }
        if let Some(value) = text(ENV_DB_PATH) {
            self.db_path = Some(PathBuf::from(value));
        }
        if let Some(value) = text(ENV_POLL_INTERVAL_SECS) {
            let secs = value.parse::<u64>().map_err(|_| {
                format!("{ENV_POLL_INTERVAL_SECS} must be a whole number of seconds")
            })?;
            self.poll_interval_secs = Some(secs);
        }
        if let Some(value) = text(ENV_PROBE_ADDR) {
            self.probe_addr = Some(value);
        }

        self.normalized().validated()
    }

    fn normalized(self) -> Self {
        Self {
            firestore_project: normalize_text_option(self.firestore_project),
            firestore_api_key: normalize_text_option(self.firestore_api_key),
            firestore_base_url: normalize_text_option(self.firestore_base_url)
                .map(|url| url.trim_end_matches('/').to_string()),
            id_token: normalize_text_option(self.id_token),
            user_id: normalize_text_option(self.user_id),
            db_path: self.db_path.filter(|path| !path.as_os_str().is_empty()),
            poll_interval_secs: self.poll_interval_secs,
            probe_addr: normalize_text_option(self.probe_addr),
        }
    }

    fn validated(self) -> Result<Self, String> {
        if let Some(project) = &self.firestore_project {
            if project.contains('/') {
                return Err("config field 'firestore_project' must not contain '/'".to_string());
            }
        }
        if let Some(url) = &self.firestore_base_url {
            if !is_http_url(url) {
                return Err(
                    "config field 'firestore_base_url' must include http:// or https://"
                        .to_string(),
                );
            }
        }
        if let Some(user_id) = &self.user_id {
            user_id
                .parse::<UserId>()
                .map_err(|error| format!("config field 'user_id' is invalid: {error}"))?;
        }
        if self.poll_interval_secs == Some(0) {
            return Err("config field 'poll_interval_secs' must be at least 1".to_string());
        }
        if let Some(addr) = &self.probe_addr {
            let valid = addr
                .rsplit_once(':')
                .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
            if !valid {
                return Err("config field 'probe_addr' must be host:port".to_string());
            }
        }
        Ok(self)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(
            self.poll_interval_secs
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
        )
    }

    /// The configured user, if any. Validation already checked the format.
    pub fn user(&self) -> Option<UserId> {
        self.user_id.as_deref().and_then(|value| value.parse().ok())
    }

    /// Firestore connection settings, when a project is configured.
    pub fn firestore(&self) -> Option<FirestoreConfig> {
        let project = self.firestore_project.clone()?;
        let mut config = FirestoreConfig::new(project)
            .with_api_key(self.firestore_api_key.clone())
            .with_id_token(self.id_token.clone())
            .with_poll_interval(self.poll_interval());
        if let Some(base_url) = &self.firestore_base_url {
            config.base_url.clone_from(base_url);
        }
        Some(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect::<HashMap<_, _>>();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn parse_rejects_unknown_fields() {
        let error = ShadeConfig::from_json(r#"{"firestore_project": "p", "colour": 1}"#)
            .unwrap_err();
        assert!(error.contains("unknown field"));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config =
            ShadeConfig::from_json(r#"{"firestore_project": "  ", "user_id": ""}"#).unwrap();
        assert_eq!(config, ShadeConfig::default());
        assert!(config.firestore().is_none());
        assert!(config.user().is_none());
    }

    #[test]
    fn environment_overrides_file_values() {
        let file = ShadeConfig::from_json(
            r#"{"firestore_project": "from-file", "poll_interval_secs": 30}"#,
        )
        .unwrap();
        let config = file
            .with_env(env(&[
                (ENV_FIRESTORE_PROJECT, "from-env"),
                (ENV_USER_ID, " user-9 "),
                (ENV_ID_TOKEN, "token"),
            ]))
            .unwrap();

        let firestore = config.firestore().unwrap();
        assert_eq!(firestore.project_id, "from-env");
        assert_eq!(firestore.id_token.as_deref(), Some("token"));
        assert_eq!(firestore.poll_interval, Duration::from_secs(30));
        assert_eq!(config.user().unwrap().as_str(), "user-9");
    }

    #[test]
    fn validation_names_the_offending_field() {
        let error = ShadeConfig::default()
            .with_env(env(&[(ENV_POLL_INTERVAL_SECS, "0")]))
            .unwrap_err();
        assert!(error.contains("poll_interval_secs"));

        let error = ShadeConfig::default()
            .with_env(env(&[(ENV_PROBE_ADDR, "no-port")]))
            .unwrap_err();
        assert!(error.contains("probe_addr"));

        let error = ShadeConfig::from_json(r#"{"user_id": "a/b"}"#).unwrap_err();
        assert!(error.contains("user_id"));
    }

    #[test]
    fn load_file_reads_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shade.json");
        std::fs::write(&path, r#"{"db_path": "/tmp/cards.db"}"#).unwrap();

        let config = ShadeConfig::load_file(&path).unwrap();
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/cards.db")));
        assert_eq!(
            config.poll_interval(),
            Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS)
        );
    }
}
