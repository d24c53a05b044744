//! Configuration and session persistence for the OpsDeck console client.
//!
//! TOML + environment loading via figment, plus the file-backed session
//! vault used to restore a login across restarts. The vault boundary is
//! synchronous and fire-and-forget: IO failures degrade to an in-memory
//! session rather than surfacing to the request path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use std::{fs, io};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use url::Url;

use opsdeck_api::{SessionVault, TransportConfig};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("could not determine a home directory for this platform")]
    NoProjectDirs,

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Config ──────────────────────────────────────────────────────────

/// Client configuration: one backend endpoint and a bounded per-request
/// deadline.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Backend root URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request deadline in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:3000".into()
}

fn default_timeout() -> u64 {
    10
}

impl Config {
    /// Load from the platform config dir's `config.toml` plus
    /// `OPSDECK_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let path = project_dirs()
            .ok_or(ConfigError::NoProjectDirs)?
            .config_dir()
            .join("config.toml");
        Self::load_from(&path)
    }

    /// Load from an explicit TOML file (missing file = defaults), then
    /// apply `OPSDECK_*` environment overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("OPSDECK_"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.base_url).map_err(|e| ConfigError::Validation {
            field: "base_url".into(),
            reason: e.to_string(),
        })?;
        if self.timeout == 0 {
            return Err(ConfigError::Validation {
                field: "timeout".into(),
                reason: "must be at least 1 second".into(),
            });
        }
        Ok(())
    }

    /// The parsed backend root URL.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.base_url).map_err(|e| ConfigError::Validation {
            field: "base_url".into(),
            reason: e.to_string(),
        })
    }

    /// Translate into the API crate's transport configuration.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            timeout: Duration::from_secs(self.timeout),
        }
    }
}

/// Platform directories for config and persisted session data.
pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("io", "opsdeck", "opsdeck")
}

// ── File-backed session vault ───────────────────────────────────────

/// File-backed [`SessionVault`]: one JSON object per file, rewritten in
/// full on every mutation. Writes are synchronous; failures are logged
/// and swallowed, per the vault contract.
pub struct FileVault {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileVault {
    /// Open (or create on first write) a vault at `path`, loading any
    /// existing entries. A corrupt file is discarded with a warning.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = Self::read_entries(&path);
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    /// Open the vault at its default location under the project data dir.
    pub fn open_default() -> Result<Self, ConfigError> {
        let dirs = project_dirs().ok_or(ConfigError::NoProjectDirs)?;
        fs::create_dir_all(dirs.data_dir())?;
        Ok(Self::open(dirs.data_dir().join("session.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(path: &Path) -> HashMap<String, String> {
        let Ok(raw) = fs::read_to_string(path) else {
            return HashMap::new();
        };
        serde_json::from_str(&raw)
            .inspect_err(|e| warn!("discarding corrupt session vault: {e}"))
            .unwrap_or_default()
    }

    fn flush(&self, entries: &HashMap<String, String>) {
        let raw = match serde_json::to_string_pretty(entries) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("failed to serialize session vault: {e}");
                return;
            }
        };
        if let Err(e) = fs::write(&self.path, raw) {
            warn!("failed to persist session vault: {e}");
        }
    }
}

impl SessionVault for FileVault {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_owned(), value.to_owned());
        self.flush(&entries);
    }

    fn remove(&self, key: &str) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if entries.remove(key).is_some() {
            self.flush(&entries);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_when_no_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.timeout, 10);
        assert_eq!(config.transport().timeout, Duration::from_secs(10));
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "base_url = \"https://console.example.com\"\ntimeout = 30\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.base_url, "https://console.example.com");
        assert_eq!(config.timeout, 30);
        assert_eq!(
            config.base_url().unwrap().host_str(),
            Some("console.example.com")
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "base_url = \"not a url\"\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "base_url"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "timeout = 0\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "timeout"));
    }

    #[test]
    fn vault_round_trips_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        {
            let vault = FileVault::open(&path);
            vault.set("auth_token", "access-1");
            vault.set("user", r#"{"userId":"u1","email":"a@b.c"}"#);
        }

        let vault = FileVault::open(&path);
        assert_eq!(vault.get("auth_token").as_deref(), Some("access-1"));

        vault.remove("auth_token");
        let vault = FileVault::open(&path);
        assert!(vault.get("auth_token").is_none());
        assert!(vault.get("user").is_some());
    }

    #[test]
    fn corrupt_vault_file_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "not json").unwrap();

        let vault = FileVault::open(&path);
        assert!(vault.get("auth_token").is_none());

        // Still writable afterwards.
        vault.set("auth_token", "access-1");
        assert_eq!(vault.get("auth_token").as_deref(), Some("access-1"));
    }
}
