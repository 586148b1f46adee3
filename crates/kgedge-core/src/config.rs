//! Application configuration management.
//!
//! This module handles loading and saving the configuration: where the
//! graph service and login provider live, how long to wait for a request,
//! and where the session credential is kept.
//!
//! Configuration is stored at `~/.config/kgedge/config.json`. Environment
//! variables override the file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::{
    Credential, CredentialStore, FileCredentialStore, KeyringCredentialStore,
    MemoryCredentialStore,
};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "kgedge";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const ENV_API_URL: &str = "KGEDGE_API_URL";
const ENV_LOGIN_URL: &str = "KGEDGE_LOGIN_URL";
const ENV_DEV_TOKEN: &str = "KGEDGE_DEV_TOKEN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub login_url: String,
    pub request_timeout_secs: u64,
    pub credential_backend: CredentialBackend,
    /// Static bearer token for local development. Replaces the stored
    /// credential and is never refreshed.
    pub dev_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000/".to_string(),
            login_url: "http://localhost:3000/login".to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            credential_backend: CredentialBackend::default(),
            dev_token: None,
        }
    }
}

impl Config {
    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env();
        Ok(config)
    }

    /// Load from `path` without environment overrides. A missing file
    /// yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(ENV_API_URL) {
            self.api_base_url = url;
        }
        if let Ok(url) = std::env::var(ENV_LOGIN_URL) {
            self.login_url = url;
        }
        if let Ok(token) = std::env::var(ENV_DEV_TOKEN) {
            self.dev_token = Some(token).filter(|t| !t.is_empty());
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Open the configured credential store. A developer token always wins
    /// and lives only in memory.
    pub fn credential_store(&self) -> Result<Arc<dyn CredentialStore>> {
        if let Some(ref token) = self.dev_token {
            return Ok(Arc::new(MemoryCredentialStore::with_credential(
                Credential::developer(token.clone()),
            )));
        }
        Ok(match self.credential_backend {
            CredentialBackend::File => Arc::new(FileCredentialStore::new(self.cache_dir()?)),
            CredentialBackend::Keyring => Arc::new(KeyringCredentialStore::new()),
            CredentialBackend::Memory => Arc::new(MemoryCredentialStore::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = Config::load_from(&dir.path().join("absent.json"))?;
        assert_eq!(config, Config::default());
        assert_eq!(config.request_timeout_secs, 30);
        Ok(())
    }

    #[test]
    fn test_partial_file_keeps_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"api_base_url": "https://graph.example.com/api", "credential_backend": "keyring"}"#,
        )?;

        let config = Config::load_from(&path)?;
        assert_eq!(config.api_base_url, "https://graph.example.com/api");
        assert_eq!(config.credential_backend, CredentialBackend::Keyring);
        assert_eq!(config.login_url, Config::default().login_url);
        Ok(())
    }

    #[test]
    fn test_save_and_reload() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            login_url: "https://login.example.com".to_string(),
            ..Config::default()
        };
        config.save_to(&path)?;
        assert_eq!(Config::load_from(&path)?, config);
        Ok(())
    }

    #[test]
    fn test_env_overrides() {
        temp_env::with_vars(
            [
                (ENV_API_URL, Some("https://graph.example.com/")),
                (ENV_LOGIN_URL, Some("https://login.example.com/")),
                (ENV_DEV_TOKEN, Some("")),
            ],
            || {
                let mut config = Config::default();
                config.apply_env();
                assert_eq!(config.api_base_url, "https://graph.example.com/");
                assert_eq!(config.login_url, "https://login.example.com/");
                assert!(config.dev_token.is_none());
            },
        );
    }

    #[test]
    fn test_dev_token_store() -> Result<()> {
        let config = Config {
            dev_token: Some("local-jwt".to_string()),
            ..Config::default()
        };
        let credential = config.credential_store()?.get()?.expect("dev credential");
        assert_eq!(credential.id_token, "local-jwt");
        assert!(credential.expires_at.is_none());
        Ok(())
    }
}
