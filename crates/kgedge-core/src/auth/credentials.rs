use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Keychain service name for the keyring backend
const SERVICE_NAME: &str = "kgedge";

/// Keychain account holding the serialized credential
const KEYRING_ACCOUNT: &str = "session";

/// Credential file name in cache directory
const CREDENTIAL_FILE: &str = "credential.json";

/// Session credential material: the bearer token, when it stops being
/// valid, and the token that can be traded for a new one.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub id_token: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub refresh_token: Option<String>,
}

impl Credential {
    pub fn new(
        id_token: impl Into<String>,
        expires_at: DateTime<Utc>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            id_token: id_token.into(),
            expires_at: Some(expires_at),
            refresh_token: Some(refresh_token.into()),
        }
    }

    /// A static developer token. It never expires and is never refreshed.
    pub fn developer(id_token: impl Into<String>) -> Self {
        Self {
            id_token: id_token.into(),
            expires_at: None,
            refresh_token: None,
        }
    }

    /// A credential without an expiry is treated as still valid.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|expires| expires < now).unwrap_or(false)
    }
}

// Tokens stay out of logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Durable cache of the session credential.
///
/// `set` must persist all fields together or not at all.
pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Result<Option<Credential>>;
    fn set(&self, credential: &Credential) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Stores the credential as one JSON file in the cache directory so it
/// survives restarts.
pub struct FileCredentialStore {
    cache_dir: PathBuf,
}

impl FileCredentialStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    fn credential_path(&self) -> PathBuf {
        self.cache_dir.join(CREDENTIAL_FILE)
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Result<Option<Credential>> {
        let path = self.credential_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents =
            std::fs::read_to_string(&path).context("Failed to read credential file")?;
        let credential: Credential =
            serde_json::from_str(&contents).context("Failed to parse credential file")?;
        Ok(Some(credential))
    }

    fn set(&self, credential: &Credential) -> Result<()> {
        std::fs::create_dir_all(&self.cache_dir)
            .context("Failed to create credential directory")?;
        let path = self.credential_path();
        // Write-then-rename so a reader never sees a half-written credential.
        let staging = path.with_extension("json.tmp");
        let contents = serde_json::to_string_pretty(credential)?;
        std::fs::write(&staging, contents).context("Failed to write credential file")?;
        std::fs::rename(&staging, &path).context("Failed to replace credential file")?;
        debug!(path = %path.display(), "Credential saved");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let path = self.credential_path();
        if path.exists() {
            std::fs::remove_file(&path).context("Failed to remove credential file")?;
        }
        Ok(())
    }
}

/// Stores the credential in the OS keychain as a single entry.
pub struct KeyringCredentialStore {
    service: String,
}

impl KeyringCredentialStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, KEYRING_ACCOUNT).context("Failed to create keyring entry")
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn get(&self) -> Result<Option<Credential>> {
        match self.entry()?.get_password() {
            Ok(secret) => {
                let credential = serde_json::from_str(&secret)
                    .context("Failed to parse credential from keychain")?;
                Ok(Some(credential))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve credential from keychain"),
        }
    }

    fn set(&self, credential: &Credential) -> Result<()> {
        let secret = serde_json::to_string(credential)?;
        self.entry()?
            .set_password(&secret)
            .context("Failed to store credential in keychain")
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }
}

/// Process-local store. Nothing survives the process.
#[derive(Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            slot: Mutex::new(Some(credential)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Result<Option<Credential>> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| anyhow!("Credential store lock poisoned"))?;
        Ok(slot.clone())
    }

    fn set(&self, credential: &Credential) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow!("Credential store lock poisoned"))?;
        *slot = Some(credential.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow!("Credential store lock poisoned"))?;
        *slot = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample() -> Credential {
        Credential::new("abc", Utc::now() + Duration::hours(1), "r1")
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let past = Credential::new("abc", now - Duration::seconds(1), "r1");
        let future = Credential::new("abc", now + Duration::seconds(60), "r1");
        assert!(past.is_expired_at(now));
        assert!(!future.is_expired_at(now));
        assert!(!Credential::developer("dev").is_expired_at(now));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let rendered = format!("{:?}", sample());
        assert!(!rendered.contains("abc"));
        assert!(!rendered.contains("r1"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_memory_store_roundtrip() -> Result<()> {
        let store = MemoryCredentialStore::new();
        assert!(store.get()?.is_none());

        store.set(&sample())?;
        assert_eq!(store.get()?.map(|c| c.id_token), Some("abc".to_string()));

        store.clear()?;
        assert!(store.get()?.is_none());
        Ok(())
    }

    #[test]
    fn test_file_store_survives_reload() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let credential = sample();

        FileCredentialStore::new(dir.path().to_path_buf()).set(&credential)?;

        let reloaded = FileCredentialStore::new(dir.path().to_path_buf());
        assert_eq!(reloaded.get()?, Some(credential));
        assert!(!dir.path().join("credential.json.tmp").exists());
        Ok(())
    }

    #[test]
    fn test_file_store_clear() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = FileCredentialStore::new(dir.path().join("nested"));

        // Clearing before anything was written is fine
        store.clear()?;

        store.set(&sample())?;
        store.clear()?;
        assert!(store.get()?.is_none());
        Ok(())
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join(CREDENTIAL_FILE), "not json")?;

        let store = FileCredentialStore::new(dir.path().to_path_buf());
        assert!(store.get().is_err());
        Ok(())
    }
}
