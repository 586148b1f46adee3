//! Core library for kgedge.
//!
//! kgedge edits single edges of a multi-tenant graph held by a remote
//! graph-storage service. This crate holds everything that is not
//! presentation:
//!
//! - `auth`: credential storage, the session guard that keeps the bearer
//!   token fresh, and the login redirect hook
//! - `api`: the partition-aware REST client and its error taxonomy
//! - `config`: endpoint and credential-backend configuration
//! - `models`: the edge and graph data types
//! - `editor`: edge edit operations built on top of the API client

pub mod api;
pub mod auth;
pub mod config;
pub mod editor;
pub mod models;

pub use api::{ApiClient, ApiError, Partition};
pub use auth::{Credential, CredentialStore, LoginRedirect, SessionGuard};
pub use config::Config;
pub use editor::EdgeEditor;
pub use models::{Edge, Graph};

#[cfg(test)]
pub(crate) mod test_support {
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use anyhow::Result;
    use chrono::{DateTime, Utc};

    use crate::auth::{Clock, Credential, CredentialStore, LoginRedirect, MemoryCredentialStore};

    pub fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    /// Base URL of a local port that nothing listens on, so connects fail fast.
    pub fn closed_local_base_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
        let port = listener.local_addr().expect("listener address").port();
        drop(listener);
        format!("http://127.0.0.1:{}/", port)
    }

    /// Redirect hook that remembers every login URL it was sent to.
    #[derive(Default)]
    pub struct RecordingRedirect {
        pub targets: Mutex<Vec<String>>,
    }

    impl RecordingRedirect {
        pub fn count(&self) -> usize {
            self.targets.lock().map(|t| t.len()).unwrap_or(0)
        }
    }

    impl LoginRedirect for RecordingRedirect {
        fn redirect(&self, login_url: &str) {
            if let Ok(mut targets) = self.targets.lock() {
                targets.push(login_url.to_string());
            }
        }
    }

    pub struct FixedClock(pub DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    /// Memory store that counts reads, used to prove a call never
    /// consulted the credential cache.
    #[derive(Default)]
    pub struct CountingStore {
        inner: MemoryCredentialStore,
        pub reads: AtomicUsize,
    }

    impl CountingStore {
        pub fn with_credential(credential: Credential) -> Arc<Self> {
            Arc::new(Self {
                inner: MemoryCredentialStore::with_credential(credential),
                reads: AtomicUsize::new(0),
            })
        }

        pub fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    impl CredentialStore for CountingStore {
        fn get(&self) -> Result<Option<Credential>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.get()
        }

        fn set(&self, credential: &Credential) -> Result<()> {
            self.inner.set(credential)
        }

        fn clear(&self) -> Result<()> {
            self.inner.clear()
        }
    }
}
