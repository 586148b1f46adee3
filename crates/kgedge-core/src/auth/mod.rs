//! Authentication module for managing session credentials.
//!
//! This module provides:
//! - `Credential`: bearer token, expiry and refresh token
//! - `CredentialStore`: storage abstraction with file, keychain and memory backends
//! - `SessionGuard`: lazy expiry detection and refresh-token exchange
//! - `LoginRedirect`: hook invoked when the user must log in again

pub mod credentials;
pub mod redirect;
pub mod session;

pub use credentials::{
    Credential, CredentialStore, FileCredentialStore, KeyringCredentialStore,
    MemoryCredentialStore,
};
pub use redirect::LoginRedirect;
pub use session::{Clock, SessionGuard, SessionState, SystemClock};
