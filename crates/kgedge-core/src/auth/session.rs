//! Session guard: turns whatever is in the credential store into a bearer
//! token that is valid right now, or reports that the user has to log in.
//!
//! Expiry is detected lazily. Nothing polls the clock in the background;
//! a credential that expired between two calls is noticed by the second
//! call, which then performs a single refresh exchange.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::{ApiError, ResponseOutcome, Transport};

use super::{Credential, CredentialStore};

/// Resource that trades a refresh token for a new bearer token
const REFRESH_RESOURCE: &str = "jwt-get";

/// Source of the current time, injectable so expiry can be tested.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoCredential,
    Valid,
    Expired,
    Refreshing,
}

/// Body of a successful refresh exchange.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    #[serde(alias = "id_token")]
    id_token: String,
    #[serde(alias = "expires_at")]
    expires_at: DateTime<Utc>,
    #[serde(default, alias = "refresh_token")]
    refresh_token: Option<String>,
}

impl RefreshResponse {
    /// The provider may omit the refresh token, in which case the one we
    /// exchanged stays valid.
    fn into_credential(self, previous_refresh_token: &str) -> Credential {
        Credential {
            id_token: self.id_token,
            expires_at: Some(self.expires_at),
            refresh_token: Some(
                self.refresh_token
                    .unwrap_or_else(|| previous_refresh_token.to_string()),
            ),
        }
    }
}

pub struct SessionGuard {
    store: Arc<dyn CredentialStore>,
    transport: Transport,
    clock: Arc<dyn Clock>,
    // Held for the duration of a refresh exchange; parallel callers wait
    // here and then pick up the refreshed credential from the store.
    refresh_lock: Mutex<()>,
}

impl SessionGuard {
    pub fn new(store: Arc<dyn CredentialStore>, transport: Transport) -> Self {
        Self {
            store,
            transport,
            clock: Arc::new(SystemClock),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Current credential, if any.
    pub fn credential(&self) -> Result<Option<Credential>, ApiError> {
        self.store.get().map_err(ApiError::Store)
    }

    pub fn state(&self) -> Result<SessionState, ApiError> {
        if self.refresh_lock.try_lock().is_err() {
            return Ok(SessionState::Refreshing);
        }
        Ok(match self.credential()? {
            None => SessionState::NoCredential,
            Some(c) if c.is_expired_at(self.clock.now()) => SessionState::Expired,
            Some(_) => SessionState::Valid,
        })
    }

    /// Drop the cached credential.
    pub fn logout(&self) -> Result<(), ApiError> {
        info!("Clearing session credential");
        self.store.clear().map_err(ApiError::Store)
    }

    /// Return a credential whose bearer token can be sent now.
    ///
    /// Fails with `ApiError::NeedsLogin` when there is no credential, when an
    /// expired credential has no refresh token, or when the refresh exchange
    /// fails. In the last two cases the store is cleared.
    pub async fn ensure_valid_credential(&self) -> Result<Credential, ApiError> {
        let Some(credential) = self.credential()? else {
            debug!("No credential stored");
            return Err(ApiError::NeedsLogin);
        };
        if !credential.is_expired_at(self.clock.now()) {
            return Ok(credential);
        }

        let _refreshing = self.refresh_lock.lock().await;

        // Another caller may have finished a refresh while we waited.
        let Some(current) = self.credential()? else {
            return Err(ApiError::NeedsLogin);
        };
        if !current.is_expired_at(self.clock.now()) {
            debug!("Credential refreshed by a concurrent request");
            return Ok(current);
        }

        let Some(refresh_token) = current.refresh_token.as_deref() else {
            warn!("Credential expired and no refresh token is available");
            self.discard();
            return Err(ApiError::NeedsLogin);
        };

        match self.refresh(refresh_token).await {
            Ok(fresh) => {
                self.store.set(&fresh).map_err(ApiError::Store)?;
                info!(expires_at = ?fresh.expires_at, "Credential refreshed");
                Ok(fresh)
            }
            Err(e) => {
                warn!(error = %e, "Refresh exchange failed");
                self.discard();
                Err(ApiError::NeedsLogin)
            }
        }
    }

    /// Refresh exchange. Goes straight to the transport, so it never asks
    /// for a credential itself.
    async fn refresh(&self, refresh_token: &str) -> Result<Credential, ApiError> {
        let url = self.transport.endpoint(REFRESH_RESOURCE, None)?;
        debug!(url = %url, "Refreshing credential");
        let request = self
            .transport
            .request(Method::GET, url)
            .query(&[("refresh", refresh_token)]);

        // The request URL holds the refresh token; keep it out of the error.
        let outcome = self
            .transport
            .send(request)
            .await
            .map_err(ApiError::without_url)?;
        match outcome {
            ResponseOutcome::Success(payload) => {
                let response: RefreshResponse = serde_json::from_value(payload).map_err(|e| {
                    ApiError::InvalidResponse(format!("Malformed refresh response: {}", e))
                })?;
                Ok(response.into_credential(refresh_token))
            }
            ResponseOutcome::ClientError { status, body } => {
                Err(ApiError::ClientError { status, body })
            }
            ResponseOutcome::Unauthenticated => Err(ApiError::NeedsLogin),
        }
    }

    fn discard(&self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear credential store");
        }
    }
}
