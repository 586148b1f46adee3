//! API client for the graph-storage REST service.
//!
//! Every mutating call carries a bearer token obtained from the
//! `SessionGuard` and the caller's partition key. A 401, or a session that
//! cannot be made valid, sends the user to the login provider and abandons
//! the call.

use std::sync::Arc;
use std::time::Duration;

use reqwest::RequestBuilder;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::{CredentialStore, LoginRedirect, SessionGuard};
use crate::config::Config;

use super::{ApiError, Partition, RequestEnvelope, ResponseOutcome, Transport, PARTITION_HEADER};

/// Clone is cheap - all state is shared.
#[derive(Clone)]
pub struct ApiClient {
    transport: Transport,
    session: Arc<SessionGuard>,
    redirect: Arc<dyn LoginRedirect>,
    login_url: String,
}

impl ApiClient {
    pub fn new(
        transport: Transport,
        session: Arc<SessionGuard>,
        redirect: Arc<dyn LoginRedirect>,
        login_url: &str,
    ) -> Self {
        Self {
            transport,
            session,
            redirect,
            login_url: login_url.to_string(),
        }
    }

    /// Build the transport and session guard described by `config`.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn CredentialStore>,
        redirect: Arc<dyn LoginRedirect>,
    ) -> Result<Self, ApiError> {
        let transport = Transport::new(
            &config.api_base_url,
            Duration::from_secs(config.request_timeout_secs),
        )?;
        let session = Arc::new(SessionGuard::new(store, transport.clone()));
        Ok(Self::new(transport, session, redirect, &config.login_url))
    }

    pub fn session(&self) -> &SessionGuard {
        &self.session
    }

    /// GET `{base}/{resource}[/{id}]`. Only authenticated when
    /// `requires_auth` is set.
    pub async fn get(
        &self,
        resource: &str,
        id: Option<&str>,
        partition: Option<&str>,
        requires_auth: bool,
    ) -> Result<Value, ApiError> {
        let partition = Partition::parse_optional(partition)?;
        self.execute(RequestEnvelope::get(resource, id, partition, requires_auth))
            .await
    }

    /// POST a JSON entity to `{base}/{resource}`.
    pub async fn post<B: Serialize + ?Sized>(
        &self,
        resource: &str,
        body: &B,
        partition: &str,
    ) -> Result<Value, ApiError> {
        let partition = Partition::parse(partition)?;
        let body = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to serialize body: {}", e)))?;
        self.execute(RequestEnvelope::post(resource, body, partition))
            .await
    }

    /// DELETE `{base}/{resource}/{id}`.
    pub async fn del(&self, resource: &str, id: &str, partition: &str) -> Result<Value, ApiError> {
        let partition = Partition::parse(partition)?;
        self.execute(RequestEnvelope::delete(resource, id, partition))
            .await
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        resource: &str,
        id: Option<&str>,
        partition: Option<&str>,
        requires_auth: bool,
    ) -> Result<T, ApiError> {
        let value = self.get(resource, id, partition, requires_auth).await?;
        Self::decode(resource, value)
    }

    /// Issue one validated request. At most one call reaches `resource`;
    /// the session guard may make one refresh call before it.
    pub async fn execute(&self, envelope: RequestEnvelope) -> Result<Value, ApiError> {
        envelope.validate()?;

        let url = self
            .transport
            .endpoint(&envelope.resource, envelope.id.as_deref())?;
        let mut request = self.transport.request(envelope.method.clone(), url.clone());

        if envelope.requires_auth {
            request = self.authorize(request).await?;
        }
        if let Some(ref partition) = envelope.partition {
            request = request.header(PARTITION_HEADER, partition.as_str());
        }
        if let Some(ref body) = envelope.body {
            request = request.json(body);
        }

        debug!(method = %envelope.method, url = %url, partition = ?envelope.partition.as_ref().map(Partition::as_str), "Sending request");

        match self.transport.send(request).await? {
            ResponseOutcome::Success(value) => Ok(value),
            ResponseOutcome::ClientError { status, body } => {
                warn!(status = status, url = %url, "Request rejected");
                Err(ApiError::ClientError { status, body })
            }
            ResponseOutcome::Unauthenticated => {
                warn!(url = %url, "Got a 401, redirecting to login");
                Err(self.redirect_to_login())
            }
        }
    }

    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, ApiError> {
        match self.session.ensure_valid_credential().await {
            Ok(credential) => Ok(request.bearer_auth(&credential.id_token)),
            Err(ApiError::NeedsLogin) => Err(self.redirect_to_login()),
            Err(e) => Err(e),
        }
    }

    fn redirect_to_login(&self) -> ApiError {
        self.redirect.redirect(&self.login_url);
        ApiError::NeedsLogin
    }

    fn decode<T: DeserializeOwned>(resource: &str, value: Value) -> Result<T, ApiError> {
        serde_json::from_value(value).map_err(|e| {
            ApiError::InvalidResponse(format!("Unexpected payload from {}: {}", resource, e))
        })
    }
}
