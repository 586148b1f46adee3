//! Request envelope: everything needed to issue one call to the graph
//! service, validated before any credential check or network traffic.

use reqwest::header::HeaderValue;
use reqwest::Method;
use serde_json::Value;

use super::ApiError;

/// Header carrying the tenant/shard key on every mutating request
pub const PARTITION_HEADER: &str = "X-KG-Partition";

/// Tenant/shard discriminator. Forwarded to the server exactly as given.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Partition(String);

impl Partition {
    /// Empty or blank keys count as missing. Keys that cannot travel in an
    /// HTTP header are rejected rather than mangled.
    pub fn parse(key: &str) -> Result<Self, ApiError> {
        if key.trim().is_empty() {
            return Err(ApiError::MissingPartition);
        }
        HeaderValue::from_str(key).map_err(|_| ApiError::InvalidPartition(key.to_string()))?;
        Ok(Self(key.to_string()))
    }

    /// Like `parse`, but an empty key means "no partition".
    pub fn parse_optional(key: Option<&str>) -> Result<Option<Self>, ApiError> {
        match key {
            Some(k) if !k.is_empty() => Self::parse(k).map(Some),
            _ => Ok(None),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    pub method: Method,
    pub resource: String,
    pub id: Option<String>,
    pub partition: Option<Partition>,
    pub body: Option<Value>,
    pub requires_auth: bool,
}

impl RequestEnvelope {
    pub fn get(resource: &str, id: Option<&str>, partition: Option<Partition>, requires_auth: bool) -> Self {
        Self {
            method: Method::GET,
            resource: resource.to_string(),
            id: id.filter(|id| !id.is_empty()).map(str::to_string),
            partition,
            body: None,
            requires_auth,
        }
    }

    pub fn post(resource: &str, body: Value, partition: Partition) -> Self {
        Self {
            method: Method::POST,
            resource: resource.to_string(),
            id: None,
            partition: Some(partition),
            body: Some(body),
            requires_auth: true,
        }
    }

    pub fn delete(resource: &str, id: &str, partition: Partition) -> Self {
        Self {
            method: Method::DELETE,
            resource: resource.to_string(),
            id: Some(id.to_string()),
            partition: Some(partition),
            body: None,
            requires_auth: true,
        }
    }

    pub fn is_mutating(&self) -> bool {
        self.method != Method::GET && self.method != Method::HEAD
    }

    /// Mutations are always authenticated and partitioned. A partition may
    /// only be left out of unauthenticated reads.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.resource.trim().is_empty() {
            return Err(ApiError::InvalidRequest("resource must not be empty".to_string()));
        }
        if self.is_mutating() && !self.requires_auth {
            return Err(ApiError::InvalidRequest(format!(
                "{} requests must be authenticated",
                self.method
            )));
        }
        if (self.is_mutating() || self.requires_auth) && self.partition.is_none() {
            return Err(ApiError::MissingPartition);
        }
        if self.method == Method::DELETE && self.id.as_deref().map_or(true, str::is_empty) {
            return Err(ApiError::InvalidRequest("delete requires an entity id".to_string()));
        }
        // A dot segment would address the parent resource, not an entity.
        if let Some(id @ ("." | "..")) = self.id.as_deref() {
            return Err(ApiError::InvalidRequest(format!("{:?} is not a valid entity id", id)));
        }
        Ok(())
    }
}
