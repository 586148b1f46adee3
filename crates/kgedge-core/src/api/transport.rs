//! Raw HTTP access to the graph service: URL building, the fixed request
//! headers and response classification. No credentials are involved here,
//! which is what lets the session guard use it for the refresh exchange.

use std::time::Duration;

use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde_json::Value;
use tracing::debug;

use super::ApiError;

/// How the server answered a request.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    Success(Value),
    ClientError { status: u16, body: String },
    Unauthenticated,
}

/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct Transport {
    client: Client,
    base_url: String,
}

impl Transport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        Url::parse(base_url)
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid base URL {}: {}", base_url, e)))?;

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    /// `{base}/{resource}[/{id}]`, with exactly one slash after the base.
    /// The id is pushed as a single path segment, so `/`, `?` and `#` in it
    /// are percent-encoded instead of changing the route.
    pub fn endpoint(&self, resource: &str, id: Option<&str>) -> Result<Url, ApiError> {
        let slash = if self.base_url.ends_with('/') { "" } else { "/" };
        let joined = format!("{}{}{}", self.base_url, slash, resource);
        let mut url = Url::parse(&joined)
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid URL {}: {}", joined, e)))?;
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            url.path_segments_mut()
                .map_err(|_| ApiError::InvalidRequest(format!("{} cannot take an entity id", joined)))?
                .pop_if_empty()
                .push(id);
        }
        Ok(url)
    }

    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(header::CONTENT_TYPE, "application/json")
    }

    /// Send one request and classify the answer. Network failures are
    /// errors; anything the server says is an outcome.
    pub async fn send(&self, request: RequestBuilder) -> Result<ResponseOutcome, ApiError> {
        let response = request.send().await?;
        Self::classify(response).await
    }

    pub async fn classify(response: Response) -> Result<ResponseOutcome, ApiError> {
        let status = response.status();
        // Path only: the refresh exchange carries its token in the query.
        debug!(status = status.as_u16(), path = %response.url().path(), "Response received");

        if status == StatusCode::UNAUTHORIZED {
            return Ok(ResponseOutcome::Unauthenticated);
        }
        if (400..600).contains(&status.as_u16()) {
            let body = response.text().await.unwrap_or_default();
            return Ok(ResponseOutcome::ClientError {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(ResponseOutcome::Success(Value::Null));
        }
        serde_json::from_str(&text)
            .map(ResponseOutcome::Success)
            .map_err(|e| ApiError::InvalidResponse(format!("Response is not JSON: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(base: &str) -> Transport {
        Transport::new(base, Duration::from_secs(1)).expect("valid base url")
    }

    fn endpoint(t: &Transport, resource: &str, id: Option<&str>) -> String {
        t.endpoint(resource, id).expect("valid endpoint").to_string()
    }

    #[test]
    fn test_endpoint_joins_with_single_slash() {
        assert_eq!(
            endpoint(&transport("https://graph.example.com/api"), "edge-post", None),
            "https://graph.example.com/api/edge-post"
        );
        assert_eq!(
            endpoint(&transport("https://graph.example.com/api/"), "edge-post", None),
            "https://graph.example.com/api/edge-post"
        );
    }

    #[test]
    fn test_endpoint_appends_id() {
        let t = transport("https://graph.example.com/");
        assert_eq!(
            endpoint(&t, "edge-delete", Some("e-42")),
            "https://graph.example.com/edge-delete/e-42"
        );
        assert_eq!(endpoint(&t, "edge-get", Some("")), "https://graph.example.com/edge-get");
    }

    #[test]
    fn test_endpoint_encodes_id_as_one_segment() {
        let t = transport("https://graph.example.com/");
        assert_eq!(
            endpoint(&t, "edge-delete", Some("../node-delete/n1")),
            "https://graph.example.com/edge-delete/..%2Fnode-delete%2Fn1"
        );
        assert_eq!(
            endpoint(&t, "edge-delete", Some("e1#junk")),
            "https://graph.example.com/edge-delete/e1%23junk"
        );
        assert_eq!(
            endpoint(&t, "edge-get", Some("e1?x=1")),
            "https://graph.example.com/edge-get/e1%3Fx=1"
        );

        let url = t.endpoint("edge-delete", Some("a/b")).unwrap();
        assert_eq!(url.path_segments().map(|s| s.count()), Some(2));
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(matches!(
            Transport::new("not a url", Duration::from_secs(1)),
            Err(ApiError::InvalidRequest(_))
        ));
    }
}
