use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// No usable credential. When returned from `ApiClient` the login
    /// redirect has already been issued and the call was abandoned.
    #[error("Login required - redirected to the login provider")]
    NeedsLogin,

    #[error("Request failed ({status}): {}", ApiError::truncate_body(.body))]
    ClientError { status: u16, body: String },

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("A partition key is required for this request")]
    MissingPartition,

    #[error("Invalid partition key: {0:?}")]
    InvalidPartition(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Credential store error: {0:#}")]
    Store(anyhow::Error),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    /// True when the call was abandoned for a login redirect. Callers
    /// should drop such results silently.
    pub fn is_login_redirect(&self) -> bool {
        matches!(self, ApiError::NeedsLogin)
    }

    /// Strip the request URL from a transport error. Used where the URL
    /// carries a secret in its query string.
    pub fn without_url(self) -> Self {
        match self {
            ApiError::Transport(e) => ApiError::Transport(e.without_url()),
            other => other,
        }
    }

    /// HTTP status of a rejected request, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::ClientError { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
