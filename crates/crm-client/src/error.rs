//! Error types for API calls

/// Errors surfaced to callers of `ApiClient`.
///
/// Cloneable: a failed refresh hands the same error to the leader and to
/// every request queued behind it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// No response was received (connect, timeout, body read).
    #[error("request failed: {0}")]
    Transport(String),

    /// The API answered with a non-2xx status. A 401 reaches the caller
    /// only when it could not be recovered by a refresh.
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The refresh endpoint failed or returned no usable access token.
    /// The session has already been cleared when this is returned.
    #[error("token refresh failed: {0}")]
    Refresh(#[from] crm_auth::Error),

    /// The request leading the refresh was cancelled before it settled.
    #[error("token refresh abandoned before it settled")]
    RefreshAbandoned,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl ClientError {
    /// HTTP status of an error response, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Message suitable for showing to an operator.
    ///
    /// Prefers the API's own `message` or `error` field, falling back to
    /// `fallback` for anything without one.
    pub fn user_message(&self, fallback: &str) -> String {
        if let ClientError::Status { body, .. } = self
            && let Ok(value) = serde_json::from_str::<serde_json::Value>(body)
        {
            for field in ["message", "error"] {
                if let Some(text) = value.get(field).and_then(|v| v.as_str())
                    && !text.is_empty()
                {
                    return text.to_owned();
                }
            }
        }
        fallback.to_owned()
    }
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
