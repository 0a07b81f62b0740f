//! Error types for the SyzgyDB client

use thiserror::Error;

/// Client error type
#[derive(Error, Debug)]
pub enum SyzgyError {
    /// The service answered with an HTTP status >= 400.
    ///
    /// Not-found, conflict and validation failures all land here; callers
    /// tell them apart by `status_code`.
    #[error("service error {status_code}: {body}")]
    Service {
        /// HTTP status
        status_code: u16,
        /// Raw response body
        body: String,
    },

    /// The request never got a response.
    #[error("http transport error: {0}")]
    Transport(String),

    /// The response body was not the expected JSON.
    #[error("json decode error: {0}")]
    Decode(String),

    /// Rejected before sending.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A request body could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyzgyError {
    /// HTTP status carried by a service error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Service { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// True for a 404 from the service.
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    /// Whether repeating the same request could succeed: connection-level
    /// failures, 429 and 5xx.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Service { status_code, .. } => *status_code == 429 || *status_code >= 500,
            _ => false,
        }
    }
}

/// Result type for client operations
pub type SyzgyResult<T> = Result<T, SyzgyError>;
