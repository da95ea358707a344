//! Error types for hr-client
//!
//! Every server error body (`detail`, `message` or `error`) is normalized
//! into [`ClientError::Api`] carrying the HTTP status.

use hr_common::ValidationError;
use thiserror::Error;

/// Client error type
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    /// Rejected locally; the request was never sent
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Refresh failed; stored tokens have been purged
    #[error("Session expired, please log in again")]
    SessionExpired,

    /// Server answered with an error status
    #[error("{message} (HTTP {status})")]
    Api { status: u16, message: String },

    /// Request never completed
    #[error("Network error: {0}")]
    Network(String),

    /// Response body did not match the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// Token storage could not be read or written
    #[error("Storage error: {0}")]
    Storage(String),
}

impl ClientError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        ClientError::Api {
            status,
            message: message.into(),
        }
    }

    /// HTTP status associated with the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::SessionExpired => Some(401),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Transient failures that a retry may fix
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Network(_) => true,
            ClientError::Api { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            _ => false,
        }
    }

    /// Message suitable for showing to a user
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_classification() {
        let not_found = ClientError::api(404, "Organization not found");
        assert_eq!(not_found.status(), Some(404));
        assert!(not_found.is_not_found());
        assert!(!not_found.is_retryable());

        assert!(ClientError::api(503, "down").is_retryable());
        assert!(ClientError::Network("refused".into()).is_retryable());
        assert_eq!(ClientError::SessionExpired.status(), Some(401));
        assert_eq!(ClientError::Decode("bad".into()).status(), None);
    }

    #[test]
    fn test_validation_message_names_field() {
        let err: ClientError = hr_common::validation::rating(0).unwrap_err().into();
        assert_eq!(err.to_string(), "rating: must be between 1 and 5");
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_user_message_drops_status() {
        let err = ClientError::api(409, "A personality with this name already exists");
        assert_eq!(err.user_message(), "A personality with this name already exists");
        assert!(err.to_string().contains("409"));
    }
}
