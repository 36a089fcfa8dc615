//! Remote and sync-cycle error types.

use thiserror::Error;

use crate::models::{RejectionKind, SyncRejection};

/// Failure of one call to the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Timeout, unreachable host, 5xx, 408/429 or an undecodable body.
    /// Retried on the next cycle.
    #[error("Network error: {0}")]
    Network(String),

    /// 401: the bearer token is missing, invalid or expired
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// 400 and other client errors: the payload was refused
    #[error("Rejected by server: {0}")]
    Validation(String),

    /// 403: the entry belongs to someone else
    #[error("Not allowed: {0}")]
    Authorization(String),

    /// 404
    #[error("Not found: {0}")]
    NotFound(String),
}

impl RemoteError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 => Self::Auth(message),
            403 => Self::Authorization(message),
            404 => Self::NotFound(message),
            408 | 429 => Self::Network(message),
            400..=499 => Self::Validation(message),
            _ => Self::Network(message),
        }
    }

    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// The rejection to store on an entry whose push failed this way, if any.
    pub fn rejection(&self) -> Option<SyncRejection> {
        let (kind, message) = match self {
            Self::Validation(message) | Self::NotFound(message) => {
                (RejectionKind::Validation, message)
            }
            Self::Authorization(message) => (RejectionKind::Forbidden, message),
            Self::Network(_) | Self::Auth(_) => return None,
        };
        Some(SyncRejection {
            kind,
            message: message.clone(),
        })
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Network(format!("request timed out: {error}"))
        } else if error.is_decode() {
            Self::Network(format!("invalid response body: {error}"))
        } else {
            Self::Network(error.to_string())
        }
    }
}

/// Failure that ends a sync cycle early.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Authentication failed, sign in again: {0}")]
    Auth(String),

    #[error("Could not fetch remote entries: {0}")]
    Pull(RemoteError),

    #[error("Invalid sync configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Store(#[from] crate::Error),
}

impl SyncError {
    /// The caller must obtain a new token before syncing again.
    pub const fn requires_reauth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let message = || "boom".to_string();
        assert!(matches!(
            RemoteError::from_status(400, message()),
            RemoteError::Validation(_)
        ));
        assert!(matches!(RemoteError::from_status(401, message()), RemoteError::Auth(_)));
        assert!(matches!(
            RemoteError::from_status(403, message()),
            RemoteError::Authorization(_)
        ));
        assert!(matches!(
            RemoteError::from_status(404, message()),
            RemoteError::NotFound(_)
        ));
        assert!(RemoteError::from_status(429, message()).is_retryable());
        assert!(RemoteError::from_status(500, message()).is_retryable());
        assert!(RemoteError::from_status(503, message()).is_retryable());
    }

    #[test]
    fn only_refusals_become_rejections() {
        let rejection = RemoteError::Authorization("other user".to_string())
            .rejection()
            .unwrap();
        assert_eq!(rejection.kind, RejectionKind::Forbidden);
        assert!(RemoteError::Network("offline".to_string()).rejection().is_none());
        assert!(RemoteError::Auth("expired".to_string()).rejection().is_none());
    }
}
