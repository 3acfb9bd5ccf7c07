//! Error types for the sync layer.
//!
//! `RemoteError` is what the remote document service surfaces; `SyncError`
//! is the taxonomy the public operations return. Multi-match lookup
//! anomalies are deliberately not errors: call sites take the first match
//! and log a warning instead.

use std::fmt;

/// Failure surfaced by the remote document service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The requested username is already registered.
    UsernameTaken,
    /// The server refused the request (authorization, ACL).
    AccessDenied(String),
    /// The request was rejected as malformed by the server.
    Invalid(String),
    /// The service could not be reached or failed mid-request.
    Unavailable(String),
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteError::UsernameTaken => write!(f, "username is already taken"),
            RemoteError::AccessDenied(e) => write!(f, "access denied: {}", e),
            RemoteError::Invalid(e) => write!(f, "invalid request: {}", e),
            RemoteError::Unavailable(e) => write!(f, "service unavailable: {}", e),
        }
    }
}

impl std::error::Error for RemoteError {}

/// Errors returned by the public sync operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Malformed input caught before any remote call.
    Validation(String),
    /// No active user, or the active user's session credential is empty.
    SessionInvalid,
    /// A content-match lookup found no candidate.
    NotFound(String),
    /// Failure propagated from the remote service, as a readable message.
    Remote(String),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Validation(e) => write!(f, "{}", e),
            SyncError::SessionInvalid => write!(f, "not signed in or session expired"),
            SyncError::NotFound(e) => write!(f, "{}", e),
            SyncError::Remote(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<RemoteError> for SyncError {
    fn from(e: RemoteError) -> Self {
        SyncError::Remote(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_display() {
        assert_eq!(
            RemoteError::UsernameTaken.to_string(),
            "username is already taken"
        );
        assert_eq!(
            RemoteError::Unavailable("timeout".to_string()).to_string(),
            "service unavailable: timeout"
        );
    }

    #[test]
    fn test_remote_error_converts_to_sync_error() {
        let err: SyncError = RemoteError::AccessDenied("bad key".to_string()).into();
        assert_eq!(
            err,
            SyncError::Remote("access denied: bad key".to_string())
        );
    }

    #[test]
    fn test_session_invalid_display() {
        assert_eq!(
            SyncError::SessionInvalid.to_string(),
            "not signed in or session expired"
        );
    }
}
