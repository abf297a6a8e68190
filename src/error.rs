// ⚠️ Errors - One error type for store, registry and orchestration
//
// Every fallible operation in the library returns `SyncError`.
// `ErrorKind` is the serializable discriminant that ends up in sync outcomes,
// sync history rows and API responses.

use serde::{Deserialize, Serialize};

// ============================================================================
// ERROR KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidFormat,
    AlreadyExists,
    NotFound,
    Unreachable,
    MalformedResponse,
    Storage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidFormat => "invalid_format",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unreachable => "unreachable",
            ErrorKind::MalformedResponse => "malformed_response",
            ErrorKind::Storage => "storage",
        }
    }

    pub fn parse(s: &str) -> Option<ErrorKind> {
        match s {
            "invalid_format" => Some(ErrorKind::InvalidFormat),
            "already_exists" => Some(ErrorKind::AlreadyExists),
            "not_found" => Some(ErrorKind::NotFound),
            "unreachable" => Some(ErrorKind::Unreachable),
            "malformed_response" => Some(ErrorKind::MalformedResponse),
            "storage" => Some(ErrorKind::Storage),
            _ => None,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SYNC ERROR
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("invalid registry number format: {0:?} (expected exactly 8 digits)")]
    InvalidFormat(String),

    #[error("company with registry number {0} already exists")]
    AlreadyExists(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("registry unreachable: {0}")]
    Unreachable(String),

    #[error("malformed registry response: {0}")]
    MalformedResponse(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::InvalidFormat(_) => ErrorKind::InvalidFormat,
            SyncError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            SyncError::NotFound(_) => ErrorKind::NotFound,
            SyncError::Unreachable(_) => ErrorKind::Unreachable,
            SyncError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            SyncError::Storage(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn company_not_found(id: &str) -> Self {
        SyncError::NotFound(format!("company {}", id))
    }

    /// Failures the fallback dataset is allowed to cover
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SyncError::Unreachable(_) | SyncError::MalformedResponse(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in [
            ErrorKind::InvalidFormat,
            ErrorKind::AlreadyExists,
            ErrorKind::NotFound,
            ErrorKind::Unreachable,
            ErrorKind::MalformedResponse,
            ErrorKind::Storage,
        ] {
            assert_eq!(ErrorKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ErrorKind::parse("bogus"), None);
    }

    #[test]
    fn test_only_remote_failures_are_transient() {
        assert!(SyncError::Unreachable("timeout".into()).is_transient());
        assert!(SyncError::MalformedResponse("not json".into()).is_transient());
        assert!(!SyncError::NotFound("registry number 12345678".into()).is_transient());
        assert!(!SyncError::InvalidFormat("123".into()).is_transient());
    }

    #[test]
    fn test_serialized_kind_is_snake_case() {
        let json = serde_json::to_string(&ErrorKind::MalformedResponse).unwrap();
        assert_eq!(json, "\"malformed_response\"");
    }
}
