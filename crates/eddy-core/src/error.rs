//! Error types for the eddy engine.

use thiserror::Error;

/// Result type for eddy operations.
pub type Result<T> = std::result::Result<T, EddyError>;

/// Errors surfaced by the replication engine.
///
/// Protocol anomalies (an acknowledgement for an unknown mutation, a cookie
/// ahead of the server's version) are logged and absorbed rather than
/// returned; only programming errors and mutator-authored failures reach
/// callers.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum EddyError {
    #[error("unknown mutator: {0}")]
    UnknownMutator(String),

    #[error("push carried no mutations")]
    EmptyPush,

    #[error("mutator failed: {0}")]
    Mutator(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EddyError {
    /// Construct a mutator-authored failure.
    #[must_use]
    pub fn mutator(msg: impl Into<String>) -> Self {
        EddyError::Mutator(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_mutator_message() {
        let err = EddyError::UnknownMutator("frob".into());
        assert_eq!(err.to_string(), "unknown mutator: frob");
    }

    #[test]
    fn test_mutator_helper() {
        let err = EddyError::mutator("index out of range");
        assert!(matches!(err, EddyError::Mutator(_)));
        assert_eq!(err.to_string(), "mutator failed: index out of range");
    }

    #[test]
    fn test_json_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: EddyError = parse_err.into();
        assert!(matches!(err, EddyError::Json(_)));
    }
}
