//! Anchor client errors.

use thiserror::Error;

/// Errors raised by anchor ledger clients.
#[derive(Debug, Error)]
pub enum AnchorError {
    /// No root has been anchored under this batch id.
    #[error("no anchored root for batch {0}")]
    NotFound(u64),

    /// The ledger rejected the commit.
    #[error("commit rejected: {0}")]
    Submission(String),

    /// Transport-level failure talking to the ledger.
    #[error("network error: {0}")]
    Network(String),

    /// The ledger did not answer within the deadline.
    #[error("anchor operation timed out after {0}ms")]
    Timeout(u64),

    /// The ledger is temporarily refusing requests.
    #[error("anchor ledger unavailable: {0}")]
    Unavailable(String),
}

impl AnchorError {
    /// Whether retrying the same operation can succeed.
    ///
    /// Absence (`NotFound`) and rejection (`Submission`) are definitive;
    /// transport faults and outages are transient.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AnchorError::Network(_) | AnchorError::Timeout(_) | AnchorError::Unavailable(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AnchorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(AnchorError::Network("reset".into()).is_retryable());
        assert!(AnchorError::Timeout(5000).is_retryable());
        assert!(AnchorError::Unavailable("maintenance".into()).is_retryable());
        assert!(!AnchorError::NotFound(7).is_retryable());
        assert!(!AnchorError::Submission("bad root".into()).is_retryable());
    }
}
