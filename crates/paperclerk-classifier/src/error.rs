//! Error types for a single classification stage

use thiserror::Error;

/// Why one stage did not produce an attempt
///
/// These never escape the classifier: a failed stage is recorded as a
/// `StageFailure` and counts as zero confidence.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassificationAttemptError {
    /// The backend could not be reached or rejected the call
    #[error("backend error: {0}")]
    Backend(String),

    /// The backend did not answer in time
    #[error("timed out after {0}s")]
    Timeout(u64),

    /// The backend answered with something that is not a usable label
    #[error("malformed response: {0}")]
    Malformed(String),
}
