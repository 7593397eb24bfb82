//! Unified error types for the engine.
//!
//! [`OpsError`] is the common error representation across the workspace.
//! Domain failures that a caller should see as part of a normal response
//! (infeasibility, timeouts) are *not* errors - they travel as
//! [`SolverStatus`](crate::SolverStatus) values inside responses. `OpsError`
//! covers the cases where a request cannot be processed at all: schema
//! violations, unresolvable parameter paths, malformed documents.

use thiserror::Error;

/// Unified error type for engine operations.
#[derive(Error, Debug)]
pub enum OpsError {
    /// Request failed schema/range validation before reaching a solver.
    #[error("validation error: {0}")]
    Validation(String),

    /// A solver could not be constructed or dispatched.
    #[error("solver error: {0}")]
    Solver(String),

    /// A parameter path did not resolve against the request document.
    #[error("parameter path error: {0}")]
    Path(String),

    /// Parsing/deserialization errors.
    #[error("parse error: {0}")]
    Parse(String),

    /// Generic errors (for wrapping external errors).
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using OpsError.
pub type OpsResult<T> = Result<T, OpsError>;

impl From<anyhow::Error> for OpsError {
    fn from(err: anyhow::Error) -> Self {
        OpsError::Other(err.to_string())
    }
}

impl From<String> for OpsError {
    fn from(s: String) -> Self {
        OpsError::Other(s)
    }
}

impl From<&str> for OpsError {
    fn from(s: &str) -> Self {
        OpsError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for OpsError {
    fn from(err: serde_json::Error) -> Self {
        OpsError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OpsError::Validation("duplicate job_id 'J1'".into());
        assert!(err.to_string().contains("validation error"));
        assert!(err.to_string().contains("J1"));
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> OpsResult<()> {
            Err(OpsError::Path("jobs[J9] not found".into()))
        }

        fn outer() -> OpsResult<()> {
            inner()?;
            Ok(())
        }

        assert!(outer().is_err());
    }
}
