//! Error types for the perftriage engine
//!
//! Each service has its own error enum; `EngineError` gathers them for
//! callers that drive the whole pipeline.

use crate::models::JobError;
use crate::services::{ClassifyError, RecoveryError};
use crate::workflow::GeneratorError;
use thiserror::Error;

/// Engine result type
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Engine error type
#[derive(Debug, Error)]
pub enum EngineError {
    /// Classification rejected its input
    #[error(transparent)]
    Classify(#[from] ClassifyError),

    /// Generator output could not be recovered
    #[error(transparent)]
    Recovery(#[from] RecoveryError),

    /// Suggestion generator failed
    #[error(transparent)]
    Generator(#[from] GeneratorError),

    /// Illegal job state change
    #[error(transparent)]
    Job(#[from] JobError),

    /// perftriage-common error (config, database, I/O, serialization)
    #[error("Common error: {0}")]
    Common(#[from] perftriage_common::Error),

    /// Input document did not parse
    #[error("Invalid input: {0}")]
    Input(#[from] serde_json::Error),
}

impl EngineError {
    /// Process exit code for the CLI
    ///
    /// 2 for bad input or configuration, 1 for everything else.
    pub fn exit_code(&self) -> i32 {
        use perftriage_common::Error as CommonError;

        match self {
            EngineError::Classify(_) | EngineError::Recovery(_) | EngineError::Input(_) => 2,
            EngineError::Common(CommonError::Config(_))
            | EngineError::Common(CommonError::Toml(_))
            | EngineError::Common(CommonError::InvalidInput(_)) => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(EngineError::from(ClassifyError::EmptyInput).exit_code(), 2);
        assert_eq!(
            EngineError::from(perftriage_common::Error::Config("bad".into())).exit_code(),
            2
        );
        assert_eq!(
            EngineError::from(perftriage_common::Error::NotFound("x".into())).exit_code(),
            1
        );
    }

    #[test]
    fn test_messages_pass_through() {
        let err = EngineError::from(ClassifyError::EmptyInput);
        assert_eq!(err.to_string(), "No measurement records to classify");
    }
}
