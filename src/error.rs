use thiserror::Error;

use crate::policy::Operation;

/// Local, recoverable failures raised by the grading core, the access policy
/// and the directory. None of these are fatal to the daemon.
#[derive(Debug, Error)]
pub enum SisError {
    #[error("invalid assessment: {0}")]
    InvalidAssessment(String),

    #[error("access denied for {operation}")]
    AccessDenied { operation: Operation },

    #[error("invalid actor: {0}")]
    InvalidActor(String),

    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Db(#[from] rusqlite::Error),
}

impl SisError {
    /// Stable wire code used in the IPC error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            SisError::InvalidAssessment(_) => "invalid_assessment",
            SisError::AccessDenied { .. } => "access_denied",
            SisError::InvalidActor(_) => "invalid_actor",
            SisError::UnknownOperation(_) => "unknown_operation",
            SisError::NotFound(_) => "not_found",
            SisError::Db(_) => "db_query_failed",
        }
    }
}
