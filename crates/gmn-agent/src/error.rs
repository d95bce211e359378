//! Agent loop error types

use thiserror::Error;

use gmn_backend::BackendError;

use crate::SessionError;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("empty prompt")]
    EmptyPrompt,

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("max tool iterations ({0}) reached")]
    IterationLimitExceeded(usize),

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Session(#[from] SessionError),
}
