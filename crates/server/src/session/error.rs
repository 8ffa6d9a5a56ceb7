use shared::ProtocolError;
use thiserror::Error;

/// Errors local to one inbound event. They are reported to the sender as an
/// `error_notice` and never change session state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("session event loop has stopped")]
    Closed,
}

impl From<ProtocolError> for SessionError {
    fn from(err: ProtocolError) -> Self {
        Self::Validation(err.to_string())
    }
}
