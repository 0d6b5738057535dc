use std::time::Duration;

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error (bind, accept, connect).
    #[error("transport error: {0}")]
    Transport(#[from] framelink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] framelink_frame::FrameError),

    /// Operation invoked outside its legal state.
    #[error("{op} not allowed in {state} state")]
    InvalidState {
        op: &'static str,
        state: &'static str,
    },

    /// No result arrived within the configured bound.
    #[error("no result within {0:?}")]
    Timeout(Duration),

    /// An external collaborator (source, sink, result producer) failed.
    #[error("collaborator failed: {0}")]
    Collaborator(String),
}

impl SessionError {
    /// Whether the error came from opening the connection.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, SessionError::Transport(err) if err.is_connection_error())
    }
}

impl From<framelink_frame::DecodeError> for SessionError {
    fn from(err: framelink_frame::DecodeError) -> Self {
        SessionError::Frame(err.into())
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
