use std::fmt;
use std::io;

use framelink_frame::FrameError;
use framelink_session::SessionError;
use framelink_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound | io::ErrorKind::InvalidInput => USAGE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Io(source) => io_error(context, source),
        TransportError::Bind { ref source, .. }
        | TransportError::Connect { ref source, .. }
        | TransportError::Resolve { ref source, .. }
        | TransportError::Accept(ref source) => {
            let code = match source.kind() {
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
                io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
                _ => TRANSPORT_ERROR,
            };
            CliError::new(code, format!("{context}: {err}"))
        }
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::UnknownTag { .. }
        | FrameError::OversizeFrame { .. }
        | FrameError::Decode(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        FrameError::Unsupported { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Transport(err) => transport_error(context, err),
        SessionError::Frame(err) => frame_error(context, err),
        SessionError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        SessionError::Collaborator(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        SessionError::InvalidState { .. } => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn refused_connect_is_transport_error() {
        let err = TransportError::Connect {
            addr: "127.0.0.1:9".to_string(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        assert_eq!(transport_error("connect failed", err).code, TRANSPORT_ERROR);
    }

    #[test]
    fn wire_violations_are_data_invalid() {
        let err = SessionError::Frame(FrameError::UnknownTag {
            discriminator: b"X".to_vec(),
        });
        assert_eq!(session_error("receive failed", err).code, DATA_INVALID);
    }

    #[test]
    fn result_timeout_maps_to_timeout() {
        let err = SessionError::Timeout(Duration::from_secs(30));
        let cli = session_error("result exchange failed", err);
        assert_eq!(cli.code, TIMEOUT);
        assert!(cli.message.starts_with("result exchange failed: "));
    }
}
