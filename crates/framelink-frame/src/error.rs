use crate::codec::WireFormat;

/// A payload that did not parse as the expected encoded form.
///
/// Carries the raw byte length that was consumed from the stream, so the
/// caller can report it and keep going.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to decode {len}-byte payload: {reason}")]
pub struct DecodeError {
    /// Raw payload length consumed.
    pub len: usize,
    /// Human-readable cause.
    pub reason: String,
}

impl DecodeError {
    pub fn new(len: usize, reason: impl Into<String>) -> Self {
        Self {
            len,
            reason: reason.into(),
        }
    }
}

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The discriminator is not one the active wire format recognizes.
    #[error("unknown discriminator {discriminator:02x?}")]
    UnknownTag { discriminator: Vec<u8> },

    /// The declared length exceeds the configured maximum frame size.
    #[error("frame too large ({declared} bytes declared, max {max})")]
    OversizeFrame { declared: u128, max: usize },

    /// The payload could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The message cannot be represented in the active wire format.
    #[error("message not supported by {format} wire format: {reason}")]
    Unsupported {
        format: &'static str,
        reason: &'static str,
    },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete message was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// Whether the read position is still known after this error, i.e. the
    /// session may skip the current frame and continue.
    ///
    /// An oversize length is only skippable when a discriminator follows the
    /// payload; the untagged format cannot resynchronize.
    pub fn is_recoverable(&self, format: WireFormat) -> bool {
        match self {
            FrameError::Decode(_) => true,
            FrameError::OversizeFrame { .. } => format.has_result_exchange(),
            _ => false,
        }
    }
}

impl From<framelink_transport::TransportError> for FrameError {
    fn from(err: framelink_transport::TransportError) -> Self {
        match err {
            framelink_transport::TransportError::Io(io)
            | framelink_transport::TransportError::Accept(io) => FrameError::Io(io),
            framelink_transport::TransportError::Bind { source, .. }
            | framelink_transport::TransportError::Connect { source, .. }
            | framelink_transport::TransportError::Resolve { source, .. } => FrameError::Io(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverability_depends_on_format() {
        let oversize = FrameError::OversizeFrame {
            declared: 1 << 40,
            max: 1024,
        };
        assert!(oversize.is_recoverable(WireFormat::Legacy));
        assert!(oversize.is_recoverable(WireFormat::Compact));
        assert!(!oversize.is_recoverable(WireFormat::Untagged));

        let decode = FrameError::Decode(DecodeError::new(5, "not an image"));
        assert!(decode.is_recoverable(WireFormat::Untagged));

        let unknown = FrameError::UnknownTag {
            discriminator: b"X".to_vec(),
        };
        assert!(!unknown.is_recoverable(WireFormat::Legacy));
        assert!(!FrameError::ConnectionClosed.is_recoverable(WireFormat::Compact));
    }
}
