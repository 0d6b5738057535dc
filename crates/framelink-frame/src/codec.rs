use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::tag::{Discriminator, FrameTag, BYTE_STOP, TOKEN_STOP};

/// Legacy length field width: 16 bytes, big-endian.
pub const LEGACY_LENGTH_WIDTH: usize = 16;

/// Compact and untagged length field width: 4 bytes, big-endian.
pub const SHORT_LENGTH_WIDTH: usize = 4;

/// Default maximum frame payload size: 10 MiB.
pub const DEFAULT_MAX_FRAME: usize = 10 * 1024 * 1024;

/// Selects how messages are laid out on the wire.
///
/// One format is picked per deployment; formats are never mixed within a
/// session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireFormat {
    /// ASCII `RGB`/`DEPTH`/`STOP` tokens, 16-byte length, encoded still image.
    Legacy,
    /// One discriminator byte, 4-byte length, encoded still image.
    Compact,
    /// 4-byte length, deflated image descriptor; no discriminator.
    Untagged,
}

impl WireFormat {
    /// Short name for logs and diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            WireFormat::Legacy => "legacy",
            WireFormat::Compact => "compact",
            WireFormat::Untagged => "untagged",
        }
    }

    /// Whether a session in this format ends with STOP and a result token.
    pub fn has_result_exchange(self) -> bool {
        !matches!(self, WireFormat::Untagged)
    }

    /// Width of the length field in bytes.
    pub fn length_width(self) -> usize {
        match self {
            WireFormat::Legacy => LEGACY_LENGTH_WIDTH,
            WireFormat::Compact | WireFormat::Untagged => SHORT_LENGTH_WIDTH,
        }
    }
}

impl std::fmt::Display for WireFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A tagged unit of opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Which data stream this frame belongs to.
    pub tag: FrameTag,
    /// The encoded payload. Never interpreted by the codec.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(tag: FrameTag, payload: impl Into<Bytes>) -> Self {
        Self {
            tag,
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame in `format`.
    pub fn wire_size(&self, format: WireFormat) -> usize {
        let discriminator = match format {
            WireFormat::Legacy => self.tag.token().len(),
            WireFormat::Compact => 1,
            WireFormat::Untagged => 0,
        };
        discriminator + format.length_width() + self.payload.len()
    }
}

/// One message on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A tagged data frame (legacy and compact formats).
    Frame(Frame),
    /// Termination signal (legacy and compact formats).
    Stop,
    /// A length-prefixed payload with no discriminator (untagged format).
    Untagged(Bytes),
}

/// Encode a message into the wire format.
///
/// Wire formats:
/// ```text
/// legacy:   "RGB" | "DEPTH"  len (16B BE)  payload      "STOP"
/// compact:  0x01 | 0x02      len (4B BE)   payload      0x00
/// untagged:                  len (4B BE)   payload
/// ```
pub fn encode_message(format: WireFormat, message: &Message, dst: &mut BytesMut) -> Result<()> {
    match (format, message) {
        (WireFormat::Legacy, Message::Frame(frame)) => {
            dst.reserve(frame.wire_size(format));
            dst.put_slice(frame.tag.token());
            dst.put_u128(frame.payload.len() as u128);
            dst.put_slice(&frame.payload);
        }
        (WireFormat::Compact, Message::Frame(frame)) => {
            let len = short_length(&frame.payload)?;
            dst.reserve(frame.wire_size(format));
            dst.put_u8(frame.tag.byte());
            dst.put_u32(len);
            dst.put_slice(&frame.payload);
        }
        (WireFormat::Untagged, Message::Untagged(payload)) => {
            let len = short_length(payload)?;
            dst.reserve(SHORT_LENGTH_WIDTH + payload.len());
            dst.put_u32(len);
            dst.put_slice(payload);
        }
        (WireFormat::Legacy, Message::Stop) => dst.put_slice(TOKEN_STOP),
        (WireFormat::Compact, Message::Stop) => dst.put_u8(BYTE_STOP),
        (WireFormat::Untagged, Message::Stop) => {
            return Err(FrameError::Unsupported {
                format: format.name(),
                reason: "termination is a half-close, not a token",
            })
        }
        (WireFormat::Untagged, Message::Frame(_)) => {
            return Err(FrameError::Unsupported {
                format: format.name(),
                reason: "frames must be wrapped in an image descriptor",
            })
        }
        (WireFormat::Legacy | WireFormat::Compact, Message::Untagged(_)) => {
            return Err(FrameError::Unsupported {
                format: format.name(),
                reason: "payloads need a discriminator",
            })
        }
    }
    Ok(())
}

fn short_length(payload: &[u8]) -> Result<u32> {
    u32::try_from(payload.len()).map_err(|_| FrameError::OversizeFrame {
        declared: payload.len() as u128,
        max: u32::MAX as usize,
    })
}

/// Decode a message from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete message yet.
/// On success, consumes the message bytes from the buffer. Discriminator and
/// length are validated as soon as their bytes are present, before any
/// payload is awaited.
pub fn decode_message(
    format: WireFormat,
    src: &mut BytesMut,
    max_frame: usize,
) -> Result<Option<Message>> {
    let (discriminator, header_len) = match format {
        WireFormat::Legacy => {
            let Some(&first) = src.first() else {
                return Ok(None);
            };
            let token = Discriminator::legacy_token_for(first).ok_or_else(|| {
                FrameError::UnknownTag {
                    discriminator: vec![first],
                }
            })?;
            let seen = src.len().min(token.len());
            if src[..seen] != token[..seen] {
                return Err(FrameError::UnknownTag {
                    discriminator: src[..seen].to_vec(),
                });
            }
            if seen < token.len() {
                return Ok(None); // Need more data
            }
            let discriminator = Discriminator::from_legacy_token(token).ok_or_else(|| {
                FrameError::UnknownTag {
                    discriminator: token.to_vec(),
                }
            })?;
            (Some(discriminator), token.len())
        }
        WireFormat::Compact => {
            let Some(&first) = src.first() else {
                return Ok(None);
            };
            let discriminator = Discriminator::from_byte(first).ok_or_else(|| {
                FrameError::UnknownTag {
                    discriminator: vec![first],
                }
            })?;
            (Some(discriminator), 1)
        }
        WireFormat::Untagged => (None, 0),
    };

    if discriminator == Some(Discriminator::Stop) {
        src.advance(header_len);
        return Ok(Some(Message::Stop));
    }

    let width = format.length_width();
    if src.len() < header_len + width {
        return Ok(None); // Need more data
    }
    let declared = read_length(&src[header_len..header_len + width]);
    let payload_len = check_length(declared, max_frame)?;

    let total = header_len + width + payload_len;
    if src.len() < total {
        return Ok(None); // Need more data
    }

    src.advance(header_len + width);
    let payload = src.split_to(payload_len).freeze();

    Ok(Some(match discriminator {
        Some(Discriminator::Data(tag)) => Message::Frame(Frame { tag, payload }),
        _ => Message::Untagged(payload),
    }))
}

/// Interpret a 4- or 16-byte big-endian length field.
pub(crate) fn read_length(mut field: &[u8]) -> u128 {
    match field.len() {
        LEGACY_LENGTH_WIDTH => field.get_u128(),
        SHORT_LENGTH_WIDTH => u128::from(field.get_u32()),
        _ => field.iter().fold(0u128, |acc, b| (acc << 8) | u128::from(*b)),
    }
}

/// Reject lengths above `max_frame` before anything is allocated.
pub(crate) fn check_length(declared: u128, max_frame: usize) -> Result<usize> {
    if declared > max_frame as u128 {
        return Err(FrameError::OversizeFrame {
            declared,
            max: max_frame,
        });
    }
    Ok(declared as usize)
}

/// Configuration for the frame reader and writer.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Active wire format.
    pub format: WireFormat,
    /// Maximum payload size in bytes. Default: 10 MiB.
    pub max_frame_size: usize,
    /// Upper bound on a single read from the stream. Default: 4096.
    pub chunk_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            format: WireFormat::Legacy,
            max_frame_size: DEFAULT_MAX_FRAME,
            chunk_size: crate::chunked::DEFAULT_CHUNK_SIZE,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

impl FrameConfig {
    /// Default configuration for `format`.
    pub fn for_format(format: WireFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }
}
