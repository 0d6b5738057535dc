//! Tagged image frame framing over blocking byte streams.
//!
//! Three wire formats share one reader and one writer:
//! - `Legacy`: ASCII `RGB` / `DEPTH` / `STOP` token, 16-byte big-endian length
//! - `Compact`: one discriminator byte, 4-byte big-endian length
//! - `Untagged`: 4-byte big-endian length, zlib-compressed image descriptor
//!
//! Every receive path goes through [`ChunkedReader`], so short reads never
//! reach user code.

pub mod chunked;
pub mod codec;
pub mod descriptor;
pub mod error;
pub mod payload;
pub mod reader;
pub mod tag;
pub mod writer;

pub use chunked::{is_timeout, ChunkedReader, DEFAULT_CHUNK_SIZE};
pub use codec::{
    decode_message, encode_message, Frame, FrameConfig, Message, WireFormat, DEFAULT_MAX_FRAME,
};
pub use descriptor::{ElementType, ImageDescriptor, ImageInfo};
pub use error::{DecodeError, FrameError, Result};
pub use payload::{
    decoder_for, encoder_for, DecodedFrame, DescriptorCodec, Passthrough, PayloadDecoder,
    PayloadEncoder, StillImage,
};
pub use reader::MessageReader;
pub use tag::{Discriminator, FrameTag};
pub use writer::MessageWriter;
