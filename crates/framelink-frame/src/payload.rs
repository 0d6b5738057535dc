//! Payload interpretation on either side of the framing codec.
//!
//! The codec treats payloads as opaque bytes. A [`PayloadDecoder`] turns a
//! received payload into a [`DecodedFrame`] for the consumer, and a
//! [`PayloadEncoder`] prepares a source image for the wire.

use bytes::Bytes;
use flate2::Compression;
use tracing::debug;

use crate::codec::WireFormat;
use crate::descriptor::{ImageDescriptor, ImageInfo, DESCRIPTOR_HEADER_SIZE};
use crate::error::DecodeError;
use crate::tag::FrameTag;

/// A received frame after payload decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub tag: FrameTag,
    /// Bytes handed to the consumer. For descriptor payloads these are the
    /// raw samples, otherwise the payload as received.
    pub payload: Bytes,
    /// Image shape, when the decoder interpreted the payload as an image.
    pub image: Option<ImageInfo>,
}

impl DecodedFrame {
    /// A frame with no content (zero-length payload).
    pub fn empty(tag: FrameTag) -> Self {
        Self {
            tag,
            payload: Bytes::new(),
            image: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Turns a received payload into a [`DecodedFrame`].
///
/// `tag` is the wire discriminator for tagged formats and `None` for the
/// untagged format, where the tag travels inside the payload.
pub trait PayloadDecoder: Send {
    fn decode(&self, tag: Option<FrameTag>, payload: Bytes) -> Result<DecodedFrame, DecodeError>;
}

/// Prepares a source payload for transmission.
pub trait PayloadEncoder: Send {
    fn encode(&self, tag: FrameTag, payload: Bytes) -> Result<Bytes, DecodeError>;
}

/// Opaque bytes in both directions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl PayloadDecoder for Passthrough {
    fn decode(&self, tag: Option<FrameTag>, payload: Bytes) -> Result<DecodedFrame, DecodeError> {
        let tag = tag.ok_or_else(|| {
            DecodeError::new(payload.len(), "untagged payload has no tag to pass through")
        })?;
        Ok(DecodedFrame {
            tag,
            payload,
            image: None,
        })
    }
}

impl PayloadEncoder for Passthrough {
    fn encode(&self, _tag: FrameTag, payload: Bytes) -> Result<Bytes, DecodeError> {
        Ok(payload)
    }
}

/// Validates tagged payloads as encoded still images (PNG or JPEG).
///
/// The payload is forwarded untouched; decoding only proves it is an image
/// and reports its shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct StillImage;

impl PayloadDecoder for StillImage {
    fn decode(&self, tag: Option<FrameTag>, payload: Bytes) -> Result<DecodedFrame, DecodeError> {
        let len = payload.len();
        let tag = tag.ok_or_else(|| DecodeError::new(len, "still image payload needs a tag"))?;
        if payload.is_empty() {
            return Ok(DecodedFrame::empty(tag));
        }

        let image = decode_still(&payload)?;
        let info = ImageInfo::from_image(&image)
            .ok_or_else(|| DecodeError::new(len, "unsupported pixel layout"))?;
        debug!(%tag, width = info.width, height = info.height, "validated still image");

        Ok(DecodedFrame {
            tag,
            payload,
            image: Some(info),
        })
    }
}

/// zlib-compressed [`ImageDescriptor`] payloads (untagged format).
#[derive(Debug, Clone, Copy)]
pub struct DescriptorCodec {
    level: Compression,
    max_inflated: usize,
}

impl DescriptorCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            level: Compression::default(),
            max_inflated: max_frame_size.saturating_add(DESCRIPTOR_HEADER_SIZE),
        }
    }

    pub fn with_level(mut self, level: Compression) -> Self {
        self.level = level;
        self
    }
}

impl Default for DescriptorCodec {
    fn default() -> Self {
        Self::new(crate::codec::DEFAULT_MAX_FRAME)
    }
}

impl PayloadDecoder for DescriptorCodec {
    fn decode(&self, tag: Option<FrameTag>, payload: Bytes) -> Result<DecodedFrame, DecodeError> {
        if payload.is_empty() {
            return match tag {
                Some(tag) => Ok(DecodedFrame::empty(tag)),
                None => Err(DecodeError::new(0, "empty descriptor payload")),
            };
        }

        let descriptor = ImageDescriptor::decompress(&payload, self.max_inflated)?;
        if let Some(expected) = tag {
            if expected != descriptor.tag {
                return Err(DecodeError::new(
                    payload.len(),
                    format!("descriptor tag {} under {expected} discriminator", descriptor.tag),
                ));
            }
        }

        Ok(DecodedFrame {
            tag: descriptor.tag,
            payload: descriptor.data,
            image: Some(descriptor.info),
        })
    }
}

impl PayloadEncoder for DescriptorCodec {
    /// Decode the still image, convert it to a descriptor, deflate it.
    fn encode(&self, tag: FrameTag, payload: Bytes) -> Result<Bytes, DecodeError> {
        if payload.is_empty() {
            return Err(DecodeError::new(0, "empty image cannot be sent untagged"));
        }
        let image = decode_still(&payload)?;
        let descriptor = ImageDescriptor::from_image(tag, image)
            .map_err(|err| DecodeError::new(payload.len(), err.reason))?;
        descriptor
            .compress(self.level)
            .map_err(|err| DecodeError::new(payload.len(), err.reason))
    }
}

/// Decoder matching a wire format: descriptors for untagged, still-image
/// validation for tagged formats, or passthrough when `raw_payloads` is set.
pub fn decoder_for(
    format: WireFormat,
    raw_payloads: bool,
    max_frame_size: usize,
) -> Box<dyn PayloadDecoder> {
    match format {
        WireFormat::Untagged => Box::new(DescriptorCodec::new(max_frame_size)),
        _ if raw_payloads => Box::new(Passthrough),
        _ => Box::new(StillImage),
    }
}

/// Encoder matching a wire format.
pub fn encoder_for(format: WireFormat, max_frame_size: usize) -> Box<dyn PayloadEncoder> {
    match format {
        WireFormat::Untagged => Box::new(DescriptorCodec::new(max_frame_size)),
        _ => Box::new(Passthrough),
    }
}

fn decode_still(payload: &[u8]) -> Result<image::DynamicImage, DecodeError> {
    let format = image::guess_format(payload)
        .map_err(|err| DecodeError::new(payload.len(), format!("not a still image: {err}")))?;
    image::load_from_memory_with_format(payload, format)
        .map_err(|err| DecodeError::new(payload.len(), format!("{format:?} decode failed: {err}")))
}
