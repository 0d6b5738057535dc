//! Versioned image descriptor carried by the untagged wire format.
//!
//! Layout (big-endian), deflated with zlib before framing:
//! ```text
//! ┌────────┬─────────┬─────┬─────────┬──────────┬───────┬────────┬──────────┬──────┐
//! │ "FLID" │ version │ tag │ element │ channels │ width │ height │ data_len │ data │
//! │ 4B     │ 1B      │ 1B  │ 1B      │ 1B       │ 4B    │ 4B     │ 4B       │      │
//! └────────┴─────────┴─────┴─────────┴──────────┴───────┴────────┴──────────┴──────┘
//! ```
//! `data_len` must equal `width * height * channels * element size`.
//! Multi-byte samples are big-endian.

use std::io::{Read, Write};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{DynamicImage, ImageBuffer, Luma, LumaA, Rgb, Rgba};

use crate::error::DecodeError;
use crate::tag::FrameTag;

/// Descriptor magic: "FLID".
pub const DESCRIPTOR_MAGIC: [u8; 4] = *b"FLID";

/// Current descriptor schema version.
pub const DESCRIPTOR_VERSION: u8 = 1;

/// Fixed header size before `data`.
pub const DESCRIPTOR_HEADER_SIZE: usize = 20;

/// Sample type of an image's channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    U8,
    U16,
    F32,
}

impl ElementType {
    /// Size of one sample in bytes.
    pub fn size(self) -> usize {
        match self {
            ElementType::U8 => 1,
            ElementType::U16 => 2,
            ElementType::F32 => 4,
        }
    }

    /// Wire code: the sample size.
    pub fn code(self) -> u8 {
        self.size() as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(ElementType::U8),
            2 => Some(ElementType::U16),
            4 => Some(ElementType::F32),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ElementType::U8 => "u8",
            ElementType::U16 => "u16",
            ElementType::F32 => "f32",
        }
    }
}

/// Shape of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub element: ElementType,
}

impl ImageInfo {
    /// Byte length of the raw samples for this shape, if it fits in `usize`.
    pub fn data_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(usize::from(self.channels))?
            .checked_mul(self.element.size())
    }

    /// Shape of an image decoded by the `image` crate.
    pub fn from_image(image: &DynamicImage) -> Option<Self> {
        let color = image.color();
        let channels = color.channel_count();
        if channels == 0 {
            return None;
        }
        let element = ElementType::from_code(color.bytes_per_pixel() / channels)?;
        Some(Self {
            width: image.width(),
            height: image.height(),
            channels,
            element,
        })
    }
}

/// An uncompressed image with an explicit, versioned shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDescriptor {
    pub tag: FrameTag,
    pub info: ImageInfo,
    pub data: Bytes,
}

impl ImageDescriptor {
    /// Build a descriptor, checking that `data` matches the declared shape.
    pub fn new(tag: FrameTag, info: ImageInfo, data: impl Into<Bytes>) -> Result<Self, DecodeError> {
        let data = data.into();
        validate_shape(&info, data.len())?;
        Ok(Self { tag, info, data })
    }

    /// Convert a decoded still image to raw big-endian samples.
    pub fn from_image(tag: FrameTag, image: DynamicImage) -> Result<Self, DecodeError> {
        let (width, height) = (image.width(), image.height());
        let (channels, element, data): (u8, ElementType, Vec<u8>) = match image {
            DynamicImage::ImageLuma8(buf) => (1, ElementType::U8, buf.into_raw()),
            DynamicImage::ImageLumaA8(buf) => (2, ElementType::U8, buf.into_raw()),
            DynamicImage::ImageRgb8(buf) => (3, ElementType::U8, buf.into_raw()),
            DynamicImage::ImageRgba8(buf) => (4, ElementType::U8, buf.into_raw()),
            DynamicImage::ImageLuma16(buf) => (1, ElementType::U16, u16_be(buf.as_raw())),
            DynamicImage::ImageLumaA16(buf) => (2, ElementType::U16, u16_be(buf.as_raw())),
            DynamicImage::ImageRgb16(buf) => (3, ElementType::U16, u16_be(buf.as_raw())),
            DynamicImage::ImageRgba16(buf) => (4, ElementType::U16, u16_be(buf.as_raw())),
            DynamicImage::ImageRgb32F(buf) => (3, ElementType::F32, f32_be(buf.as_raw())),
            DynamicImage::ImageRgba32F(buf) => (4, ElementType::F32, f32_be(buf.as_raw())),
            other => (3, ElementType::U8, other.to_rgb8().into_raw()),
        };

        Self::new(
            tag,
            ImageInfo {
                width,
                height,
                channels,
                element,
            },
            data,
        )
    }

    /// Rebuild an `image` buffer for saving or display.
    ///
    /// Returns `None` for layouts the `image` crate has no buffer type for.
    pub fn to_image(&self) -> Option<DynamicImage> {
        let ImageInfo {
            width,
            height,
            channels,
            element,
        } = self.info;
        let raw = self.data.to_vec();
        match (element, channels) {
            (ElementType::U8, 1) => {
                ImageBuffer::<Luma<u8>, _>::from_raw(width, height, raw).map(DynamicImage::from)
            }
            (ElementType::U8, 2) => {
                ImageBuffer::<LumaA<u8>, _>::from_raw(width, height, raw).map(DynamicImage::from)
            }
            (ElementType::U8, 3) => {
                ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, raw).map(DynamicImage::from)
            }
            (ElementType::U8, 4) => {
                ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, raw).map(DynamicImage::from)
            }
            (ElementType::U16, 1) => {
                ImageBuffer::<Luma<u16>, _>::from_raw(width, height, u16_from_be(&raw))
                    .map(DynamicImage::from)
            }
            (ElementType::U16, 3) => {
                ImageBuffer::<Rgb<u16>, _>::from_raw(width, height, u16_from_be(&raw))
                    .map(DynamicImage::from)
            }
            _ => None,
        }
    }

    /// Serialize header and samples (uncompressed).
    ///
    /// Fails when the samples do not fit the 4-byte `data_len` field, which
    /// only happens for descriptors built without [`ImageDescriptor::new`].
    pub fn to_bytes(&self) -> Result<Bytes, DecodeError> {
        let data_len = u32::try_from(self.data.len()).map_err(|_| {
            DecodeError::new(self.data.len(), "descriptor data exceeds the 4-byte length field")
        })?;
        let mut buf = BytesMut::with_capacity(DESCRIPTOR_HEADER_SIZE + self.data.len());
        buf.put_slice(&DESCRIPTOR_MAGIC);
        buf.put_u8(DESCRIPTOR_VERSION);
        buf.put_u8(self.tag.byte());
        buf.put_u8(self.info.element.code());
        buf.put_u8(self.info.channels);
        buf.put_u32(self.info.width);
        buf.put_u32(self.info.height);
        buf.put_u32(data_len);
        buf.put_slice(&self.data);
        Ok(buf.freeze())
    }

    /// Parse an uncompressed descriptor. Errors report `bytes.len()`.
    pub fn from_bytes(mut bytes: Bytes) -> Result<Self, DecodeError> {
        let len = bytes.len();
        if len < DESCRIPTOR_HEADER_SIZE {
            return Err(DecodeError::new(len, "descriptor shorter than its header"));
        }
        if bytes[..4] != DESCRIPTOR_MAGIC {
            return Err(DecodeError::new(len, "bad descriptor magic"));
        }
        bytes.advance(4);

        let version = bytes.get_u8();
        if version != DESCRIPTOR_VERSION {
            return Err(DecodeError::new(
                len,
                format!("unsupported descriptor version {version}"),
            ));
        }
        let tag = match crate::tag::Discriminator::from_byte(bytes.get_u8()) {
            Some(crate::tag::Discriminator::Data(tag)) => tag,
            _ => return Err(DecodeError::new(len, "descriptor tag is not RGB or DEPTH")),
        };
        let element = ElementType::from_code(bytes.get_u8())
            .ok_or_else(|| DecodeError::new(len, "unknown element type"))?;
        let channels = bytes.get_u8();
        let width = bytes.get_u32();
        let height = bytes.get_u32();
        let data_len = bytes.get_u32() as usize;

        if bytes.remaining() != data_len {
            return Err(DecodeError::new(
                len,
                format!(
                    "descriptor declares {data_len} data bytes but carries {}",
                    bytes.remaining()
                ),
            ));
        }

        let info = ImageInfo {
            width,
            height,
            channels,
            element,
        };
        validate_shape(&info, data_len).map_err(|err| DecodeError::new(len, err.reason))?;

        Ok(Self {
            tag,
            info,
            data: bytes,
        })
    }

    /// Serialize and deflate for the wire.
    pub fn compress(&self, level: Compression) -> Result<Bytes, DecodeError> {
        let raw = self.to_bytes()?;
        let mut encoder = ZlibEncoder::new(Vec::with_capacity(raw.len() / 2 + 64), level);
        encoder
            .write_all(&raw)
            .and_then(|()| encoder.finish())
            .map(Bytes::from)
            .map_err(|err| DecodeError::new(raw.len(), format!("deflate failed: {err}")))
    }

    /// Inflate and parse a wire payload. Inflated output above
    /// `max_inflated` bytes is rejected. Errors report `payload.len()`.
    pub fn decompress(payload: &[u8], max_inflated: usize) -> Result<Self, DecodeError> {
        let limit = (max_inflated as u64).saturating_add(1);
        let mut inflated = Vec::new();
        ZlibDecoder::new(payload)
            .take(limit)
            .read_to_end(&mut inflated)
            .map_err(|err| DecodeError::new(payload.len(), format!("inflate failed: {err}")))?;

        if inflated.len() > max_inflated {
            return Err(DecodeError::new(
                payload.len(),
                format!("inflated descriptor exceeds {max_inflated} bytes"),
            ));
        }

        Self::from_bytes(Bytes::from(inflated))
            .map_err(|err| DecodeError::new(payload.len(), err.reason))
    }
}

fn validate_shape(info: &ImageInfo, data_len: usize) -> Result<(), DecodeError> {
    if info.channels == 0 {
        return Err(DecodeError::new(data_len, "descriptor has zero channels"));
    }
    if u32::try_from(data_len).is_err() {
        return Err(DecodeError::new(
            data_len,
            "descriptor data exceeds the 4-byte length field",
        ));
    }
    match info.data_len() {
        Some(expected) if expected == data_len => Ok(()),
        Some(expected) => Err(DecodeError::new(
            data_len,
            format!(
                "{}x{}x{} {} image needs {expected} bytes",
                info.width,
                info.height,
                info.channels,
                info.element.name()
            ),
        )),
        None => Err(DecodeError::new(data_len, "image dimensions overflow")),
    }
}

fn u16_be(samples: &[u16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_be_bytes()).collect()
}

fn f32_be(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_be_bytes()).collect()
}

fn u16_from_be(raw: &[u8]) -> Vec<u16> {
    raw.chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_2x2() -> ImageDescriptor {
        ImageDescriptor::new(
            FrameTag::Depth,
            ImageInfo {
                width: 2,
                height: 2,
                channels: 1,
                element: ElementType::U8,
            },
            vec![0u8, 64, 128, 255],
        )
        .unwrap()
    }

    #[test]
    fn header_layout() {
        let bytes = gray_2x2().to_bytes().unwrap();
        assert_eq!(&bytes[..4], b"FLID");
        assert_eq!(bytes[4], DESCRIPTOR_VERSION);
        assert_eq!(bytes[5], FrameTag::Depth.byte());
        assert_eq!(bytes[6], 1);
        assert_eq!(bytes[7], 1);
        assert_eq!(&bytes[8..12], &[0, 0, 0, 2]);
        assert_eq!(&bytes[16..20], &[0, 0, 0, 4]);
        assert_eq!(bytes.len(), DESCRIPTOR_HEADER_SIZE + 4);
    }

    #[test]
    fn compressed_descriptor_inflates_back() {
        let descriptor = gray_2x2();
        let wire = descriptor.compress(Compression::default()).unwrap();
        let decoded = ImageDescriptor::decompress(&wire, 1024).unwrap();
        assert_eq!(decoded, descriptor);
    }

    #[test]
    fn shape_mismatch_rejected() {
        let result = ImageDescriptor::new(
            FrameTag::Rgb,
            ImageInfo {
                width: 4,
                height: 4,
                channels: 3,
                element: ElementType::U8,
            },
            vec![0u8; 10],
        );
        assert!(result.is_err());
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn shape_beyond_length_field_rejected() {
        let info = ImageInfo {
            width: 65_536,
            height: 65_536,
            channels: 1,
            element: ElementType::U8,
        };
        let err = validate_shape(&info, 1usize << 32).unwrap_err();
        assert!(err.reason.contains("4-byte length field"));
    }

    #[test]
    fn unknown_version_rejected() {
        let mut raw = gray_2x2().to_bytes().unwrap().to_vec();
        raw[4] = 9;
        let err = ImageDescriptor::from_bytes(Bytes::from(raw)).unwrap_err();
        assert!(err.reason.contains("version 9"));
        assert_eq!(err.len, DESCRIPTOR_HEADER_SIZE + 4);
    }

    #[test]
    fn garbage_is_decode_error_with_wire_length() {
        let err = ImageDescriptor::decompress(b"definitely not zlib", 1024).unwrap_err();
        assert_eq!(err.len, 19);
    }

    #[test]
    fn inflate_limit_enforced() {
        let big = ImageDescriptor::new(
            FrameTag::Rgb,
            ImageInfo {
                width: 64,
                height: 64,
                channels: 3,
                element: ElementType::U8,
            },
            vec![0u8; 64 * 64 * 3],
        )
        .unwrap();
        let wire = big.compress(Compression::best()).unwrap();
        assert!(wire.len() < 1024);
        let err = ImageDescriptor::decompress(&wire, 1024).unwrap_err();
        assert!(err.reason.contains("exceeds"));
    }

    #[test]
    fn sixteen_bit_samples_are_big_endian() {
        let image = DynamicImage::ImageLuma16(
            ImageBuffer::<Luma<u16>, _>::from_raw(2, 1, vec![0x0102u16, 0xA0B0]).unwrap(),
        );
        let descriptor = ImageDescriptor::from_image(FrameTag::Depth, image).unwrap();
        assert_eq!(descriptor.info.element, ElementType::U16);
        assert_eq!(descriptor.data.as_ref(), &[0x01, 0x02, 0xA0, 0xB0]);

        let back = descriptor.to_image().unwrap();
        assert_eq!(back.as_luma16().unwrap().as_raw(), &vec![0x0102u16, 0xA0B0]);
    }

    #[test]
    fn rgb_image_converts_both_ways() {
        let image = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(3, 2, Rgb([10u8, 20, 30])));
        let descriptor = ImageDescriptor::from_image(FrameTag::Rgb, image.clone()).unwrap();
        assert_eq!(descriptor.info.channels, 3);
        assert_eq!(descriptor.data.len(), 3 * 2 * 3);
        assert_eq!(descriptor.to_image().unwrap(), image);
    }
}
