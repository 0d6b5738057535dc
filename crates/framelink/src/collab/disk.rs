use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use framelink_frame::{DecodedFrame, FrameTag, ImageDescriptor};
use framelink_session::{CollaboratorError, FrameSink};
use image::ImageFormat;

/// Persists received frames under `<root>/rgb_frames` and
/// `<root>/depth_frames`, numbered in arrival order.
#[derive(Debug)]
pub struct DiskSink {
    root: PathBuf,
    raw_samples: bool,
    saved: u64,
}

impl DiskSink {
    /// `raw_samples` selects how payloads are interpreted: descriptor samples
    /// are re-encoded as PNG, anything else is written as received.
    pub fn new(root: impl Into<PathBuf>, raw_samples: bool) -> io::Result<Self> {
        let root = root.into();
        for tag in FrameTag::ALL {
            fs::create_dir_all(root.join(folder(tag)))?;
        }
        Ok(Self {
            root,
            raw_samples,
            saved: 0,
        })
    }

    pub fn saved(&self) -> u64 {
        self.saved
    }

    /// Write one frame and return where it went.
    pub fn save(&mut self, frame: &DecodedFrame) -> Result<PathBuf, CollaboratorError> {
        let dir = self.root.join(folder(frame.tag));
        let stem = format!("frame_{:06}", self.saved + 1);

        let path = match (self.raw_samples, frame.image) {
            (true, Some(info)) => {
                let descriptor = ImageDescriptor::new(frame.tag, info, frame.payload.clone())?;
                match descriptor.to_image() {
                    Some(image) => {
                        let path = dir.join(format!("{stem}.png"));
                        image.save_with_format(&path, ImageFormat::Png)?;
                        path
                    }
                    None => write_bytes(&dir, &stem, "raw", &frame.payload)?,
                }
            }
            _ => {
                let ext = image::guess_format(&frame.payload)
                    .ok()
                    .and_then(|format| format.extensions_str().first().copied())
                    .unwrap_or("bin");
                write_bytes(&dir, &stem, ext, &frame.payload)?
            }
        };

        self.saved += 1;
        Ok(path)
    }
}

impl FrameSink for DiskSink {
    fn consume(&mut self, frame: &DecodedFrame) -> Result<(), CollaboratorError> {
        self.save(frame).map(|_| ())
    }
}

fn folder(tag: FrameTag) -> &'static str {
    match tag {
        FrameTag::Rgb => "rgb_frames",
        FrameTag::Depth => "depth_frames",
    }
}

fn write_bytes(dir: &Path, stem: &str, ext: &str, bytes: &[u8]) -> io::Result<PathBuf> {
    let path = dir.join(format!("{stem}.{ext}"));
    fs::write(&path, bytes)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::Bytes;
    use framelink_frame::{DescriptorCodec, PayloadDecoder, PayloadEncoder};
    use image::{DynamicImage, ImageBuffer, Rgb};

    use super::*;

    fn temp_root(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "framelink-disk-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ))
    }

    fn png() -> Bytes {
        let image = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(3, 2, Rgb([9u8, 8, 7])));
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png).unwrap();
        Bytes::from(out.into_inner())
    }

    #[test]
    fn tagged_frames_keep_their_encoding() {
        let root = temp_root("tagged");
        let mut sink = DiskSink::new(&root, false).unwrap();

        let png_path = sink
            .save(&DecodedFrame {
                tag: FrameTag::Rgb,
                payload: png(),
                image: None,
            })
            .unwrap();
        let bin_path = sink
            .save(&DecodedFrame {
                tag: FrameTag::Depth,
                payload: Bytes::from_static(b"abcde"),
                image: None,
            })
            .unwrap();

        assert_eq!(png_path, root.join("rgb_frames").join("frame_000001.png"));
        assert_eq!(bin_path, root.join("depth_frames").join("frame_000002.bin"));
        assert_eq!(fs::read(&bin_path).unwrap(), b"abcde");
        assert_eq!(sink.saved(), 2);
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn descriptor_samples_are_written_as_png() {
        let root = temp_root("descriptor");
        let mut sink = DiskSink::new(&root, true).unwrap();

        let codec = DescriptorCodec::default();
        let wire = codec.encode(FrameTag::Depth, png()).unwrap();
        let frame = codec.decode(None, wire).unwrap();
        let path = sink.save(&frame).unwrap();

        assert_eq!(path.extension().and_then(|ext| ext.to_str()), Some("png"));
        let reloaded = image::open(&path).unwrap();
        assert_eq!((reloaded.width(), reloaded.height()), (3, 2));
        let _ = fs::remove_dir_all(root);
    }
}
