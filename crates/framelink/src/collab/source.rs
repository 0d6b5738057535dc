use std::fs;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use framelink_frame::FrameTag;
use framelink_session::{CollaboratorError, FrameSource};

use crate::exit::{CliError, CliResult, USAGE};

/// Reads one image file per tag on every poll, so a file replaced between
/// iterations is picked up.
#[derive(Debug, Clone)]
pub struct FileSource {
    rgb: Option<PathBuf>,
    depth: Option<PathBuf>,
}

impl FileSource {
    pub fn new(rgb: Option<PathBuf>, depth: Option<PathBuf>) -> CliResult<Self> {
        if rgb.is_none() && depth.is_none() {
            return Err(CliError::new(USAGE, "at least one of --rgb or --depth is required"));
        }
        for path in rgb.iter().chain(depth.iter()) {
            if !path.is_file() {
                return Err(CliError::new(
                    USAGE,
                    format!("{} is not a readable file", path.display()),
                ));
            }
        }
        Ok(Self { rgb, depth })
    }

    fn path_for(&self, tag: FrameTag) -> Option<&Path> {
        match tag {
            FrameTag::Rgb => self.rgb.as_deref(),
            FrameTag::Depth => self.depth.as_deref(),
        }
    }
}

impl FrameSource for FileSource {
    fn next_frame(&mut self, tag: FrameTag) -> Result<Option<Bytes>, CollaboratorError> {
        let Some(path) = self.path_for(tag) else {
            return Ok(None);
        };
        let bytes = fs::read(path)
            .map_err(|err| format!("failed reading {} frame {}: {err}", tag, path.display()))?;
        Ok(Some(Bytes::from(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(tag: &str, contents: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "framelink-src-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::write(&path, contents).expect("temp file should be writable");
        path
    }

    #[test]
    fn polls_only_configured_tags() {
        let rgb = temp_file("rgb", b"rgb-bytes");
        let mut source = FileSource::new(Some(rgb.clone()), None).unwrap();

        assert_eq!(
            source.next_frame(FrameTag::Rgb).unwrap(),
            Some(Bytes::from_static(b"rgb-bytes"))
        );
        assert_eq!(source.next_frame(FrameTag::Depth).unwrap(), None);

        std::fs::write(&rgb, b"replaced").unwrap();
        assert_eq!(
            source.next_frame(FrameTag::Rgb).unwrap(),
            Some(Bytes::from_static(b"replaced"))
        );
        let _ = std::fs::remove_file(rgb);
    }

    #[test]
    fn rejects_missing_inputs() {
        assert!(FileSource::new(None, None).is_err());
        let err = FileSource::new(Some(PathBuf::from("/nonexistent/rgb.jpg")), None).unwrap_err();
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn vanished_file_is_collaborator_error() {
        let depth = temp_file("depth", b"d");
        let mut source = FileSource::new(None, Some(depth.clone())).unwrap();
        std::fs::remove_file(&depth).unwrap();

        let err = source.next_frame(FrameTag::Depth).unwrap_err();
        assert!(err.to_string().contains("DEPTH"));
    }
}
