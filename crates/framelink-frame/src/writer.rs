use std::io::{ErrorKind, Write};

use bytes::{Bytes, BytesMut};
use framelink_transport::StreamControl;
use tracing::trace;

use crate::codec::{encode_message, Frame, FrameConfig, Message};
use crate::error::{FrameError, Result};
use crate::tag::FrameTag;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete messages to any `Write` stream.
pub struct MessageWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> MessageWriter<T> {
    /// Create a new message writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new message writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Write a complete message (blocking).
    pub fn write_message(&mut self, message: &Message) -> Result<()> {
        let payload_len = match message {
            Message::Frame(frame) => frame.payload.len(),
            Message::Untagged(payload) => payload.len(),
            Message::Stop => 0,
        };
        if payload_len > self.config.max_frame_size {
            return Err(FrameError::OversizeFrame {
                declared: payload_len as u128,
                max: self.config.max_frame_size,
            });
        }

        self.buf.clear();
        encode_message(self.config.format, message, &mut self.buf)?;
        trace!(format = %self.config.format, bytes = self.buf.len(), "writing message");

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Encode and send a tagged frame.
    pub fn send_frame(&mut self, tag: FrameTag, payload: &[u8]) -> Result<()> {
        self.write_message(&Message::Frame(Frame::new(
            tag,
            Bytes::copy_from_slice(payload),
        )))
    }

    /// Send the termination signal.
    pub fn send_stop(&mut self) -> Result<()> {
        self.write_message(&Message::Stop)
    }

    /// Send a length-prefixed payload with no discriminator.
    pub fn send_untagged(&mut self, payload: Bytes) -> Result<()> {
        self.write_message(&Message::Untagged(payload))
    }

    /// Write raw bytes with no framing (the result token).
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.inner.write(&bytes[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current message writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl<T: Write + StreamControl> MessageWriter<T> {
    /// Create a message writer and apply the write timeout from config.
    pub fn with_config_stream(inner: T, config: FrameConfig) -> Result<Self> {
        inner.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use bytes::BytesMut;

    use super::*;
    use crate::codec::{decode_message, WireFormat};

    fn legacy_writer() -> MessageWriter<Cursor<Vec<u8>>> {
        MessageWriter::with_config(
            Cursor::new(Vec::new()),
            FrameConfig::for_format(WireFormat::Legacy),
        )
    }

    #[test]
    fn write_frames_and_stop() {
        let mut writer = legacy_writer();

        writer.send_frame(FrameTag::Rgb, b"one").unwrap();
        writer.send_frame(FrameTag::Depth, b"two").unwrap();
        writer.send_stop().unwrap();

        let mut wire = BytesMut::from(writer.into_inner().into_inner().as_slice());
        let f1 = decode_message(WireFormat::Legacy, &mut wire, usize::MAX)
            .unwrap()
            .unwrap();
        let f2 = decode_message(WireFormat::Legacy, &mut wire, usize::MAX)
            .unwrap()
            .unwrap();
        let f3 = decode_message(WireFormat::Legacy, &mut wire, usize::MAX)
            .unwrap()
            .unwrap();

        assert_eq!(f1, Message::Frame(Frame::new(FrameTag::Rgb, &b"one"[..])));
        assert_eq!(f2, Message::Frame(Frame::new(FrameTag::Depth, &b"two"[..])));
        assert_eq!(f3, Message::Stop);
        assert!(wire.is_empty());
    }

    #[test]
    fn oversize_payload_rejected_before_writing() {
        let cfg = FrameConfig {
            max_frame_size: 4,
            ..FrameConfig::default()
        };
        let mut writer = MessageWriter::with_config(Cursor::new(Vec::<u8>::new()), cfg);

        let err = writer.send_frame(FrameTag::Rgb, b"oversized").unwrap_err();
        assert!(matches!(err, FrameError::OversizeFrame { .. }));
        assert!(writer.get_ref().get_ref().is_empty());
    }

    #[test]
    fn untagged_stop_is_unsupported() {
        let mut writer = MessageWriter::with_config(
            Cursor::new(Vec::<u8>::new()),
            FrameConfig::for_format(WireFormat::Untagged),
        );
        assert!(matches!(
            writer.send_stop(),
            Err(FrameError::Unsupported { .. })
        ));
        writer.send_untagged(Bytes::from_static(b"px")).unwrap();
        assert_eq!(writer.into_inner().into_inner(), vec![0, 0, 0, 2, b'p', b'x']);
    }

    #[test]
    fn write_raw_is_unframed() {
        let mut writer = legacy_writer();
        writer.write_raw(b"0").unwrap();
        assert_eq!(writer.into_inner().into_inner(), b"0");
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = MessageWriter::new(sink);

        writer.send_frame(FrameTag::Depth, b"x").unwrap();

        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn handles_interrupted_write_and_flush() {
        let writer_impl = InterruptedWriteThenFlush {
            wrote_once: false,
            flush_interrupted: false,
            data: Vec::new(),
        };

        let mut writer = MessageWriter::new(writer_impl);
        writer.send_frame(FrameTag::Rgb, b"retry").unwrap();

        let inner = writer.into_inner();
        assert_eq!(inner.data.len(), 3 + 16 + 5);
    }

    #[test]
    fn write_timeout_surfaces_as_io_error() {
        let mut writer = MessageWriter::new(TimedOutWriter);
        let err = writer.send_stop().unwrap_err();
        assert!(matches!(err, FrameError::Io(ref e) if e.kind() == ErrorKind::WouldBlock));
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = MessageWriter::new(ZeroWriter);
        let err = writer.send_frame(FrameTag::Rgb, b"x").unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn applies_write_timeout_for_stream() {
        let (left, _right) = std::os::unix::net::UnixStream::pair().unwrap();
        let cfg = FrameConfig {
            write_timeout: Some(std::time::Duration::from_millis(10)),
            ..FrameConfig::default()
        };

        let writer = MessageWriter::with_config_stream(left, cfg);
        assert!(writer.is_ok());
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct InterruptedWriteThenFlush {
        wrote_once: bool,
        flush_interrupted: bool,
        data: Vec<u8>,
    }

    impl Write for InterruptedWriteThenFlush {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.wrote_once {
                self.wrote_once = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !self.flush_interrupted {
                self.flush_interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            Ok(())
        }
    }

    struct TimedOutWriter;

    impl Write for TimedOutWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
