use std::io::Read;

use bytes::Bytes;
use framelink_transport::StreamControl;
use tracing::trace;

use crate::chunked::ChunkedReader;
use crate::codec::{check_length, read_length, Frame, FrameConfig, Message, WireFormat};
use crate::error::{FrameError, Result};
use crate::tag::Discriminator;

/// Reads complete messages from any `Read` stream.
///
/// Every read goes through a [`ChunkedReader`], so partial deliveries are
/// invisible to callers. Discriminators are validated before any length is
/// read, and lengths are validated before any payload is read or allocated.
pub struct MessageReader<T> {
    chunked: ChunkedReader<T>,
    config: FrameConfig,
}

impl<T: Read> MessageReader<T> {
    /// Create a new message reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new message reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            chunked: ChunkedReader::with_chunk_size(inner, config.chunk_size),
            config,
        }
    }

    /// Read the next complete message (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached, either
    /// cleanly between messages or in the middle of one.
    pub fn read_message(&mut self) -> Result<Message> {
        match self.config.format {
            WireFormat::Legacy => {
                let discriminator = self.read_legacy_discriminator()?;
                self.read_after_discriminator(discriminator)
            }
            WireFormat::Compact => {
                let first = self.chunked.read_exact(1)?;
                let discriminator =
                    Discriminator::from_byte(first[0]).ok_or_else(|| FrameError::UnknownTag {
                        discriminator: first.to_vec(),
                    })?;
                self.read_after_discriminator(discriminator)
            }
            WireFormat::Untagged => {
                let payload = self.read_length_and_payload()?;
                Ok(Message::Untagged(payload))
            }
        }
    }

    fn read_legacy_discriminator(&mut self) -> Result<Discriminator> {
        let first = self.chunked.read_exact(1)?;
        let token =
            Discriminator::legacy_token_for(first[0]).ok_or_else(|| FrameError::UnknownTag {
                discriminator: first.to_vec(),
            })?;

        let rest = self.chunked.read_exact(token.len() - 1)?;
        let mut seen = first.to_vec();
        seen.extend_from_slice(&rest);

        Discriminator::from_legacy_token(&seen).ok_or(FrameError::UnknownTag { discriminator: seen })
    }

    fn read_after_discriminator(&mut self, discriminator: Discriminator) -> Result<Message> {
        match discriminator {
            Discriminator::Stop => {
                trace!("read termination signal");
                Ok(Message::Stop)
            }
            Discriminator::Data(tag) => {
                let payload = self.read_length_and_payload()?;
                trace!(%tag, len = payload.len(), "read frame");
                Ok(Message::Frame(Frame { tag, payload }))
            }
        }
    }

    fn read_length_and_payload(&mut self) -> Result<Bytes> {
        let field = self.chunked.read_exact(self.config.format.length_width())?;
        let declared = read_length(&field);
        let len = check_length(declared, self.config.max_frame_size)?;
        self.chunked.read_exact(len)
    }

    /// Drop `n` payload bytes, e.g. after an `OversizeFrame` on a tagged
    /// format, so the next read starts at a discriminator again.
    pub fn discard(&mut self, n: u128) -> Result<()> {
        self.chunked.discard(n)
    }

    /// One bounded read with no framing (used for the result token).
    pub fn read_once(&mut self, limit: usize) -> Result<Bytes> {
        self.chunked.read_once(limit)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        self.chunked.get_ref()
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        self.chunked.get_mut()
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.chunked.into_inner()
    }

    /// Current message reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl<T: Read + StreamControl> MessageReader<T> {
    /// Create a message reader and apply the read timeout from config.
    pub fn with_config_stream(inner: T, config: FrameConfig) -> Result<Self> {
        inner.set_read_timeout(config.read_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}
