use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::error::{FrameError, Result};

/// Default upper bound on a single `read` call.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Reads exact byte counts from a stream with repeated bounded reads.
///
/// This is the only place partial deliveries are handled: every receive path
/// goes through [`ChunkedReader::read_exact`]. A stream that ends early yields
/// [`FrameError::ConnectionClosed`], never a short buffer.
pub struct ChunkedReader<T> {
    inner: T,
    chunk_size: usize,
}

impl<T: Read> ChunkedReader<T> {
    /// Create a reader with the default chunk ceiling.
    pub fn new(inner: T) -> Self {
        Self::with_chunk_size(inner, DEFAULT_CHUNK_SIZE)
    }

    /// Create a reader with an explicit chunk ceiling (minimum 1).
    pub fn with_chunk_size(inner: T, chunk_size: usize) -> Self {
        Self {
            inner,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Read exactly `n` bytes (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` if EOF arrives first.
    pub fn read_exact(&mut self, n: usize) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(n.min(self.chunk_size.max(64)));
        let mut chunk = vec![0u8; self.chunk_size.min(n.max(1))];

        while buf.len() < n {
            let want = (n - buf.len()).min(chunk.len());
            let read = match self.inner.read(&mut chunk[..want]) {
                Ok(read) => read,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                trace!(wanted = n, got = buf.len(), "stream ended mid-read");
                return Err(FrameError::ConnectionClosed);
            }

            buf.extend_from_slice(&chunk[..read]);
        }

        Ok(buf.freeze())
    }

    /// Read and drop `n` bytes without buffering them.
    pub fn discard(&mut self, n: u128) -> Result<()> {
        let mut scratch = vec![0u8; self.chunk_size];
        let mut remaining = n;

        while remaining > 0 {
            let want = remaining.min(scratch.len() as u128) as usize;
            let read = match self.inner.read(&mut scratch[..want]) {
                Ok(read) => read,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            remaining -= read as u128;
        }

        Ok(())
    }

    /// One read of at most `limit` bytes, retried only on `Interrupted`.
    ///
    /// Returns whatever the first successful read delivered, so a peer that
    /// replies and keeps the connection open is not waited on. EOF yields an
    /// empty buffer; a timeout propagates as `FrameError::Io`.
    pub fn read_once(&mut self, limit: usize) -> Result<Bytes> {
        if limit == 0 {
            return Ok(Bytes::new());
        }
        let mut buf = vec![0u8; limit.min(self.chunk_size)];

        loop {
            match self.inner.read(&mut buf) {
                Ok(read) => {
                    buf.truncate(read);
                    return Ok(Bytes::from(buf));
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Current chunk ceiling.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

/// Whether an I/O error is a socket timeout (reported as either kind,
/// depending on platform).
pub fn is_timeout(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    /// Delivers at most `step` bytes per read and records read sizes.
    struct SteppedReader {
        bytes: Vec<u8>,
        pos: usize,
        step: usize,
        largest_request: usize,
    }

    impl SteppedReader {
        fn new(bytes: &[u8], step: usize) -> Self {
            Self {
                bytes: bytes.to_vec(),
                pos: 0,
                step,
                largest_request: 0,
            }
        }
    }

    impl Read for SteppedReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.largest_request = self.largest_request.max(buf.len());
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            let n = (self.bytes.len() - self.pos).min(buf.len()).min(self.step);
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn same_bytes_regardless_of_delivery_size() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();

        let bulk = ChunkedReader::new(Cursor::new(data.clone()))
            .read_exact(data.len())
            .unwrap();

        for step in [1usize, 2, 7, 1000, 4096] {
            let mut reader = ChunkedReader::new(SteppedReader::new(&data, step));
            let got = reader.read_exact(data.len()).unwrap();
            assert_eq!(got, bulk, "step {step}");
        }
    }

    #[test]
    fn reads_never_exceed_chunk_ceiling() {
        let data = vec![7u8; 20_000];
        let mut reader = ChunkedReader::with_chunk_size(SteppedReader::new(&data, usize::MAX), 512);
        reader.read_exact(data.len()).unwrap();
        assert!(reader.get_ref().largest_request <= 512);
    }

    #[test]
    fn does_not_overread_past_request() {
        let mut reader = ChunkedReader::new(Cursor::new(b"abcdefgh".to_vec()));
        assert_eq!(reader.read_exact(3).unwrap().as_ref(), b"abc");
        assert_eq!(reader.read_exact(5).unwrap().as_ref(), b"defgh");
    }

    #[test]
    fn eof_before_complete_is_connection_closed() {
        let mut reader = ChunkedReader::new(SteppedReader::new(b"only-part", 2));
        let err = reader.read_exact(16).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn zero_length_read_needs_no_io() {
        let mut reader = ChunkedReader::new(Cursor::new(Vec::<u8>::new()));
        assert!(reader.read_exact(0).unwrap().is_empty());
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            interrupted: false,
            inner: Cursor::new(b"ok".to_vec()),
        };
        let mut chunked = ChunkedReader::new(reader);
        assert_eq!(chunked.read_exact(2).unwrap().as_ref(), b"ok");
    }

    #[test]
    fn would_block_propagates_io_error() {
        let mut chunked = ChunkedReader::new(AlwaysWouldBlock);
        let err = chunked.read_exact(1).unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::WouldBlock));
    }

    #[test]
    fn discard_skips_without_buffering() {
        let mut data = vec![0xEE; 9000];
        data.extend_from_slice(b"next");
        let mut reader = ChunkedReader::new(SteppedReader::new(&data, 333));
        reader.discard(9000).unwrap();
        assert_eq!(reader.read_exact(4).unwrap().as_ref(), b"next");
    }

    #[test]
    fn discard_reports_early_eof() {
        let mut reader = ChunkedReader::new(Cursor::new(vec![0u8; 10]));
        assert!(matches!(
            reader.discard(0xFFFF_FFFF),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn read_once_returns_first_delivery() {
        let mut reader = ChunkedReader::new(Cursor::new(b"label-7".to_vec()));
        assert_eq!(reader.read_once(1024).unwrap().as_ref(), b"label-7");

        let mut reader = ChunkedReader::new(SteppedReader::new(b"label-7", 3));
        assert_eq!(reader.read_once(1024).unwrap().as_ref(), b"lab");

        let mut reader = ChunkedReader::new(Cursor::new(vec![1u8; 2048]));
        assert_eq!(reader.read_once(1024).unwrap().len(), 1024);

        let mut reader = ChunkedReader::new(Cursor::new(Vec::<u8>::new()));
        assert!(reader.read_once(1024).unwrap().is_empty());
    }

    #[test]
    fn read_once_does_not_wait_for_more() {
        // A second read would time out; the first delivery is enough.
        let reader = DataThenTimeout {
            sent: false,
            data: b"0".to_vec(),
        };
        let mut chunked = ChunkedReader::new(reader);
        assert_eq!(chunked.read_once(1024).unwrap().as_ref(), b"0");

        let mut chunked = ChunkedReader::new(AlwaysWouldBlock);
        assert!(matches!(chunked.read_once(1024), Err(FrameError::Io(_))));
    }

    #[test]
    fn read_once_retries_interrupted() {
        let reader = InterruptedThenData {
            interrupted: false,
            inner: Cursor::new(b"ok".to_vec()),
        };
        let mut chunked = ChunkedReader::new(reader);
        assert_eq!(chunked.read_once(16).unwrap().as_ref(), b"ok");
    }

    struct InterruptedThenData {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }

    struct AlwaysWouldBlock;

    impl Read for AlwaysWouldBlock {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }
    }

    struct DataThenTimeout {
        sent: bool,
        data: Vec<u8>,
    }

    impl Read for DataThenTimeout {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.sent {
                return Err(std::io::Error::from(ErrorKind::TimedOut));
            }
            self.sent = true;
            let n = self.data.len().min(buf.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            Ok(n)
        }
    }
}
