use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use crate::error::Result;

/// Socket-level controls a session needs beyond `Read + Write`.
///
/// Implemented for [`NetStream`] and the std stream types so sessions can run
/// over a real socket, a `UnixStream::pair()` or an in-memory fake.
pub trait StreamControl {
    /// Shut down the read half, write half, or both.
    fn shutdown(&self, how: Shutdown) -> Result<()>;

    /// Set the timeout applied to blocking reads (`None` blocks forever).
    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()>;

    /// Set the timeout applied to blocking writes (`None` blocks forever).
    fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()>;
}

/// A connected stream, implementing Read + Write.
///
/// This is the I/O type returned by [`crate::TcpTransport`] operations.
pub struct NetStream {
    inner: TcpStream,
    peer: Option<SocketAddr>,
}

impl NetStream {
    pub(crate) fn from_tcp(inner: TcpStream) -> Self {
        let peer = inner.peer_addr().ok();
        Self { inner, peer }
    }

    /// Address of the connected peer, when the OS still reports it.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Disable Nagle's algorithm so small discriminators are not delayed.
    pub fn set_nodelay(&self, nodelay: bool) -> Result<()> {
        self.inner.set_nodelay(nodelay).map_err(Into::into)
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        let cloned = self.inner.try_clone()?;
        Ok(Self {
            inner: cloned,
            peer: self.peer,
        })
    }
}

impl Read for NetStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for NetStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl StreamControl for NetStream {
    fn shutdown(&self, how: Shutdown) -> Result<()> {
        self.inner.shutdown(how).map_err(Into::into)
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout).map_err(Into::into)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_write_timeout(timeout).map_err(Into::into)
    }
}

impl StreamControl for TcpStream {
    fn shutdown(&self, how: Shutdown) -> Result<()> {
        TcpStream::shutdown(self, how).map_err(Into::into)
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        TcpStream::set_read_timeout(self, timeout).map_err(Into::into)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        TcpStream::set_write_timeout(self, timeout).map_err(Into::into)
    }
}

#[cfg(unix)]
impl StreamControl for std::os::unix::net::UnixStream {
    fn shutdown(&self, how: Shutdown) -> Result<()> {
        std::os::unix::net::UnixStream::shutdown(self, how).map_err(Into::into)
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        std::os::unix::net::UnixStream::set_read_timeout(self, timeout).map_err(Into::into)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        std::os::unix::net::UnixStream::set_write_timeout(self, timeout).map_err(Into::into)
    }
}

impl std::fmt::Debug for NetStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetStream")
            .field("type", &"tcp")
            .field("peer", &self.peer)
            .finish()
    }
}
