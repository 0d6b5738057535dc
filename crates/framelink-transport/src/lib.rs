//! Blocking TCP stream transport.
//!
//! This is the lowest layer of framelink. A receiver binds a
//! [`TcpTransport`] and accepts one [`NetStream`]; a sender connects one.
//! Everything else builds on `Read + Write + StreamControl`.

pub mod error;
pub mod tcp;
pub mod traits;

pub use error::{Result, TransportError};
pub use tcp::TcpTransport;
pub use traits::{NetStream, StreamControl};
