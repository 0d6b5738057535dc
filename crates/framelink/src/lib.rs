//! Tagged image frame streaming over TCP.
//!
//! framelink moves RGB and DEPTH frames from a sender to a receiver over one
//! connection, then the receiver answers a termination signal with a result
//! token.
//!
//! # Crate Structure
//!
//! - [`transport`]: Blocking TCP listener and connector
//! - [`frame`]: Wire formats, chunked reader, payload decoders
//! - [`session`]: Sender and receiver state machines (behind `session` feature)

/// Re-export transport types.
pub mod transport {
    pub use framelink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use framelink_frame::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use framelink_session::*;
}
