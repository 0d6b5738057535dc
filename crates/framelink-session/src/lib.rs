//! Sender and receiver sessions for framelink.
//!
//! A sender connects, streams tagged frames, sends the termination signal and
//! waits (bounded) for one result token. A receiver accepts exactly one
//! sender, hands each decoded frame to a [`FrameSink`], and answers the
//! termination signal with the token from a [`ResultProducer`].
//!
//! Both sides are blocking and single-threaded. Stopping a streaming loop is
//! cooperative through [`StopSignal`].

pub mod cancel;
pub mod collab;
pub mod config;
pub mod error;
pub mod receiver;
pub mod sender;
pub mod token;

pub use cancel::StopSignal;
pub use collab::{CollaboratorError, FixedResult, FrameSink, FrameSource, NullSink, ResultProducer};
pub use config::{
    SessionConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_RESULT_LIMIT, DEFAULT_RESULT_TIMEOUT,
};
pub use error::{Result, SessionError};
pub use receiver::{ReceiveReport, Receiver, ReceiverSession, ReceiverState, SessionEnd};
pub use sender::{SenderSession, SenderState, StreamSummary};
pub use token::ResultToken;
