//! Capability traits for the collaborators a session drives.
//!
//! Image acquisition, frame consumption and the result computation live
//! outside the transport. Sessions only see these traits, so tests can use
//! closures and in-memory fakes.

use bytes::Bytes;
use framelink_frame::{DecodedFrame, FrameTag};

/// Error type returned by collaborators.
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

/// Produces encoded still images for the sender, polled once per tag per
/// streaming iteration.
pub trait FrameSource {
    /// Next payload for `tag`, or `None` when there is nothing to send.
    fn next_frame(&mut self, tag: FrameTag) -> Result<Option<Bytes>, CollaboratorError>;
}

/// Consumes frames on the receiver, once per successfully decoded frame.
pub trait FrameSink {
    fn consume(&mut self, frame: &DecodedFrame) -> Result<(), CollaboratorError>;
}

/// Computes the result token, once per receiver session.
pub trait ResultProducer {
    fn compute_result(&mut self) -> Result<Bytes, CollaboratorError>;
}

impl<F> FrameSource for F
where
    F: FnMut(FrameTag) -> Option<Bytes>,
{
    fn next_frame(&mut self, tag: FrameTag) -> Result<Option<Bytes>, CollaboratorError> {
        Ok(self(tag))
    }
}

impl<F> FrameSink for F
where
    F: FnMut(&DecodedFrame),
{
    fn consume(&mut self, frame: &DecodedFrame) -> Result<(), CollaboratorError> {
        self(frame);
        Ok(())
    }
}

impl<F> ResultProducer for F
where
    F: FnMut() -> Bytes,
{
    fn compute_result(&mut self) -> Result<Bytes, CollaboratorError> {
        Ok(self())
    }
}

/// Always answers with the same token.
#[derive(Debug, Clone)]
pub struct FixedResult(pub Bytes);

impl FixedResult {
    pub fn new(token: impl Into<Bytes>) -> Self {
        Self(token.into())
    }
}

impl ResultProducer for FixedResult {
    fn compute_result(&mut self) -> Result<Bytes, CollaboratorError> {
        Ok(self.0.clone())
    }
}

/// Discards every frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn consume(&mut self, _frame: &DecodedFrame) -> Result<(), CollaboratorError> {
        Ok(())
    }
}
