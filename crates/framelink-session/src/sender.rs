use std::io::{Read, Write};
use std::net::Shutdown;

use bytes::Bytes;
use framelink_frame::{
    encoder_for, is_timeout, Frame, FrameError, FrameTag, Message, MessageReader, MessageWriter,
    PayloadEncoder, WireFormat,
};
use framelink_transport::{NetStream, StreamControl, TcpTransport};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cancel::StopSignal;
use crate::collab::FrameSource;
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::token::ResultToken;

/// Sender lifecycle.
///
/// `Connecting → Streaming → Terminating → AwaitingResult → Closed`. The
/// untagged format skips `AwaitingResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    Connecting,
    Streaming,
    Terminating,
    AwaitingResult,
    Closed,
}

impl SenderState {
    pub fn name(self) -> &'static str {
        match self {
            SenderState::Connecting => "connecting",
            SenderState::Streaming => "streaming",
            SenderState::Terminating => "terminating",
            SenderState::AwaitingResult => "awaiting-result",
            SenderState::Closed => "closed",
        }
    }
}

/// Outcome of [`SenderSession::stream_until`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamSummary {
    /// Iterations that sent at least one frame.
    pub iterations: u64,
    pub frames_sent: u64,
    /// Whether the loop ended because the stop signal was raised.
    pub stopped: bool,
}

/// Owns the outbound connection of one session.
pub struct SenderSession<R, W> {
    reader: MessageReader<R>,
    writer: MessageWriter<W>,
    encoder: Box<dyn PayloadEncoder>,
    state: SenderState,
    format: WireFormat,
    result_timeout: std::time::Duration,
    result_limit: usize,
    frames_sent: u64,
}

impl SenderSession<NetStream, NetStream> {
    /// Connect to `config.host:config.port` and enter `Streaming`.
    ///
    /// Refusal or timeout is fatal; there is no retry.
    pub fn connect(config: &SessionConfig) -> Result<Self> {
        let stream = TcpTransport::connect(&config.host, config.port, Some(config.connect_timeout))?;
        stream.set_nodelay(true)?;
        let reader_stream = stream.try_clone()?;
        Self::from_parts(reader_stream, stream, config)
    }
}

impl<R, W> SenderSession<R, W>
where
    R: Read + StreamControl,
    W: Write + StreamControl,
{
    /// Build a session over an already-connected stream split into read and
    /// write handles. Applies the streaming timeouts.
    pub fn from_parts(reader: R, writer: W, config: &SessionConfig) -> Result<Self> {
        let frame_config = config.frame_config();
        let reader = MessageReader::with_config_stream(reader, frame_config.clone())?;
        let writer = MessageWriter::with_config_stream(writer, frame_config)?;

        info!(format = %config.wire_format, "sender session streaming");
        Ok(Self {
            reader,
            writer,
            encoder: encoder_for(config.wire_format, config.max_frame_size),
            state: SenderState::Streaming,
            format: config.wire_format,
            result_timeout: config.result_timeout,
            result_limit: config.result_limit,
            frames_sent: 0,
        })
    }

    /// Replace the payload encoder.
    pub fn with_encoder(mut self, encoder: Box<dyn PayloadEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn state(&self) -> SenderState {
        self.state
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Encode and write one frame.
    ///
    /// An encoder failure or an oversize payload leaves the session
    /// streaming. A write failure closes it.
    pub fn send_frame(&mut self, tag: FrameTag, payload: Bytes) -> Result<()> {
        self.require(SenderState::Streaming, "send_frame")?;

        let wire = self.encoder.encode(tag, payload)?;
        let message = match self.format {
            WireFormat::Untagged if wire.is_empty() => {
                return Err(FrameError::Unsupported {
                    format: self.format.name(),
                    reason: "an empty message ends the session",
                }
                .into());
            }
            WireFormat::Untagged => Message::Untagged(wire),
            WireFormat::Legacy | WireFormat::Compact => Message::Frame(Frame::new(tag, wire)),
        };

        match self.writer.write_message(&message) {
            Ok(()) => {
                self.frames_sent += 1;
                debug!(%tag, seq = self.frames_sent, "sent frame");
                Ok(())
            }
            Err(err @ (FrameError::Io(_) | FrameError::ConnectionClosed)) => {
                warn!(%tag, error = %err, "write failed, closing session");
                self.close();
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Poll the source once per tag and send what it produces.
    ///
    /// Returns the number of frames sent.
    pub fn stream_iteration<S>(&mut self, source: &mut S) -> Result<usize>
    where
        S: FrameSource + ?Sized,
    {
        self.require(SenderState::Streaming, "stream_iteration")?;

        let mut sent = 0;
        for tag in FrameTag::ALL {
            let next = source
                .next_frame(tag)
                .map_err(|err| SessionError::Collaborator(err.to_string()))?;
            if let Some(payload) = next {
                self.send_frame(tag, payload)?;
                sent += 1;
            }
        }
        Ok(sent)
    }

    /// Run iterations until `stop` is raised, `max_iterations` is reached or
    /// an iteration sends nothing.
    pub fn stream_until<S>(
        &mut self,
        source: &mut S,
        stop: &StopSignal,
        max_iterations: Option<u64>,
    ) -> Result<StreamSummary>
    where
        S: FrameSource + ?Sized,
    {
        let mut summary = StreamSummary::default();
        loop {
            if stop.is_stopped() {
                summary.stopped = true;
                break;
            }
            if max_iterations.is_some_and(|max| summary.iterations >= max) {
                break;
            }

            let sent = self.stream_iteration(source)?;
            if sent == 0 {
                debug!("source exhausted");
                break;
            }
            summary.iterations += 1;
            summary.frames_sent += sent as u64;
        }

        info!(
            iterations = summary.iterations,
            frames = summary.frames_sent,
            stopped = summary.stopped,
            "streaming finished"
        );
        Ok(summary)
    }

    /// Signal the end of the frame stream.
    ///
    /// Tagged formats send STOP and wait for a result next. The untagged
    /// format half-closes the write side and the session is closed.
    pub fn terminate(&mut self) -> Result<()> {
        self.require(SenderState::Streaming, "terminate")?;
        self.state = SenderState::Terminating;

        if self.format.has_result_exchange() {
            if let Err(err) = self.writer.send_stop() {
                self.close();
                return Err(err.into());
            }
            self.state = SenderState::AwaitingResult;
            debug!("sent termination signal");
        } else {
            let half_close = self.writer.get_ref().shutdown(Shutdown::Write);
            self.close();
            half_close?;
        }
        Ok(())
    }

    /// Read the result token: one read of up to the result limit, bounded by
    /// the result timeout. The receiver does not have to close first.
    ///
    /// An empty reply is `Ok(None)`. The session is closed afterwards in
    /// every case.
    pub fn await_result(&mut self) -> Result<Option<ResultToken>> {
        self.require(SenderState::AwaitingResult, "await_result")?;

        if let Err(err) = self
            .reader
            .get_ref()
            .set_read_timeout(Some(self.result_timeout))
        {
            self.close();
            return Err(err.into());
        }

        let outcome = self.reader.read_once(self.result_limit);
        self.close();

        match outcome {
            Ok(bytes) if bytes.is_empty() => {
                info!("receiver closed without a result");
                Ok(None)
            }
            Ok(bytes) => {
                let token = ResultToken::new(bytes);
                info!(len = token.len(), "received result");
                Ok(Some(token))
            }
            Err(FrameError::Io(err)) if is_timeout(&err) => {
                warn!(timeout = ?self.result_timeout, "timed out waiting for result");
                Err(SessionError::Timeout(self.result_timeout))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Terminate, then wait for the result when the format has one.
    pub fn finish(&mut self) -> Result<Option<ResultToken>> {
        self.terminate()?;
        if self.state == SenderState::AwaitingResult {
            self.await_result()
        } else {
            Ok(None)
        }
    }

    /// Shut the connection down. Idempotent.
    pub fn close(&mut self) {
        if self.state == SenderState::Closed {
            return;
        }
        if let Err(err) = self.writer.get_ref().shutdown(Shutdown::Both) {
            debug!(error = %err, "shutdown on close failed");
        }
        self.state = SenderState::Closed;
        debug!(frames = self.frames_sent, "sender session closed");
    }

    fn require(&self, expected: SenderState, op: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                op,
                state: self.state.name(),
            })
        }
    }
}
