use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr};

use bytes::Bytes;
use framelink_frame::{
    decoder_for, FrameError, FrameTag, Message, MessageReader, MessageWriter, PayloadDecoder,
    WireFormat,
};
use framelink_transport::{NetStream, StreamControl, TcpTransport};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::collab::{FrameSink, ResultProducer};
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::token::ResultToken;

/// Receiver lifecycle.
///
/// `Listening → Accepted → Dispatching → Resulting → Closed`. Sessions that
/// end without a termination signal go straight from `Dispatching` to
/// `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    Listening,
    Accepted,
    Dispatching,
    Resulting,
    Closed,
}

impl ReceiverState {
    pub fn name(self) -> &'static str {
        match self {
            ReceiverState::Listening => "listening",
            ReceiverState::Accepted => "accepted",
            ReceiverState::Dispatching => "dispatching",
            ReceiverState::Resulting => "resulting",
            ReceiverState::Closed => "closed",
        }
    }
}

/// How a receiver session ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionEnd {
    /// The sender sent the termination signal and got a result.
    Stopped,
    /// The sender disconnected (or sent an empty untagged message).
    #[default]
    PeerClosed,
}

/// Counters for one receiver session. Every recovered error shows up here
/// as well as in the log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReceiveReport {
    pub frames_received: u64,
    pub rgb_frames: u64,
    pub depth_frames: u64,
    /// Frames dropped for decode failures or oversize lengths.
    pub frames_skipped: u64,
    pub sink_failures: u64,
    pub bytes_received: u64,
    pub end: SessionEnd,
    pub result: Option<ResultToken>,
}

/// A bound listener waiting for its one sender.
pub struct Receiver {
    transport: TcpTransport,
    config: SessionConfig,
}

impl Receiver {
    /// Bind on `config.host:config.port`.
    pub fn bind(config: &SessionConfig) -> Result<Self> {
        let transport = TcpTransport::bind(&config.host, config.port)?;
        info!(addr = %transport.local_addr(), format = %config.wire_format, "receiver listening");
        Ok(Self {
            transport,
            config: config.clone(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    pub fn state(&self) -> ReceiverState {
        ReceiverState::Listening
    }

    /// Accept exactly one connection. The listener is dropped on return, so
    /// later connection attempts are refused.
    pub fn accept(self) -> Result<ReceiverSession<NetStream, NetStream>> {
        let stream = self.transport.accept()?;
        drop(self.transport);

        let peer = stream.peer_addr();
        info!(peer = ?peer, "accepted sender");
        let reader_stream = stream.try_clone()?;
        let mut session = ReceiverSession::from_parts(reader_stream, stream, &self.config)?;
        session.peer = peer;
        Ok(session)
    }
}

/// Owns one accepted connection.
pub struct ReceiverSession<R, W> {
    reader: MessageReader<R>,
    writer: MessageWriter<W>,
    decoder: Box<dyn PayloadDecoder>,
    state: ReceiverState,
    format: WireFormat,
    result_limit: usize,
    peer: Option<SocketAddr>,
}

impl<R, W> ReceiverSession<R, W>
where
    R: Read + StreamControl,
    W: Write + StreamControl,
{
    /// Build a session over an accepted stream split into read and write
    /// handles. Tagged payloads must decode as still images unless
    /// `config.raw_payloads` is set; untagged payloads are parsed as image
    /// descriptors.
    pub fn from_parts(reader: R, writer: W, config: &SessionConfig) -> Result<Self> {
        let frame_config = config.frame_config();
        let reader = MessageReader::with_config_stream(reader, frame_config.clone())?;
        let writer = MessageWriter::with_config_stream(writer, frame_config)?;

        Ok(Self {
            reader,
            writer,
            decoder: decoder_for(config.wire_format, config.raw_payloads, config.max_frame_size),
            state: ReceiverState::Accepted,
            format: config.wire_format,
            result_limit: config.result_limit,
            peer: None,
        })
    }

    /// Replace the payload decoder.
    pub fn with_decoder(mut self, decoder: Box<dyn PayloadDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Dispatch messages until the session ends.
    ///
    /// Decode failures, sink failures and (for tagged formats) oversize
    /// frames are logged, counted and skipped. Unknown discriminators and
    /// anything else that loses the read position close the connection and
    /// return the error.
    pub fn run<S, P>(&mut self, sink: &mut S, results: &mut P) -> Result<ReceiveReport>
    where
        S: FrameSink + ?Sized,
        P: ResultProducer + ?Sized,
    {
        if self.state != ReceiverState::Accepted {
            return Err(SessionError::InvalidState {
                op: "run",
                state: self.state.name(),
            });
        }
        self.state = ReceiverState::Dispatching;

        let mut report = ReceiveReport::default();
        let outcome = self.dispatch(sink, results, &mut report);
        self.close();

        match outcome {
            Ok(()) => {
                info!(
                    frames = report.frames_received,
                    skipped = report.frames_skipped,
                    end = ?report.end,
                    "receiver session finished"
                );
                Ok(report)
            }
            Err(err) => {
                warn!(error = %err, frames = report.frames_received, "receiver session aborted");
                Err(err)
            }
        }
    }

    fn dispatch<S, P>(
        &mut self,
        sink: &mut S,
        results: &mut P,
        report: &mut ReceiveReport,
    ) -> Result<()>
    where
        S: FrameSink + ?Sized,
        P: ResultProducer + ?Sized,
    {
        loop {
            match self.reader.read_message() {
                Ok(Message::Frame(frame)) => {
                    self.deliver(Some(frame.tag), frame.payload, sink, report);
                }
                Ok(Message::Untagged(payload)) if payload.is_empty() => {
                    debug!("empty untagged message, ending session");
                    report.end = SessionEnd::PeerClosed;
                    return Ok(());
                }
                Ok(Message::Untagged(payload)) => {
                    self.deliver(None, payload, sink, report);
                }
                Ok(Message::Stop) => {
                    report.result = Some(self.respond(results)?);
                    report.end = SessionEnd::Stopped;
                    return Ok(());
                }
                Err(FrameError::ConnectionClosed) => {
                    debug!("sender disconnected");
                    report.end = SessionEnd::PeerClosed;
                    return Ok(());
                }
                Err(err) if err.is_recoverable(self.format) => {
                    warn!(error = %err, "skipping frame");
                    report.frames_skipped += 1;
                    let FrameError::OversizeFrame { declared, .. } = err else {
                        continue;
                    };
                    match self.reader.discard(declared) {
                        Ok(()) => {}
                        Err(FrameError::ConnectionClosed) => {
                            report.end = SessionEnd::PeerClosed;
                            return Ok(());
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn deliver<S>(
        &mut self,
        tag: Option<FrameTag>,
        payload: Bytes,
        sink: &mut S,
        report: &mut ReceiveReport,
    ) where
        S: FrameSink + ?Sized,
    {
        let len = payload.len();
        report.bytes_received += len as u64;

        let frame = match self.decoder.decode(tag, payload) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(tag = ?tag, len = err.len, reason = %err.reason, "skipping undecodable frame");
                report.frames_skipped += 1;
                return;
            }
        };

        report.frames_received += 1;
        match frame.tag {
            FrameTag::Rgb => report.rgb_frames += 1,
            FrameTag::Depth => report.depth_frames += 1,
        }
        debug!(tag = %frame.tag, len, seq = report.frames_received, "received frame");

        if let Err(err) = sink.consume(&frame) {
            warn!(tag = %frame.tag, error = %err, "frame sink failed");
            report.sink_failures += 1;
        }
    }

    fn respond<P>(&mut self, results: &mut P) -> Result<ResultToken>
    where
        P: ResultProducer + ?Sized,
    {
        self.state = ReceiverState::Resulting;
        let token = results
            .compute_result()
            .map_err(|err| SessionError::Collaborator(err.to_string()))?;
        if token.len() > self.result_limit {
            warn!(
                len = token.len(),
                limit = self.result_limit,
                "result token exceeds the sender's read bound"
            );
        }

        self.writer.write_raw(&token)?;
        info!(len = token.len(), "sent result");
        Ok(ResultToken::new(token))
    }

    /// Shut the connection down. Idempotent.
    pub fn close(&mut self) {
        if self.state == ReceiverState::Closed {
            return;
        }
        if let Err(err) = self.writer.get_ref().shutdown(Shutdown::Both) {
            debug!(error = %err, "shutdown on close failed");
        }
        self.state = ReceiverState::Closed;
    }
}
