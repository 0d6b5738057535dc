use std::path::PathBuf;

use framelink_frame::{DecodedFrame, WireFormat};
use framelink_session::{CollaboratorError, FixedResult, FrameSink, Receiver, SessionConfig};
use tracing::info;

use crate::cmd::{parse_duration, ReceiveArgs};
use crate::collab::DiskSink;
use crate::exit::{io_error, session_error, CliResult, SUCCESS};
use crate::output::{print_frame, print_report, OutputFormat};

pub fn run(args: ReceiveArgs, format: OutputFormat) -> CliResult<i32> {
    let wire_format = WireFormat::from(args.wire);
    let read_timeout = args
        .idle_timeout
        .as_deref()
        .map(parse_duration)
        .transpose()?;

    let config = SessionConfig {
        max_frame_size: args.max_frame_size,
        read_timeout,
        raw_payloads: args.raw_payloads,
        ..SessionConfig::new(args.bind, args.port).with_format(wire_format)
    };

    let disk = args
        .save_dir
        .map(|dir| DiskSink::new(dir, wire_format == WireFormat::Untagged))
        .transpose()
        .map_err(|err| io_error("failed creating save directory", err))?;

    let receiver = Receiver::bind(&config).map_err(|err| session_error("bind failed", err))?;
    let mut session = receiver
        .accept()
        .map_err(|err| session_error("accept failed", err))?;
    let peer = session.peer_addr().map(|addr| addr.to_string());

    let mut sink = ConsoleSink {
        disk,
        format,
        seq: 0,
    };
    let mut results = FixedResult::new(args.result);
    let report = session
        .run(&mut sink, &mut results)
        .map_err(|err| session_error("receive failed", err))?;

    info!(frames = report.frames_received, "session complete");
    print_report(&report, peer, format);
    Ok(SUCCESS)
}

/// Prints every frame and hands it to the disk sink when saving is on.
struct ConsoleSink {
    disk: Option<DiskSink>,
    format: OutputFormat,
    seq: u64,
}

impl FrameSink for ConsoleSink {
    fn consume(&mut self, frame: &DecodedFrame) -> Result<(), CollaboratorError> {
        self.seq += 1;
        let saved: Option<PathBuf> = match self.disk.as_mut() {
            Some(disk) => Some(disk.save(frame)?),
            None => None,
        };
        print_frame(frame, self.seq, saved.as_deref(), self.format);
        Ok(())
    }
}
