use framelink_session::{SenderSession, SessionConfig, StopSignal};
use tracing::info;

use crate::cmd::{parse_duration, SendArgs};
use crate::collab::FileSource;
use crate::exit::{session_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_send_summary, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let connect_timeout = parse_duration(&args.connect_timeout)?;
    let result_timeout = parse_duration(&args.result_timeout)?;
    let mut source = FileSource::new(args.rgb, args.depth)?;

    let config = SessionConfig {
        connect_timeout,
        result_timeout,
        ..SessionConfig::new(args.host, args.port).with_format(args.wire.into())
    };
    let target = format!("{}:{}", config.host, config.port);

    let stop = StopSignal::new();
    install_ctrlc_handler(stop.clone())?;

    let mut sender =
        SenderSession::connect(&config).map_err(|err| session_error("connect failed", err))?;
    info!(%target, wire = %config.wire_format, "connected");

    let summary = sender
        .stream_until(&mut source, &stop, args.iterations)
        .map_err(|err| session_error("streaming failed", err))?;
    let result = sender
        .finish()
        .map_err(|err| session_error("result exchange failed", err))?;

    print_send_summary(
        &target,
        config.wire_format.name(),
        &summary,
        result.as_ref(),
        format,
    );
    Ok(SUCCESS)
}

fn install_ctrlc_handler(stop: StopSignal) -> CliResult<()> {
    ctrlc::set_handler(move || stop.stop())
        .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
