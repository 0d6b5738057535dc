use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use framelink_frame::{WireFormat, DEFAULT_MAX_FRAME};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod receive;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Stream image files to a receiver and print its result.
    Send(SendArgs),
    /// Accept one sender, print (and optionally save) its frames, answer STOP.
    Receive(ReceiveArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Receive(args) => receive::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Wire format selector.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum WireArg {
    /// ASCII RGB/DEPTH/STOP tokens with a 16-byte length.
    Legacy,
    /// One-byte discriminator with a 4-byte length.
    Compact,
    /// 4-byte length and compressed image descriptor, no result exchange.
    Untagged,
}

impl From<WireArg> for WireFormat {
    fn from(arg: WireArg) -> Self {
        match arg {
            WireArg::Legacy => WireFormat::Legacy,
            WireArg::Compact => WireFormat::Compact,
            WireArg::Untagged => WireFormat::Untagged,
        }
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Receiver host name or IP address.
    pub host: String,
    /// Receiver port.
    #[arg(long, short = 'p')]
    pub port: u16,
    /// Wire format (must match the receiver).
    #[arg(long, value_enum, default_value = "legacy")]
    pub wire: WireArg,
    /// Encoded still image sent as the RGB frame.
    #[arg(long, value_name = "FILE", required_unless_present = "depth")]
    pub rgb: Option<PathBuf>,
    /// Encoded still image sent as the DEPTH frame.
    #[arg(long, value_name = "FILE")]
    pub depth: Option<PathBuf>,
    /// Stop after N iterations. Default: until Ctrl-C.
    #[arg(long, value_name = "N")]
    pub iterations: Option<u64>,
    /// Maximum wait for the result after STOP (e.g. 30s, 500ms).
    #[arg(long, default_value = "30s")]
    pub result_timeout: String,
    /// Connection timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub connect_timeout: String,
}

#[derive(Args, Debug)]
pub struct ReceiveArgs {
    /// Port to listen on.
    #[arg(long, short = 'p')]
    pub port: u16,
    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: String,
    /// Wire format (must match the sender).
    #[arg(long, value_enum, default_value = "legacy")]
    pub wire: WireArg,
    /// Save frames under DIR/rgb_frames and DIR/depth_frames.
    #[arg(long, value_name = "DIR")]
    pub save_dir: Option<PathBuf>,
    /// Result token returned to the sender on STOP.
    #[arg(long, default_value = "0")]
    pub result: String,
    /// Accept tagged payloads as opaque bytes instead of requiring valid
    /// still images (undecodable frames are skipped otherwise).
    #[arg(long)]
    pub raw_payloads: bool,
    /// Largest accepted frame payload in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME)]
    pub max_frame_size: usize,
    /// Abort if the sender is silent this long (e.g. 10s). Default: wait.
    #[arg(long)]
    pub idle_timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `5s`, `500ms` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
