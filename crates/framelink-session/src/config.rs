use std::time::Duration;

use framelink_frame::{FrameConfig, WireFormat, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_FRAME};

/// Default bound on the result token read.
pub const DEFAULT_RESULT_LIMIT: usize = 1024;

/// Default wait for the result token after termination.
pub const DEFAULT_RESULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything a session needs at start. Supplied by the caller; the
/// session never reads the process environment.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Host to connect to (sender) or bind on (receiver).
    pub host: String,
    pub port: u16,
    pub wire_format: WireFormat,
    pub connect_timeout: Duration,
    /// Socket read timeout while streaming. `None` blocks.
    pub read_timeout: Option<Duration>,
    /// Socket write timeout while streaming. `None` blocks.
    pub write_timeout: Option<Duration>,
    /// How long the sender waits for the result token.
    pub result_timeout: Duration,
    /// Largest payload accepted or sent, in bytes.
    pub max_frame_size: usize,
    /// Largest result token read, in bytes.
    pub result_limit: usize,
    /// Upper bound on a single socket read.
    pub chunk_size: usize,
    /// Hand tagged payloads to the sink without validating them as still
    /// images. Untagged payloads are always parsed as descriptors.
    pub raw_payloads: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            wire_format: WireFormat::Legacy,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: None,
            write_timeout: None,
            result_timeout: DEFAULT_RESULT_TIMEOUT,
            max_frame_size: DEFAULT_MAX_FRAME,
            result_limit: DEFAULT_RESULT_LIMIT,
            chunk_size: DEFAULT_CHUNK_SIZE,
            raw_payloads: false,
        }
    }
}

impl SessionConfig {
    /// Defaults for `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Override the wire format.
    pub fn with_format(mut self, format: WireFormat) -> Self {
        self.wire_format = format;
        self
    }

    /// Frame reader/writer configuration derived from this session config.
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            format: self.wire_format,
            max_frame_size: self.max_frame_size,
            chunk_size: self.chunk_size,
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
        }
    }
}
