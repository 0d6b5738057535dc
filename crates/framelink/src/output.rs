use std::io::IsTerminal;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use framelink_frame::DecodedFrame;
use framelink_session::{ReceiveReport, ResultToken, StreamSummary};
use serde::Serialize;

const FRAME_SCHEMA: &str = "https://schemas.3leaps.dev/framelink/cli/v1/frame-received.schema.json";
const REPORT_SCHEMA: &str =
    "https://schemas.3leaps.dev/framelink/cli/v1/receive-report.schema.json";
const SEND_SCHEMA: &str = "https://schemas.3leaps.dev/framelink/cli/v1/send-summary.schema.json";

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    schema_id: &'a str,
    seq: u64,
    tag: &'a str,
    payload_size: usize,
    image: Option<String>,
    saved_to: Option<String>,
    timestamp: String,
}

pub fn print_frame(frame: &DecodedFrame, seq: u64, saved: Option<&Path>, format: OutputFormat) {
    let image = frame.image.map(|info| {
        format!(
            "{}x{}x{} {}",
            info.width,
            info.height,
            info.channels,
            info.element.name()
        )
    });
    let saved = saved.map(|path| path.display().to_string());

    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                schema_id: FRAME_SCHEMA,
                seq,
                tag: frame.tag.name(),
                payload_size: frame.payload.len(),
                image,
                saved_to: saved,
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SEQ", "TAG", "SIZE", "IMAGE", "SAVED"])
                .add_row(vec![
                    seq.to_string(),
                    frame.tag.name().to_string(),
                    frame.payload.len().to_string(),
                    image.unwrap_or_else(|| "-".to_string()),
                    saved.unwrap_or_else(|| "-".to_string()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "#{seq} {} size={} image={} saved={}",
                frame.tag,
                frame.payload.len(),
                image.as_deref().unwrap_or("-"),
                saved.as_deref().unwrap_or("-"),
            );
        }
    }
}

#[derive(Serialize)]
struct ReportOutput<'a> {
    schema_id: &'a str,
    peer: Option<String>,
    #[serde(flatten)]
    report: &'a ReceiveReport,
    timestamp: String,
}

pub fn print_report(report: &ReceiveReport, peer: Option<String>, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&ReportOutput {
            schema_id: REPORT_SCHEMA,
            peer,
            report,
            timestamp: now_unix_seconds(),
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"])
                .add_row(vec!["peer".to_string(), peer.unwrap_or_else(|| "-".to_string())])
                .add_row(vec!["frames".to_string(), report.frames_received.to_string()])
                .add_row(vec!["rgb".to_string(), report.rgb_frames.to_string()])
                .add_row(vec!["depth".to_string(), report.depth_frames.to_string()])
                .add_row(vec!["skipped".to_string(), report.frames_skipped.to_string()])
                .add_row(vec!["sink_failures".to_string(), report.sink_failures.to_string()])
                .add_row(vec!["bytes".to_string(), report.bytes_received.to_string()])
                .add_row(vec!["end".to_string(), format!("{:?}", report.end)])
                .add_row(vec!["result".to_string(), token_text(report.result.as_ref())]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "received {} frames ({} rgb, {} depth), skipped {}, sink failures {}, end={:?}, result={}",
                report.frames_received,
                report.rgb_frames,
                report.depth_frames,
                report.frames_skipped,
                report.sink_failures,
                report.end,
                token_text(report.result.as_ref()),
            );
        }
    }
}

#[derive(Serialize)]
struct SendOutput<'a> {
    schema_id: &'a str,
    target: &'a str,
    wire_format: &'a str,
    #[serde(flatten)]
    summary: &'a StreamSummary,
    result: Option<&'a ResultToken>,
    timestamp: String,
}

pub fn print_send_summary(
    target: &str,
    wire_format: &str,
    summary: &StreamSummary,
    result: Option<&ResultToken>,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => print_json(&SendOutput {
            schema_id: SEND_SCHEMA,
            target,
            wire_format,
            summary,
            result,
            timestamp: now_unix_seconds(),
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TARGET", "WIRE", "ITERATIONS", "FRAMES", "RESULT"])
                .add_row(vec![
                    target.to_string(),
                    wire_format.to_string(),
                    summary.iterations.to_string(),
                    summary.frames_sent.to_string(),
                    token_text(result),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "sent {} frames in {} iterations to {target} ({wire_format}); result: {}",
                summary.frames_sent,
                summary.iterations,
                token_text(result),
            );
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn token_text(token: Option<&ResultToken>) -> String {
    match token {
        Some(token) => token.to_string(),
        None => "<none>".to_string(),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
