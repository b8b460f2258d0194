//! Decodes a captured `.flm` telemetry file and prints a category/metric
//! report, optionally restricted to a frame range.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use flash_telemetry_parser::config::Config;
use flash_telemetry_parser::telemetry::{Reporter, Timeline};
use tabular::{Row, Table};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Report per-category CPU, frame, and memory statistics from a captured stream")]
struct Options {
    /// Path to a captured .flm file
    input: PathBuf,

    /// Emit per-frame reports
    #[arg(short = 'f', long)]
    frames: bool,

    /// Include per-metric breakdown within categories
    #[arg(short = 's', long)]
    summary: bool,

    /// Emit every record in the selected range
    #[arg(short = 'a', long)]
    all: bool,

    /// Include memory averages and peaks
    #[arg(short = 'm', long)]
    memory: bool,

    /// Enable verbose hex dump during decoding
    #[arg(short = 'd', long)]
    dump: bool,

    /// Suppress frames whose CPU-load percentage is below N
    #[arg(short = 'l', long, value_name = "N")]
    load: Option<u32>,

    /// Restrict analysis to frame indices start:end
    #[arg(long, value_name = "start:end")]
    range: Option<String>,
}

fn parse_range(s: &str) -> Option<(u32, u32)> {
    let (start, end) = s.split_once(':')?;
    Some((start.parse().ok()?, end.parse().ok()?))
}

fn hex_dump(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(" ")
}

fn run(options: Options) -> Result<(), String> {
    let bytes = fs::read(&options.input).map_err(|e| format!("reading {}: {e}", options.input.display()))?;

    let mut config = Config::default().with_range(options.range.as_deref().and_then(parse_range));
    config.show_memory = options.memory;
    config.show_metrics = options.summary;
    config.show_frames = options.frames;
    config.load_filter_percent = options.load.unwrap_or(0);

    if options.dump {
        tracing::debug!(bytes = %hex_dump(&bytes), "captured stream");
    }

    let mut reader = flash_telemetry_parser::amf3::MetricReader::new();
    reader.append_bytes(&bytes);

    let mut timeline = Timeline::new(config.frame_marker.clone(), config.render_marker.clone());
    loop {
        match reader.read_record() {
            Ok(Some(value)) => timeline.ingest(value),
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "decode error, stopping");
                break;
            }
        }
    }

    let slice: &[_] = match config.range {
        Some((start, end)) => {
            let frame_index = timeline.frame_index();
            let from = frame_index.position_by_index(start as usize).unwrap_or(0);
            let to = frame_index.position_by_index(end as usize).unwrap_or(timeline.records().len());
            &timeline.records()[from.min(timeline.records().len())..to.min(timeline.records().len())]
        }
        None => timeline.records(),
    };

    let mut reporter = Reporter::new(config.show_memory);
    reporter.ingest_slice(slice);

    let mut table = Table::new("{:<}  {:>}  {:>}");
    table.add_row(Row::new().with_cell("Category").with_cell("Span (us)").with_cell("%"));
    for report in reporter.category_reports(config.metric_threshold_percent) {
        let total = reporter.latest().unwrap_or_default().0.saturating_sub(reporter.earliest().unwrap_or_default().0);
        let percent = if total == 0 {
            0.0
        } else {
            100.0 * report.total_span.0 as f64 / total as f64
        };
        table.add_row(
            Row::new()
                .with_cell(&report.category)
                .with_cell(report.total_span.0.to_string())
                .with_cell(format!("{percent:.1}")),
        );
        if options.summary {
            for metric in &report.metrics {
                table.add_row(
                    Row::new()
                        .with_cell(format!("  {}", metric.name))
                        .with_cell(metric.span.0.to_string())
                        .with_cell(format!("{:.1}", metric.percent_of_category)),
                );
            }
        }
    }
    print!("{table}");

    if options.memory {
        for (name, stats) in reporter.memory_reports() {
            println!("{name}: avg={:.1} peak={:.1}", stats.average(), stats.max);
        }
    }

    if options.frames {
        let stats = timeline.frame_index().statistics();
        if let Some(stats) = stats {
            println!("frames: mean={:.1}us stddev={:.1}us fps={:.2}", stats.mean, stats.stddev, stats.fps);
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    #[cfg(target_family = "unix")]
    reset_sigpipe();

    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let options = Options::parse();
    match run(options) {
        Ok(()) => ExitCode::from(exitcode::OK as u8),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(exitcode::DATAERR as u8)
        }
    }
}

/// Reset SIGPIPE to its default disposition so writing to a closed stdout
/// pipe (e.g. `report ... | head`) terminates the process instead of
/// panicking on a broken-pipe `io::Error`.
/// See: https://github.com/rust-lang/rust/issues/46016#issuecomment-605624865
#[cfg(target_family = "unix")]
fn reset_sigpipe() {
    unsafe {
        nix::sys::signal::signal(nix::sys::signal::Signal::SIGPIPE, nix::sys::signal::SigHandler::SigDfl)
            .expect("failed to reset SIGPIPE handler");
    }
}
