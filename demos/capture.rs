//! Runs the telemetry capture server: accepts TCP connections and writes
//! each one's raw bytes verbatim to a uniquely named file under the
//! capture directory.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use flash_telemetry_parser::capture::Server;
use flash_telemetry_parser::config::Config;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Capture raw telemetry streams to disk")]
struct Options {
    /// TCP port to listen on
    #[arg(short = 'p', long, default_value_t = 7934)]
    port: u16,

    /// Directory to write captured .flm files into
    #[arg(short = 'o', long, default_value = "flm")]
    output_dir: PathBuf,
}

fn main() -> ExitCode {
    #[cfg(target_family = "unix")]
    reset_sigpipe();

    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let options = Options::parse();
    let config = Config::default().with_capture_port(options.port).with_capture_dir(options.output_dir);

    match Server::bind(config) {
        Ok(server) => {
            server.serve();
            ExitCode::from(exitcode::OK as u8)
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(exitcode::OSERR as u8)
        }
    }
}

/// See: https://github.com/rust-lang/rust/issues/46016#issuecomment-605624865
#[cfg(target_family = "unix")]
fn reset_sigpipe() {
    unsafe {
        nix::sys::signal::signal(nix::sys::signal::Signal::SIGPIPE, nix::sys::signal::SigHandler::SigDfl)
            .expect("failed to reset SIGPIPE handler");
    }
}
