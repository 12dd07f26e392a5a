//! CLI argument definitions and shared statics.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured output and errors).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

pub fn json_mode() -> bool {
    JSON_MODE.get().copied().unwrap_or(false)
}

#[derive(Parser, Debug)]
#[command(name = "tracer", version, about = "Line-follower navigation controller")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/tracer.toml")]
    pub config: PathBuf,

    /// Optional sensor calibration CSV (strict `sensor,min,max` header)
    #[arg(long, value_name = "FILE")]
    pub calibration: Option<PathBuf>,

    /// Print results and logs as JSON lines instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Frame script for the simulated sensor array (one frame per line, `#` comments)
    #[arg(long, value_name = "FILE")]
    pub script: Option<PathBuf>,

    /// Stop after this many control ticks
    #[arg(long, value_name = "N")]
    pub max_ticks: Option<u64>,

    /// End the run as soon as the robot reports LOST (exit code 3)
    #[arg(long, action = ArgAction::SetTrue)]
    pub stop_on_lost: bool,

    /// Read single-character commands from stdin (s p x c + - t v h) and wait for `s`
    #[arg(long, action = ArgAction::SetTrue)]
    pub interactive: bool,

    /// Pace the simulation on the wall clock instead of simulated time
    #[arg(long, action = ArgAction::SetTrue)]
    pub realtime: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Follow the line until a stop condition, LOST (with --stop-on-lost) or Ctrl-C
    Run(RunArgs),
    /// Sample the sensor array over the calibration window and report per-sensor ranges
    Calibrate {
        /// Write the ranges to this CSV file
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
        /// Frame script for the simulated sensor array
        #[arg(long, value_name = "FILE")]
        script: Option<PathBuf>,
    },
    /// Quick health check (hardware presence / sim ok)
    SelfCheck,
    /// Health check for operational monitoring
    Health,
}
