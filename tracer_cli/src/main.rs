mod cli;
mod error_fmt;
mod follow;
mod serial;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::{Result, WrapErr};
use tracer_config::Config;
use tracer_core::RobotState;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE, json_mode};

const EXIT_ERROR: i32 = 1;
const EXIT_LOST: i32 = 3;

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if let Err(e) = color_eyre::install() {
        eprintln!("Warning: error report hook not installed: {e}");
    }

    let code = match real_main(cli) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "command failed");
            if json_mode() {
                eprintln!("{}", error_fmt::format_error_json(&err));
            } else {
                eprintln!("{}", error_fmt::humanize(&err));
            }
            EXIT_ERROR
        }
    };
    std::process::exit(code);
}

fn load_config(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = tracer_config::load_toml(&text)
        .wrap_err_with(|| format!("parse config {}", path.display()))?;
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

fn init_tracing(cli: &Cli, cfg: &Config) -> Result<()> {
    // RUST_LOG wins, then --log-level, then [logging].level
    let level = if cli.log_level != "info" {
        cli.log_level.as_str()
    } else {
        cfg.logging.level.as_deref().unwrap_or("info")
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid log level {level:?}"))?;

    let console = if cli.json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().with_writer(std::io::stderr).with_target(false).boxed()
    };

    let file = match &cfg.logging.file {
        Some(path) => {
            let path = Path::new(path);
            let dir = path.parent().filter(|d| !d.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file has no file name: {}", path.display()))?;
            let appender = match cfg.logging.rotation.as_deref().unwrap_or("never") {
                "daily" => tracing_appender::rolling::daily(dir, name),
                "hourly" => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(fmt::layer().json().with_ansi(false).with_writer(writer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .wrap_err("install tracing subscriber")?;
    Ok(())
}

fn real_main(cli: Cli) -> Result<i32> {
    let cfg = load_config(&cli.config)?;
    init_tracing(&cli, &cfg)?;

    let calibration = match &cli.calibration {
        Some(path) => {
            let table = tracer_config::load_calibration_csv(path)?;
            for row in table.rows() {
                tracing::info!(sensor = row.sensor, min = row.min, max = row.max, "calibration");
            }
            Some(table)
        }
        None => None,
    };

    match &cli.cmd {
        Commands::Run(args) => {
            let shutdown = Arc::new(AtomicBool::new(false));
            {
                let flag = Arc::clone(&shutdown);
                ctrlc::set_handler(move || flag.store(true, Ordering::Release))
                    .wrap_err("install Ctrl-C handler")?;
            }
            let (summary, base_speed) = follow::run_follow(&cfg, args, &shutdown)?;
            if json_mode() {
                println!(
                    "{}",
                    serde_json::json!({
                        "state": summary.final_state.to_string(),
                        "reason": format!("{:?}", summary.reason),
                        "ticks": summary.ticks,
                        "elapsed_ms": summary.elapsed_ms,
                        "base_speed": base_speed,
                    })
                );
            } else {
                println!(
                    "run ended in {} after {} ticks ({:?}, {} ms)",
                    summary.final_state, summary.ticks, summary.reason, summary.elapsed_ms
                );
            }
            if summary.final_state == RobotState::Lost {
                return Ok(EXIT_LOST);
            }
        }
        Commands::Calibrate { out, script } => {
            let table = follow::run_calibrate(&cfg, script.as_deref(), out.as_deref())?;
            if json_mode() {
                println!("{}", serde_json::json!({ "min": table.min, "max": table.max }));
            } else {
                for row in table.rows() {
                    println!("sensor {}: min {} max {}", row.sensor, row.min, row.max);
                }
            }
        }
        Commands::SelfCheck => {
            follow::self_check(&cfg)?;
            if json_mode() {
                println!(
                    "{}",
                    serde_json::json!({
                        "ok": true,
                        "odometry": cfg.odometry.enabled,
                        "button": cfg.pins.button.is_some(),
                        "calibration": calibration.is_some(),
                    })
                );
            } else {
                println!("self-check ok");
            }
        }
        Commands::Health => {
            if json_mode() {
                println!(
                    "{}",
                    serde_json::json!({
                        "status": "ok",
                        "version": env!("CARGO_PKG_VERSION"),
                        "config": cli.config.display().to_string(),
                        "tick_hz": cfg.runner.tick_hz,
                        "hardware": cfg!(all(feature = "hardware", target_os = "linux")),
                    })
                );
            } else {
                println!("ok");
            }
        }
    }
    Ok(0)
}
