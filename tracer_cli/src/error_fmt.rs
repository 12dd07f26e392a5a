//! Human-readable error descriptions and structured JSON error formatting.

use std::io::ErrorKind;

use tracer_core::error::{BuildError, NavError};
use tracer_hardware::error::HwError;

fn find<T: std::error::Error + 'static>(err: &eyre::Report) -> Option<&T> {
    err.chain().find_map(|e| e.downcast_ref::<T>())
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = find::<BuildError>(err) {
        return match be {
            BuildError::MissingSensors => {
                "What happened: No line sensors were provided to the navigator.\nLikely causes: The sensor array failed to initialize or was not wired into the builder.\nHow to fix: Check [pins].sensors and make sure the sensors are passed via sensors(...).".to_string()
            }
            BuildError::MissingDrive => {
                "What happened: No motor driver was provided to the navigator.\nLikely causes: The H-bridge failed to initialize or was not wired into the builder.\nHow to fix: Check the [pins] motor entries and make sure the bridge is passed via drive(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range speed, threshold or weight values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/tracer.toml for a sample."
            ),
        };
    }

    if let Some(hw) = find::<HwError>(err) {
        return match hw {
            HwError::Script(msg) => format!(
                "What happened: The frame script could not be used ({msg}).\nLikely causes: A malformed line, a bad repeat count, or the script ran out in strict mode.\nHow to fix: Use five 0/1 channels per line, optionally followed by '*N'."
            ),
            HwError::Gpio(msg) => format!(
                "What happened: Failed to initialize hardware pins ({msg}).\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO."
            ),
            HwError::Io(e) => format!(
                "What happened: A hardware file could not be read ({e}).\nLikely causes: Wrong path or missing permissions.\nHow to fix: Check the path and rerun."
            ),
        };
    }

    if let Some(ne) = find::<NavError>(err) {
        return match ne {
            NavError::Hardware(msg) => format!(
                "What happened: A hardware call failed during the run ({msg}).\nLikely causes: Loose sensor or motor wiring, or a collaborator that stopped answering.\nHow to fix: Check wiring and power; the drive was stopped. Rerun with --log-level=debug for detail."
            ),
            NavError::HardwareFault(msg) => format!(
                "What happened: Hardware fault ({msg}).\nLikely causes: GPIO access lost or a device error.\nHow to fix: Check GPIO permissions and wiring, then rerun."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    if let Some(te) = find::<toml::de::Error>(err) {
        return format!(
            "What happened: The config file is not valid TOML or misses required keys.\nLikely causes: A typo, a missing [pins] or [runner] section, or a wrong value type.\nHow to fix: Compare with etc/tracer.toml. Parser said: {}",
            te.message()
        );
    }

    if let Some(io) = find::<std::io::Error>(err)
        && io.kind() == ErrorKind::NotFound
    {
        return format!(
            "What happened: A required file was not found ({err}).\nLikely causes: Wrong --config, --calibration or --script path.\nHow to fix: Pass an existing file, e.g. --config etc/tracer.toml."
        );
    }

    // String-based heuristics for errors coming from config validation
    let msg = err.to_string();
    let lower = format!("{err:#}").to_ascii_lowercase();

    if lower.contains("calibration csv must have headers") {
        return "Invalid headers in calibration CSV. Expected 'sensor,min,max'.".to_string();
    }

    if lower.contains("invalid configuration") {
        return format!(
            "What happened: Configuration is invalid ({err:#}).\nLikely causes: Out-of-range or inconsistent values in the TOML.\nHow to fix: Edit the named field and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if find::<BuildError>(err).is_some() || find::<toml::de::Error>(err).is_some() {
        "Config"
    } else if let Some(hw) = find::<HwError>(err) {
        match hw {
            HwError::Script(_) => "Script",
            _ => "Hardware",
        }
    } else if find::<NavError>(err).is_some() {
        "Hardware"
    } else {
        "Error"
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({ "reason": reason_name(err), "message": humanize(err) }).to_string()
}
