//! Navigator assembly from config, and the run / calibrate / self-check flows.

use std::any::Any;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use eyre::{Result, WrapErr};
use tracer_config::{CalibrationTable, Config};
use tracer_core::odometry::register_encoders;
use tracer_core::runner::{self, RunOptions, RunSummary};
use tracer_core::{DynNavigator, EdgeHandle, EdgeTable, Odometry, SharedClock};
use tracer_hardware::{
    DutyHandle, Exhausted, PulseGenerator, SimulatedBridge, SimulatedSensors, TracingAudio,
};
use tracer_traits::{Clock, LineSensors, ManualClock, MonotonicClock, SensorFrame};

use crate::cli::RunArgs;
use crate::serial;

/// Encoder ticks per second a simulated wheel produces at full duty.
const SIM_TICKS_PER_SEC_AT_FULL: f32 = 60.0;

/// Simulated seconds a script-driven run keeps going after its last frame.
const SIM_TAIL_SECS: u64 = 10;

/// Set to make simulated sensor reads fail once the script is exhausted.
pub const SIM_STRICT_ENV: &str = "TRACER_SIM_STRICT";

/// An assembled navigator plus whatever must stay alive while it runs.
pub struct Rig {
    pub nav: DynNavigator,
    /// Frames in the simulation script, if simulated.
    pub script_len: Option<usize>,
    // Interrupt registrations; dropping them detaches the callbacks.
    _attachments: Vec<Box<dyn Any>>,
}

/// Simulated sensors that also turn the bridge's duty into encoder edges
/// before every read, standing in for the wheel interrupts.
struct SimulatedWheels {
    sensors: SimulatedSensors,
    duties: DutyHandle,
    table: Arc<EdgeTable>,
    handles: (EdgeHandle, EdgeHandle),
    pulses: (PulseGenerator, PulseGenerator),
    clock: SharedClock,
    epoch: std::time::Instant,
    last_ms: u64,
}

impl LineSensors for SimulatedWheels {
    fn read(&mut self) -> Result<SensorFrame, Box<dyn std::error::Error + Send + Sync>> {
        let now = self.clock.ms_since(self.epoch);
        let dt = now.saturating_sub(self.last_ms);
        self.last_ms = now;
        let d = self.duties.snapshot();
        let (l, r) = self.handles;
        let table = &self.table;
        self.pulses.0.advance(d[0].max(d[1]), dt, || {
            table.dispatch(l, now);
        });
        self.pulses.1.advance(d[2].max(d[3]), dt, || {
            table.dispatch(r, now);
        });
        self.sensors.read()
    }
}

fn sim_frames(script: Option<&Path>) -> Result<Vec<SensorFrame>> {
    match script {
        Some(path) => tracer_hardware::load_script(path)
            .wrap_err_with(|| format!("load frame script {}", path.display())),
        None => Ok(tracer_hardware::builtin_course()),
    }
}

/// Assemble a navigator over simulated collaborators.
pub fn sim_rig(cfg: &Config, script: Option<&Path>, realtime: bool) -> Result<Rig> {
    let frames = sim_frames(script)?;
    let script_len = frames.len();
    let exhausted = if std::env::var_os(SIM_STRICT_ENV).is_some() {
        Exhausted::Fail
    } else {
        Exhausted::RepeatLast
    };
    let sensors = SimulatedSensors::new(frames).on_exhausted(exhausted);
    let bridge = SimulatedBridge::new();
    let duties = bridge.handle();
    let clock: SharedClock = if realtime {
        Arc::new(MonotonicClock::new())
    } else {
        Arc::new(ManualClock::new())
    };

    let odo_cfg: tracer_core::config::OdometryCfg = (&cfg.odometry).into();
    let mut table = EdgeTable::new();
    let encoders = if cfg.odometry.enabled {
        Some(register_encoders(&mut table, &odo_cfg)?)
    } else {
        None
    };
    let table = Arc::new(table);

    let mut builder = DynNavigator::builder()
        .with_config(cfg.into())
        .with_audio(TracingAudio::new())
        .with_clock(Arc::clone(&clock));

    let builder = match encoders {
        Some((l, r)) => {
            builder = builder.with_odometry(Odometry::new(Arc::clone(&table), l, r, odo_cfg)?);
            let full = u16::try_from(cfg.speed.max_speed).unwrap_or(u16::MAX);
            builder.sensors(SimulatedWheels {
                sensors,
                duties,
                table,
                handles: (l, r),
                pulses: (
                    PulseGenerator::new(SIM_TICKS_PER_SEC_AT_FULL, full),
                    PulseGenerator::new(SIM_TICKS_PER_SEC_AT_FULL, full),
                ),
                epoch: clock.now(),
                clock,
                last_ms: 0,
            })
        }
        None => builder.sensors(sensors),
    };
    let nav = builder.drive(bridge).build()?;
    tracing::info!(frames = script_len, realtime, odometry = cfg.odometry.enabled, "simulation ready");
    Ok(Rig {
        nav,
        script_len: Some(script_len),
        _attachments: Vec::new(),
    })
}

/// Assemble a navigator over GPIO collaborators.
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub fn hardware_rig(cfg: &Config) -> Result<Rig> {
    use std::time::Instant;
    use tracer_hardware::gpio::{GpioBridge, GpioLineSensors, attach_button, attach_edge};

    let p = &cfg.pins;
    let sensors = GpioLineSensors::new(p.sensors, cfg.hardware.sensors_active_low)
        .wrap_err("open line sensors")?;
    let bridge = GpioBridge::new(
        [p.left_forward, p.left_backward, p.right_forward, p.right_backward],
        cfg.hardware.pwm_frequency_hz,
    )
    .wrap_err("open motor pins")?;

    let odo_cfg: tracer_core::config::OdometryCfg = (&cfg.odometry).into();
    let mut table = EdgeTable::new();
    let encoders = if cfg.odometry.enabled {
        Some(register_encoders(&mut table, &odo_cfg)?)
    } else {
        None
    };
    let button = match p.button {
        Some(pin) => Some((pin, table.register((&cfg.button).into())?)),
        None => None,
    };
    let table = Arc::new(table);

    // Edge timestamps are only compared with each other.
    let epoch = Instant::now();
    let stamp = move || u64::try_from(epoch.elapsed().as_millis()).unwrap_or(u64::MAX);
    let mut attachments: Vec<Box<dyn Any>> = Vec::new();

    let mut builder = DynNavigator::builder()
        .with_config(cfg.into())
        .with_audio(TracingAudio::new());

    if let (Some((l, r)), Some(pin_l), Some(pin_r)) = (encoders, p.encoder_left, p.encoder_right) {
        for (pin, handle) in [(pin_l, l), (pin_r, r)] {
            let t = Arc::clone(&table);
            let pin = attach_edge(pin, move || {
                t.dispatch(handle, stamp());
            })
            .wrap_err("attach encoder interrupt")?;
            attachments.push(Box::new(pin));
        }
        builder = builder.with_odometry(Odometry::new(Arc::clone(&table), l, r, odo_cfg)?);
    }
    if let Some((pin, handle)) = button {
        let t = Arc::clone(&table);
        let active_low = cfg.button.active_low;
        let pin = attach_button(pin, active_low, move |active| {
            t.dispatch_level(handle, stamp(), active);
        })
        .wrap_err("attach button interrupt")?;
        attachments.push(Box::new(pin));
        builder = builder.with_button(Arc::clone(&table), handle);
    }

    let nav = builder.sensors(sensors).drive(bridge).build()?;
    tracing::info!(
        odometry = cfg.odometry.enabled,
        button = p.button.is_some(),
        "hardware ready"
    );
    Ok(Rig {
        nav,
        script_len: None,
        _attachments: attachments,
    })
}

/// Pick GPIO or simulation depending on how the binary was built.
pub fn make_rig(cfg: &Config, script: Option<&Path>, realtime: bool) -> Result<Rig> {
    #[cfg(all(feature = "hardware", target_os = "linux"))]
    {
        if script.is_some() {
            tracing::warn!("--script is ignored with hardware collaborators");
        }
        let _ = realtime;
        hardware_rig(cfg)
    }
    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    {
        sim_rig(cfg, script, realtime)
    }
}

/// Run the control loop until a stop condition and return its summary.
pub fn run_follow(cfg: &Config, args: &RunArgs, shutdown: &AtomicBool) -> Result<(RunSummary, i32)> {
    let mut rig = make_rig(cfg, args.script.as_deref(), args.realtime)?;
    // Scripted runs end on their own unless told otherwise.
    let default_max = rig
        .script_len
        .filter(|_| !args.interactive)
        .map(|n| n as u64 + SIM_TAIL_SECS * u64::from(cfg.runner.tick_hz));
    let opts = RunOptions {
        tick_hz: cfg.runner.tick_hz,
        max_ticks: args.max_ticks.or(default_max),
        stop_on_lost: args.stop_on_lost,
        autostart: !args.interactive,
    };
    let commands = if args.interactive {
        Some(serial::spawn_stdin_reader()?)
    } else {
        None
    };

    let summary = runner::run(
        &mut rig.nav,
        &opts,
        commands.as_ref(),
        shutdown,
        serial::print_reply,
    )?;
    Ok((summary, rig.nav.base_speed()))
}

/// Run one calibration window and optionally persist the ranges.
pub fn run_calibrate(cfg: &Config, script: Option<&Path>, out: Option<&Path>) -> Result<CalibrationTable> {
    let mut rig = make_rig(cfg, script, false)?;
    let nav = &mut rig.nav;
    nav.begin()?;
    if !nav.calibrate() {
        eyre::bail!("calibration rejected in state {}", nav.state());
    }
    nav.tick().wrap_err("calibration")?;
    let table: CalibrationTable = nav
        .calibration()
        .ok_or_else(|| eyre::eyre!("calibration produced no report"))?
        .into();
    nav.halt()?;
    if let Some(path) = out {
        tracer_config::write_calibration_csv(path, &table)?;
        tracing::info!(path = %path.display(), "calibration written");
    }
    Ok(table)
}

/// Bring the collaborators up, announce readiness and stop the drive.
pub fn self_check(cfg: &Config) -> Result<()> {
    let mut rig = make_rig(cfg, None, false)?;
    rig.nav.begin()?;
    rig.nav.halt()?;
    Ok(())
}
