#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and calibration-report persistence for the line tracer.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Calibration reports are stored as CSV with a strict `sensor,min,max`
//!   header, one row per sensor channel.
use serde::{Deserialize, Serialize};

/// Number of channels in the sensor array (mirrors `tracer_traits::SENSOR_COUNT`).
pub const SENSOR_COUNT: usize = 5;

#[derive(Debug, Deserialize)]
pub struct Pins {
    /// Line sensor inputs, leftmost first
    pub sensors: [u8; SENSOR_COUNT],
    pub left_forward: u8,
    pub left_backward: u8,
    pub right_forward: u8,
    pub right_backward: u8,
    pub encoder_left: Option<u8>,
    pub encoder_right: Option<u8>,
    pub button: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub struct RunnerCfg {
    /// Control tick rate in Hz
    pub tick_hz: u32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SpeedCfg {
    pub base_speed: i32,
    pub min_speed: i32,
    pub max_speed: i32,
    /// Increment applied by increase/decrease speed commands
    pub speed_step: i32,
    /// Fixed pivot speed used for turns and search sweeps
    pub turn_speed: i32,
    /// Multiplier from commanded speed to PWM duty (motor headroom)
    pub duty_scale: f32,
}

impl Default for SpeedCfg {
    fn default() -> Self {
        Self {
            base_speed: 150,
            min_speed: 60,
            max_speed: 255,
            speed_step: 10,
            turn_speed: 120,
            duty_scale: 0.8,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PidCfg {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    /// Gains of the integral-free law used between the smooth and pivot thresholds
    pub aggressive_kp: f32,
    pub aggressive_kd: f32,
}

impl Default for PidCfg {
    fn default() -> Self {
        Self {
            kp: 25.0,
            ki: 0.5,
            kd: 15.0,
            aggressive_kp: 45.0,
            aggressive_kd: 25.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// |error| below this uses the smooth PID law
    pub smooth: f32,
    /// |error| at or above this abandons continuous correction for a pivot
    pub pivot: f32,
    /// |position| at or below this counts as "centered" when ending a turn
    pub center_tolerance: f32,
    /// Remembered |position| at or above this is treated as a missed sharp turn
    pub overshoot: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            smooth: 1.0,
            pivot: 2.5,
            center_tolerance: 1.0,
            overshoot: 2.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MemoryCfg {
    /// Remembered positions older than this are never used
    pub timeout_ms: u64,
    /// Minimum loss duration before an overshoot is confirmed
    pub overshoot_confirm_ms: u64,
    /// Fraction of base speed shed linearly over the memory window (0 disables)
    pub slowdown: f32,
    /// Reverse bias applied to the inner wheel while steering from memory
    pub reverse_bias: i32,
}

impl Default for MemoryCfg {
    fn default() -> Self {
        Self {
            timeout_ms: 250,
            overshoot_confirm_ms: 60,
            slowdown: 0.5,
            reverse_bias: 40,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TurnCfg {
    /// Rotation requested by a discrete pivot
    pub degrees: f32,
    /// Blocking pause between stopping and reversing a wheel
    pub settle_ms: u64,
    /// Time spent stopped in WAITING_FOR_TURN before searching
    pub wait_ms: u64,
    /// Time-gated pivot completion when odometry is absent
    pub ms_per_degree: f32,
}

impl Default for TurnCfg {
    fn default() -> Self {
        Self {
            degrees: 90.0,
            settle_ms: 50,
            wait_ms: 200,
            ms_per_degree: 4.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SearchCfg {
    /// Total sweep time before declaring the line lost
    pub timeout_ms: u64,
}

impl Default for SearchCfg {
    fn default() -> Self {
        Self { timeout_ms: 3000 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EstimatorCfg {
    /// Per-sensor weights, leftmost first; must be antisymmetric and increasing
    pub weights: [f32; SENSOR_COUNT],
}

impl Default for EstimatorCfg {
    fn default() -> Self {
        Self {
            weights: [-3.0, -1.0, 0.0, 1.0, 3.0],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationCfg {
    pub window_ms: u64,
    pub sample_interval_ms: u64,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            window_ms: 5000,
            sample_interval_ms: 50,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OdometryCfg {
    pub enabled: bool,
    pub wheel_diameter_mm: f32,
    pub ticks_per_rev: u32,
    pub wheel_base_mm: f32,
    pub update_interval_ms: u64,
    /// Encoder debounce window; 0 counts every rising edge
    pub debounce_ms: u64,
}

impl Default for OdometryCfg {
    fn default() -> Self {
        Self {
            enabled: false,
            wheel_diameter_mm: 65.0,
            ticks_per_rev: 20,
            wheel_base_mm: 125.0,
            update_interval_ms: 100,
            debounce_ms: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ButtonCfg {
    pub debounce_ms: u64,
    /// Presses shorter than this are ignored
    pub min_press_ms: u64,
    /// Treat low level as pressed when true
    pub active_low: bool,
}

impl Default for ButtonCfg {
    fn default() -> Self {
        Self {
            debounce_ms: 150,
            min_press_ms: 50,
            active_low: true,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Hardware {
    pub pwm_frequency_hz: f64,
    /// Sensors pull low over the dark line (TCRT5000 modules)
    pub sensors_active_low: bool,
}

impl Default for Hardware {
    fn default() -> Self {
        Self {
            pwm_frequency_hz: 1000.0,
            sensors_active_low: true,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub pins: Pins,
    pub runner: RunnerCfg,
    #[serde(default)]
    pub speed: SpeedCfg,
    #[serde(default)]
    pub pid: PidCfg,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub memory: MemoryCfg,
    #[serde(default)]
    pub turn: TurnCfg,
    #[serde(default)]
    pub search: SearchCfg,
    #[serde(default)]
    pub estimator: EstimatorCfg,
    #[serde(default)]
    pub calibration: CalibrationCfg,
    #[serde(default)]
    pub odometry: OdometryCfg,
    #[serde(default)]
    pub button: ButtonCfg,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub hardware: Hardware,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Runner
        if self.runner.tick_hz == 0 {
            eyre::bail!("runner.tick_hz must be > 0");
        }
        if self.runner.tick_hz > 10_000 {
            eyre::bail!("runner.tick_hz is unreasonably large (>10kHz)");
        }

        // Speed
        let s = &self.speed;
        if s.max_speed <= 0 || s.max_speed > i32::from(u16::MAX) {
            eyre::bail!("speed.max_speed must be in [1, 65535]");
        }
        if s.min_speed < 0 {
            eyre::bail!("speed.min_speed must be >= 0");
        }
        if s.min_speed > s.max_speed {
            eyre::bail!("speed.min_speed must be <= speed.max_speed");
        }
        if s.base_speed < s.min_speed || s.base_speed > s.max_speed {
            eyre::bail!("speed.base_speed must be within [min_speed, max_speed]");
        }
        if s.speed_step <= 0 {
            eyre::bail!("speed.speed_step must be > 0");
        }
        if s.turn_speed <= 0 || s.turn_speed > s.max_speed {
            eyre::bail!("speed.turn_speed must be in (0, max_speed]");
        }
        if !(s.duty_scale > 0.0 && s.duty_scale <= 1.0) {
            eyre::bail!("speed.duty_scale must be in (0.0, 1.0]");
        }

        // PID
        let p = &self.pid;
        for (name, v) in [
            ("pid.kp", p.kp),
            ("pid.ki", p.ki),
            ("pid.kd", p.kd),
            ("pid.aggressive_kp", p.aggressive_kp),
            ("pid.aggressive_kd", p.aggressive_kd),
        ] {
            if !v.is_finite() || v < 0.0 {
                eyre::bail!("{name} must be finite and >= 0");
            }
        }

        // Thresholds
        let t = &self.thresholds;
        if !(t.smooth > 0.0) {
            eyre::bail!("thresholds.smooth must be > 0");
        }
        if !(t.pivot > t.smooth) {
            eyre::bail!("thresholds.pivot must be > thresholds.smooth");
        }
        if !(t.center_tolerance >= 0.0) {
            eyre::bail!("thresholds.center_tolerance must be >= 0");
        }
        if !(t.overshoot > 0.0) {
            eyre::bail!("thresholds.overshoot must be > 0");
        }

        // Memory
        if self.memory.timeout_ms == 0 {
            eyre::bail!("memory.timeout_ms must be >= 1");
        }
        if !(0.0..=1.0).contains(&self.memory.slowdown) {
            eyre::bail!("memory.slowdown must be in [0.0, 1.0]");
        }
        if self.memory.reverse_bias < 0 {
            eyre::bail!("memory.reverse_bias must be >= 0");
        }

        // Turn
        if !(self.turn.degrees > 0.0 && self.turn.degrees <= 360.0) {
            eyre::bail!("turn.degrees must be in (0, 360]");
        }
        if self.turn.settle_ms > 1000 {
            eyre::bail!("turn.settle_ms is unreasonably large (>1s)");
        }
        if !(self.turn.ms_per_degree > 0.0) {
            eyre::bail!("turn.ms_per_degree must be > 0");
        }

        // Search
        if self.search.timeout_ms < 2 {
            eyre::bail!("search.timeout_ms must be >= 2");
        }

        // Estimator
        let w = &self.estimator.weights;
        if w.iter().any(|v| !v.is_finite()) {
            eyre::bail!("estimator.weights must be finite");
        }
        if w[SENSOR_COUNT / 2] != 0.0 {
            eyre::bail!("estimator.weights center weight must be 0");
        }
        for i in 0..SENSOR_COUNT {
            if w[i] != -w[SENSOR_COUNT - 1 - i] {
                eyre::bail!("estimator.weights must be antisymmetric");
            }
        }
        if w.windows(2).any(|p| p[0] >= p[1]) {
            eyre::bail!("estimator.weights must be strictly increasing");
        }

        // Calibration
        if self.calibration.sample_interval_ms == 0 {
            eyre::bail!("calibration.sample_interval_ms must be >= 1");
        }
        if self.calibration.window_ms > 60_000 {
            eyre::bail!("calibration.window_ms is unreasonably large (>60s)");
        }

        // Odometry
        let o = &self.odometry;
        if o.enabled {
            if self.pins.encoder_left.is_none() || self.pins.encoder_right.is_none() {
                eyre::bail!("odometry.enabled requires pins.encoder_left and pins.encoder_right");
            }
            if !(o.wheel_diameter_mm > 0.0) || !(o.wheel_base_mm > 0.0) {
                eyre::bail!("odometry wheel geometry must be > 0");
            }
            if o.ticks_per_rev == 0 {
                eyre::bail!("odometry.ticks_per_rev must be >= 1");
            }
            if o.update_interval_ms == 0 {
                eyre::bail!("odometry.update_interval_ms must be >= 1");
            }
        }

        // Hardware
        if !(self.hardware.pwm_frequency_hz > 0.0) {
            eyre::bail!("hardware.pwm_frequency_hz must be > 0");
        }

        Ok(())
    }
}

/// One persisted row of a calibration report.
///
/// Expected headers:
/// sensor,min,max
///
/// Example:
/// sensor,min,max
/// 1,0,1
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationRow {
    /// 1-based channel number, leftmost first
    pub sensor: u8,
    pub min: u16,
    pub max: u16,
}

/// Per-channel observed sensor range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationTable {
    pub min: [u16; SENSOR_COUNT],
    pub max: [u16; SENSOR_COUNT],
}

impl CalibrationTable {
    /// Build from rows; every channel must appear exactly once with min <= max.
    pub fn from_rows(rows: &[CalibrationRow]) -> eyre::Result<Self> {
        if rows.len() != SENSOR_COUNT {
            eyre::bail!(
                "calibration requires exactly {SENSOR_COUNT} rows, got {}",
                rows.len()
            );
        }
        let mut seen = [false; SENSOR_COUNT];
        let mut min = [0u16; SENSOR_COUNT];
        let mut max = [0u16; SENSOR_COUNT];
        for row in rows {
            let idx = usize::from(row.sensor);
            if idx == 0 || idx > SENSOR_COUNT {
                eyre::bail!("calibration sensor {} out of range 1..={SENSOR_COUNT}", row.sensor);
            }
            let i = idx - 1;
            if seen[i] {
                eyre::bail!("calibration sensor {} listed twice", row.sensor);
            }
            if row.min > row.max {
                eyre::bail!(
                    "calibration sensor {}: min {} exceeds max {}",
                    row.sensor,
                    row.min,
                    row.max
                );
            }
            seen[i] = true;
            min[i] = row.min;
            max[i] = row.max;
        }
        Ok(Self { min, max })
    }

    pub fn rows(&self) -> Vec<CalibrationRow> {
        (0..SENSOR_COUNT)
            .map(|i| CalibrationRow {
                sensor: (i + 1) as u8,
                min: self.min[i],
                max: self.max[i],
            })
            .collect()
    }
}

pub fn load_calibration_csv(path: &std::path::Path) -> eyre::Result<CalibrationTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open calibration CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["sensor", "min", "max"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "calibration CSV must have headers 'sensor,min,max', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<CalibrationRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }

    CalibrationTable::from_rows(&rows)
}

pub fn write_calibration_csv(path: &std::path::Path, table: &CalibrationTable) -> eyre::Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|e| eyre::eyre!("create calibration CSV {:?}: {}", path, e))?;
    for row in table.rows() {
        wtr.serialize(row)
            .map_err(|e| eyre::eyre!("write calibration CSV {:?}: {}", path, e))?;
    }
    wtr.flush()
        .map_err(|e| eyre::eyre!("flush calibration CSV {:?}: {}", path, e))?;
    Ok(())
}
