//! Runtime configuration for the navigation engine.
//!
//! These are separate from the TOML-deserialized structs in `tracer_config`;
//! `conversions` bridges the two.

use tracer_traits::SENSOR_COUNT;

use crate::pid::PidGains;

/// Default estimator weights, leftmost sensor first.
pub const DEFAULT_WEIGHTS: [f32; SENSOR_COUNT] = [-3.0, -1.0, 0.0, 1.0, 3.0];

#[derive(Debug, Clone)]
pub struct SpeedCfg {
    pub base_speed: i32,
    pub min_speed: i32,
    pub max_speed: i32,
    pub speed_step: i32,
    pub turn_speed: i32,
    /// Commanded speed to PWM duty multiplier.
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

/// Gains for both correction laws.
#[derive(Debug, Clone)]
pub struct PidCfg {
    pub smooth: PidGains,
    /// Integral-free gains used between the smooth and pivot thresholds.
    pub aggressive_kp: f32,
    pub aggressive_kd: f32,
}

impl Default for PidCfg {
    fn default() -> Self {
        Self {
            smooth: PidGains::default(),
            aggressive_kp: 45.0,
            aggressive_kd: 25.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Thresholds {
    pub smooth: f32,
    pub pivot: f32,
    pub center_tolerance: f32,
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

#[derive(Debug, Clone)]
pub struct MemoryCfg {
    pub timeout_ms: u64,
    pub overshoot_confirm_ms: u64,
    /// Fraction of base speed shed by the end of the memory window.
    pub slowdown: f32,
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

#[derive(Debug, Clone)]
pub struct TurnCfg {
    pub degrees: f32,
    pub settle_ms: u64,
    pub wait_ms: u64,
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

impl TurnCfg {
    /// Time gate for a pivot of `degrees` when no odometry is available.
    pub fn time_gate_ms(&self, degrees: f32) -> u64 {
        (self.ms_per_degree * degrees.abs()).ceil() as u64
    }
}

#[derive(Debug, Clone)]
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

#[derive(Debug, Clone)]
pub struct OdometryCfg {
    pub wheel_diameter_mm: f32,
    pub ticks_per_rev: u32,
    pub wheel_base_mm: f32,
    pub update_interval_ms: u64,
    /// 0 counts every rising edge.
    pub debounce_ms: u64,
}

impl Default for OdometryCfg {
    fn default() -> Self {
        Self {
            wheel_diameter_mm: 65.0,
            ticks_per_rev: 20,
            wheel_base_mm: 125.0,
            update_interval_ms: 100,
            debounce_ms: 0,
        }
    }
}

/// Everything the navigator needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct NavigatorCfg {
    pub speed: SpeedCfg,
    pub pid: PidCfg,
    pub thresholds: Thresholds,
    pub memory: MemoryCfg,
    pub turn: TurnCfg,
    pub search_timeout_ms: u64,
    pub weights: [f32; SENSOR_COUNT],
    pub calibration: CalibrationCfg,
}

impl Default for NavigatorCfg {
    fn default() -> Self {
        Self {
            speed: SpeedCfg::default(),
            pid: PidCfg::default(),
            thresholds: Thresholds::default(),
            memory: MemoryCfg::default(),
            turn: TurnCfg::default(),
            search_timeout_ms: 3000,
            weights: DEFAULT_WEIGHTS,
            calibration: CalibrationCfg::default(),
        }
    }
}
