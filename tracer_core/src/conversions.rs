//! `From` implementations bridging `tracer_config` types to `tracer_core` types.

use crate::config::{
    CalibrationCfg, MemoryCfg, NavigatorCfg, OdometryCfg, PidCfg, SpeedCfg, Thresholds, TurnCfg,
};
use crate::edge::EdgeConfig;
use crate::estimator::CalibrationReport;
use crate::pid::PidGains;

// ── SpeedCfg ─────────────────────────────────────────────────────────────────

impl From<&tracer_config::SpeedCfg> for SpeedCfg {
    fn from(c: &tracer_config::SpeedCfg) -> Self {
        Self {
            base_speed: c.base_speed,
            min_speed: c.min_speed,
            max_speed: c.max_speed,
            speed_step: c.speed_step,
            turn_speed: c.turn_speed,
            duty_scale: c.duty_scale,
        }
    }
}

// ── PidCfg ───────────────────────────────────────────────────────────────────

impl From<&tracer_config::PidCfg> for PidCfg {
    fn from(c: &tracer_config::PidCfg) -> Self {
        Self {
            smooth: PidGains {
                kp: c.kp,
                ki: c.ki,
                kd: c.kd,
            },
            aggressive_kp: c.aggressive_kp,
            aggressive_kd: c.aggressive_kd,
        }
    }
}

// ── Thresholds / memory / turn ───────────────────────────────────────────────

impl From<&tracer_config::Thresholds> for Thresholds {
    fn from(c: &tracer_config::Thresholds) -> Self {
        Self {
            smooth: c.smooth,
            pivot: c.pivot,
            center_tolerance: c.center_tolerance,
            overshoot: c.overshoot,
        }
    }
}

impl From<&tracer_config::MemoryCfg> for MemoryCfg {
    fn from(c: &tracer_config::MemoryCfg) -> Self {
        Self {
            timeout_ms: c.timeout_ms,
            overshoot_confirm_ms: c.overshoot_confirm_ms,
            slowdown: c.slowdown,
            reverse_bias: c.reverse_bias,
        }
    }
}

impl From<&tracer_config::TurnCfg> for TurnCfg {
    fn from(c: &tracer_config::TurnCfg) -> Self {
        Self {
            degrees: c.degrees,
            settle_ms: c.settle_ms,
            wait_ms: c.wait_ms,
            ms_per_degree: c.ms_per_degree,
        }
    }
}

impl From<&tracer_config::CalibrationCfg> for CalibrationCfg {
    fn from(c: &tracer_config::CalibrationCfg) -> Self {
        Self {
            window_ms: c.window_ms,
            sample_interval_ms: c.sample_interval_ms,
        }
    }
}

// ── Whole navigator ──────────────────────────────────────────────────────────

impl From<&tracer_config::Config> for NavigatorCfg {
    fn from(c: &tracer_config::Config) -> Self {
        Self {
            speed: (&c.speed).into(),
            pid: (&c.pid).into(),
            thresholds: (&c.thresholds).into(),
            memory: (&c.memory).into(),
            turn: (&c.turn).into(),
            search_timeout_ms: c.search.timeout_ms,
            weights: c.estimator.weights,
            calibration: (&c.calibration).into(),
        }
    }
}

// ── Edge inputs ──────────────────────────────────────────────────────────────

impl From<&tracer_config::OdometryCfg> for OdometryCfg {
    fn from(c: &tracer_config::OdometryCfg) -> Self {
        Self {
            wheel_diameter_mm: c.wheel_diameter_mm,
            ticks_per_rev: c.ticks_per_rev,
            wheel_base_mm: c.wheel_base_mm,
            update_interval_ms: c.update_interval_ms,
            debounce_ms: c.debounce_ms,
        }
    }
}

impl From<&tracer_config::ButtonCfg> for EdgeConfig {
    fn from(c: &tracer_config::ButtonCfg) -> Self {
        EdgeConfig::one_shot(c.debounce_ms).with_min_press(c.min_press_ms)
    }
}

// ── Calibration report ───────────────────────────────────────────────────────

impl From<&CalibrationReport> for tracer_config::CalibrationTable {
    fn from(r: &CalibrationReport) -> Self {
        Self {
            min: r.min,
            max: r.max,
        }
    }
}
