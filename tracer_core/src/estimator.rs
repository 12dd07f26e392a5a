//! Weighted line-position estimate with short-term memory.
//!
//! Positions are signed offsets of the line from the array center: negative
//! means the line is to the left, positive to the right. `None` means no
//! sensor saw the line this tick.

use tracer_traits::{Clock, LineSensors, SENSOR_COUNT, SensorFrame};

use crate::config::{CalibrationCfg, DEFAULT_WEIGHTS};
use crate::error::Result;
use crate::hw_error;
use eyre::WrapErr;
use std::time::Duration;

/// Depth of the recent-position ring buffer.
pub const MEMORY_DEPTH: usize = 5;

const CENTER: usize = SENSOR_COUNT / 2;

#[derive(Debug, Clone)]
pub struct PositionEstimator {
    weights: [f32; SENSOR_COUNT],
    ring: [f32; MEMORY_DEPTH],
    // index of the next write
    head: usize,
    len: usize,
    last_position: Option<f32>,
    last_timestamp_ms: u64,
}

impl Default for PositionEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_WEIGHTS)
    }
}

impl PositionEstimator {
    pub fn new(weights: [f32; SENSOR_COUNT]) -> Self {
        Self {
            weights,
            ring: [0.0; MEMORY_DEPTH],
            head: 0,
            len: 0,
            last_position: None,
            last_timestamp_ms: 0,
        }
    }

    pub fn weights(&self) -> [f32; SENSOR_COUNT] {
        self.weights
    }

    /// Position for `frame` without touching memory.
    pub fn position_of(&self, frame: SensorFrame) -> Option<f32> {
        let count = frame.active_count();
        if count == 0 {
            return None;
        }
        // A line straddling the center sensor trips only its two neighbours.
        // Validated weights are antisymmetric, so this only changes hand-built estimators.
        if count == 2 && frame.is_active(CENTER - 1) && frame.is_active(CENTER + 1) {
            return Some(0.0);
        }
        let sum: f32 = frame
            .channels()
            .iter()
            .zip(self.weights.iter())
            .filter(|(active, _)| **active)
            .map(|(_, w)| *w)
            .sum();
        Some(sum / count as f32)
    }

    /// Estimate the position and remember it when the line is visible.
    pub fn estimate(&mut self, frame: SensorFrame, now_ms: u64) -> Option<f32> {
        let position = self.position_of(frame)?;
        self.last_position = Some(position);
        self.last_timestamp_ms = now_ms;
        self.ring[self.head] = position;
        self.head = (self.head + 1) % MEMORY_DEPTH;
        self.len = (self.len + 1).min(MEMORY_DEPTH);
        Some(position)
    }

    pub fn last_known_position(&self) -> Option<f32> {
        self.last_position
    }

    pub fn last_known_timestamp(&self) -> Option<u64> {
        self.last_position.map(|_| self.last_timestamp_ms)
    }

    /// Remembered position and its age, only if younger than `timeout_ms`.
    pub fn recent(&self, now_ms: u64, timeout_ms: u64) -> Option<(f32, u64)> {
        let position = self.last_position?;
        let age = now_ms.saturating_sub(self.last_timestamp_ms);
        (age < timeout_ms).then_some((position, age))
    }

    fn oldest_index(&self) -> usize {
        (self.head + MEMORY_DEPTH - self.len) % MEMORY_DEPTH
    }

    fn newest_index(&self) -> usize {
        (self.head + MEMORY_DEPTH - 1) % MEMORY_DEPTH
    }

    /// Newest minus oldest remembered position; 0 with fewer than two samples.
    pub fn trend(&self) -> f32 {
        if self.len < 2 {
            return 0.0;
        }
        self.ring[self.newest_index()] - self.ring[self.oldest_index()]
    }

    /// Mean of the remembered positions; 0 when empty.
    pub fn average(&self) -> f32 {
        if self.len == 0 {
            return 0.0;
        }
        let start = self.oldest_index();
        let sum: f32 = (0..self.len)
            .map(|i| self.ring[(start + i) % MEMORY_DEPTH])
            .sum();
        sum / self.len as f32
    }

    pub fn memory_len(&self) -> usize {
        self.len
    }

    pub fn reset_memory(&mut self) {
        self.ring = [0.0; MEMORY_DEPTH];
        self.head = 0;
        self.len = 0;
        self.last_position = None;
        self.last_timestamp_ms = 0;
    }
}

/// Per-channel sensor range observed during calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationReport {
    pub min: [u16; SENSOR_COUNT],
    pub max: [u16; SENSOR_COUNT],
    pub samples: u32,
}

impl CalibrationReport {
    /// `max - min` per channel; a zero span means the channel never changed.
    pub fn span(&self) -> [u16; SENSOR_COUNT] {
        std::array::from_fn(|i| self.max[i].saturating_sub(self.min[i]))
    }
}

/// Blocking calibration: sample raw levels every `sample_interval_ms` for
/// `window_ms`, tracking per-channel extremes. Takes at least one sample.
pub fn calibrate<S>(sensors: &mut S, clock: &dyn Clock, cfg: &CalibrationCfg) -> Result<CalibrationReport>
where
    S: LineSensors + ?Sized,
{
    let mut min = [u16::MAX; SENSOR_COUNT];
    let mut max = [0u16; SENSOR_COUNT];
    let mut samples = 0u32;
    let interval = Duration::from_millis(cfg.sample_interval_ms.max(1));
    let start = clock.now();
    tracing::info!(window_ms = cfg.window_ms, "calibration started");

    loop {
        let levels = sensors
            .read_levels()
            .map_err(|e| hw_error::report(&*e))
            .wrap_err("calibration sample")?;
        for (i, v) in levels.iter().enumerate() {
            min[i] = min[i].min(*v);
            max[i] = max[i].max(*v);
        }
        samples += 1;
        clock.sleep(interval);
        if clock.ms_since(start) >= cfg.window_ms {
            break;
        }
    }

    let report = CalibrationReport { min, max, samples };
    for i in 0..SENSOR_COUNT {
        tracing::info!(sensor = i + 1, min = min[i], max = max[i], "calibration range");
    }
    tracing::info!(samples, "calibration complete");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(bits: [u8; 5]) -> SensorFrame {
        SensorFrame::from_bits(bits)
    }

    #[test]
    fn ring_wraps_and_keeps_newest() {
        let mut e = PositionEstimator::default();
        for (t, bits) in [
            [1, 0, 0, 0, 0],
            [0, 1, 0, 0, 0],
            [0, 0, 1, 0, 0],
            [0, 0, 0, 1, 0],
            [0, 0, 0, 0, 1],
            [0, 0, 0, 0, 1],
        ]
        .into_iter()
        .enumerate()
        {
            e.estimate(f(bits), t as u64);
        }
        assert_eq!(e.memory_len(), MEMORY_DEPTH);
        // oldest is now -1.0 (the -3.0 entry was overwritten)
        assert_eq!(e.trend(), 3.0 - (-1.0));
        assert!((e.average() - (-1.0 + 0.0 + 1.0 + 3.0 + 3.0) / 5.0).abs() < 1e-6);
    }

    #[test]
    fn trend_needs_two_samples() {
        let mut e = PositionEstimator::default();
        assert_eq!(e.trend(), 0.0);
        e.estimate(f([0, 0, 0, 1, 0]), 0);
        assert_eq!(e.trend(), 0.0);
    }
}
