//! Wheel odometry from two encoder edge inputs.
//!
//! The edge context only ever calls `EdgeTable::dispatch` with the handles
//! returned by `register_encoders`; everything here runs on the control tick.

use std::f32::consts::PI;
use std::sync::Arc;

use crate::config::OdometryCfg;
use crate::edge::{EdgeConfig, EdgeHandle, EdgeTable};
use crate::error::NavError;

/// Register left and right encoder counters in `table`.
pub fn register_encoders(
    table: &mut EdgeTable,
    cfg: &OdometryCfg,
) -> Result<(EdgeHandle, EdgeHandle), NavError> {
    let left = table.register(EdgeConfig::counter(cfg.debounce_ms))?;
    let right = table.register(EdgeConfig::counter(cfg.debounce_ms))?;
    Ok((left, right))
}

#[derive(Debug)]
pub struct Odometry {
    table: Arc<EdgeTable>,
    left: EdgeHandle,
    right: EdgeHandle,
    cfg: OdometryCfg,
    mm_per_tick: f32,
    left_total: u64,
    right_total: u64,
    left_speed: f32,
    right_speed: f32,
    last_update_ms: u64,
}

impl Odometry {
    pub fn new(
        table: Arc<EdgeTable>,
        left: EdgeHandle,
        right: EdgeHandle,
        cfg: OdometryCfg,
    ) -> Result<Self, NavError> {
        table.input(left)?;
        table.input(right)?;
        if cfg.ticks_per_rev == 0 {
            return Err(NavError::Config("odometry ticks_per_rev must be >= 1".into()));
        }
        let mm_per_tick = PI * cfg.wheel_diameter_mm / cfg.ticks_per_rev as f32;
        Ok(Self {
            table,
            left,
            right,
            cfg,
            mm_per_tick,
            left_total: 0,
            right_total: 0,
            left_speed: 0.0,
            right_speed: 0.0,
            last_update_ms: 0,
        })
    }

    fn drain(&self, handle: EdgeHandle) -> u64 {
        self.table
            .input(handle)
            .map_or(0, |i| u64::from(i.take_ticks()))
    }

    fn peek(&self, handle: EdgeHandle) -> u64 {
        self.table
            .input(handle)
            .map_or(0, |i| u64::from(i.pending_ticks()))
    }

    /// Drain raw counts into lifetime totals and recompute speeds, at most once
    /// per `update_interval_ms`. Returns whether an update happened.
    pub fn update(&mut self, now_ms: u64) -> bool {
        let elapsed = now_ms.saturating_sub(self.last_update_ms);
        if elapsed < self.cfg.update_interval_ms {
            return false;
        }
        let l = self.drain(self.left);
        let r = self.drain(self.right);
        let secs = elapsed as f32 / 1000.0;
        if secs > 0.0 {
            self.left_speed = l as f32 * self.mm_per_tick / secs;
            self.right_speed = r as f32 * self.mm_per_tick / secs;
        }
        self.left_total += l;
        self.right_total += r;
        self.last_update_ms = now_ms;
        tracing::trace!(
            left_ticks = l,
            right_ticks = r,
            left_mm_s = self.left_speed,
            right_mm_s = self.right_speed,
            "odometry update"
        );
        true
    }

    /// Lifetime ticks per wheel, including counts not yet drained by `update`.
    pub fn ticks(&self) -> (u64, u64) {
        (
            self.left_total + self.peek(self.left),
            self.right_total + self.peek(self.right),
        )
    }

    /// Zero raw and lifetime counters. The raw side is a swap, so edges racing
    /// with the reset are either counted before it or after it, never both.
    pub fn reset_ticks(&mut self) {
        self.drain(self.left);
        self.drain(self.right);
        self.left_total = 0;
        self.right_total = 0;
    }

    /// mm/s over the last update interval.
    pub fn left_speed(&self) -> f32 {
        self.left_speed
    }

    pub fn right_speed(&self) -> f32 {
        self.right_speed
    }

    pub fn mm_per_tick(&self) -> f32 {
        self.mm_per_tick
    }

    /// Ticks each wheel travels during an in-place pivot of `degrees`.
    pub fn ticks_for_pivot(&self, degrees: f32) -> u64 {
        let arc_mm = PI * self.cfg.wheel_base_mm * degrees.abs() / 360.0;
        (arc_mm / self.mm_per_tick).ceil() as u64
    }

    pub fn handles(&self) -> (EdgeHandle, EdgeHandle) {
        (self.left, self.right)
    }

    pub fn table(&self) -> &Arc<EdgeTable> {
        &self.table
    }
}
