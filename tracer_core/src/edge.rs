//! Debounced digital inputs shared between the edge context and the control tick.
//!
//! Every field is an atomic. The edge side (`on_edge`, `on_level`) performs a
//! window comparison and one or two atomic stores; it never locks, allocates,
//! loops or touches floating point. The periodic side drains with swaps.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::error::NavError;

const NEVER: u64 = u64::MAX;

/// Number of edge inputs an `EdgeTable` can hold (two encoders, one button, one spare).
pub const EDGE_TABLE_CAPACITY: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeMode {
    /// Each accepted edge increments a tick counter.
    Counter,
    /// Each accepted edge raises a one-shot flag consumed by `poll_and_reset`.
    OneShot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeConfig {
    pub mode: EdgeMode,
    /// Edges closer than this to the last accepted one are discarded (0 accepts all).
    pub debounce_ms: u64,
    /// Minimum held duration for a level-tracked press to count.
    pub min_press_ms: u64,
}

impl EdgeConfig {
    pub const fn counter(debounce_ms: u64) -> Self {
        Self {
            mode: EdgeMode::Counter,
            debounce_ms,
            min_press_ms: 0,
        }
    }

    pub const fn one_shot(debounce_ms: u64) -> Self {
        Self {
            mode: EdgeMode::OneShot,
            debounce_ms,
            min_press_ms: 0,
        }
    }

    pub const fn with_min_press(mut self, min_press_ms: u64) -> Self {
        self.min_press_ms = min_press_ms;
        self
    }
}

#[derive(Debug)]
pub struct DebouncedEdgeInput {
    cfg: EdgeConfig,
    last_accepted_ms: AtomicU64,
    ticks: AtomicU32,
    activated: AtomicBool,
    held: AtomicBool,
    press_start_ms: AtomicU64,
    presses: AtomicU32,
}

impl DebouncedEdgeInput {
    pub fn new(cfg: EdgeConfig) -> Self {
        Self {
            cfg,
            last_accepted_ms: AtomicU64::new(NEVER),
            ticks: AtomicU32::new(0),
            activated: AtomicBool::new(false),
            held: AtomicBool::new(false),
            press_start_ms: AtomicU64::new(0),
            presses: AtomicU32::new(0),
        }
    }

    pub fn config(&self) -> EdgeConfig {
        self.cfg
    }

    #[inline]
    fn within_window(&self, now_ms: u64, last: u64) -> bool {
        last != NEVER && now_ms.saturating_sub(last) < self.cfg.debounce_ms
    }

    /// Claim the debounce window for an edge at `now_ms`.
    ///
    /// With a zero window every edge is accepted without contention; otherwise a
    /// single compare-exchange decides which of several racing edges wins.
    #[inline]
    fn accept(&self, now_ms: u64) -> bool {
        if self.cfg.debounce_ms == 0 {
            return true;
        }
        let last = self.last_accepted_ms.load(Ordering::Acquire);
        if self.within_window(now_ms, last) {
            return false;
        }
        self.last_accepted_ms
            .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Raw transition from the edge context. Returns whether the edge was accepted.
    #[inline]
    pub fn on_edge(&self, now_ms: u64) -> bool {
        if !self.accept(now_ms) {
            return false;
        }
        match self.cfg.mode {
            EdgeMode::Counter => {
                self.ticks.fetch_add(1, Ordering::AcqRel);
            }
            EdgeMode::OneShot => self.activated.store(true, Ordering::Release),
        }
        true
    }

    /// Level change from the edge context (`active` = pressed).
    ///
    /// A press records its start; a release that follows a press of at least
    /// `min_press_ms` raises the one-shot and bumps the press count. Repeated
    /// levels without a state change are ignored and do not claim the window.
    #[inline]
    pub fn on_level(&self, now_ms: u64, active: bool) -> bool {
        let last = self.last_accepted_ms.load(Ordering::Acquire);
        if self.within_window(now_ms, last) {
            return false;
        }
        if active {
            if self.held.swap(true, Ordering::AcqRel) {
                return false;
            }
            self.press_start_ms.store(now_ms, Ordering::Release);
        } else {
            if !self.held.swap(false, Ordering::AcqRel) {
                return false;
            }
            let start = self.press_start_ms.load(Ordering::Acquire);
            if now_ms.saturating_sub(start) >= self.cfg.min_press_ms {
                self.presses.fetch_add(1, Ordering::AcqRel);
                self.activated.store(true, Ordering::Release);
            }
        }
        self.last_accepted_ms.store(now_ms, Ordering::Release);
        true
    }

    /// Read and clear the one-shot flag. Each activation is observed exactly once.
    #[inline]
    pub fn poll_and_reset(&self) -> bool {
        self.activated.swap(false, Ordering::AcqRel)
    }

    /// Drain the tick counter.
    #[inline]
    pub fn take_ticks(&self) -> u32 {
        self.ticks.swap(0, Ordering::AcqRel)
    }

    /// Peek at the tick counter without draining it.
    #[inline]
    pub fn pending_ticks(&self) -> u32 {
        self.ticks.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    #[inline]
    pub fn press_count(&self) -> u32 {
        self.presses.load(Ordering::Acquire)
    }
}

/// Opaque token binding an edge source to its slot in an `EdgeTable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeHandle(u8);

impl EdgeHandle {
    #[inline]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

/// Fixed-capacity registry of edge inputs.
///
/// Slots are registered during bring-up through `&mut self`; the table is then
/// frozen in an `Arc` and shared with whatever delivers interrupts.
#[derive(Debug)]
pub struct EdgeTable {
    slots: [Option<DebouncedEdgeInput>; EDGE_TABLE_CAPACITY],
}

impl Default for EdgeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl EdgeTable {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }

    pub fn register(&mut self, cfg: EdgeConfig) -> Result<EdgeHandle, NavError> {
        let (idx, slot) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, s)| s.is_none())
            .ok_or(NavError::EdgeTableFull)?;
        *slot = Some(DebouncedEdgeInput::new(cfg));
        let handle = EdgeHandle(idx as u8);
        tracing::debug!(slot = idx, mode = ?cfg.mode, debounce_ms = cfg.debounce_ms, "edge input registered");
        Ok(handle)
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    #[inline]
    fn slot(&self, handle: EdgeHandle) -> Option<&DebouncedEdgeInput> {
        self.slots.get(handle.index()).and_then(Option::as_ref)
    }

    /// Route a raw edge to its input. Unknown handles are dropped.
    #[inline]
    pub fn dispatch(&self, handle: EdgeHandle, now_ms: u64) -> bool {
        self.slot(handle).is_some_and(|s| s.on_edge(now_ms))
    }

    /// Route a level change to its input. Unknown handles are dropped.
    #[inline]
    pub fn dispatch_level(&self, handle: EdgeHandle, now_ms: u64, active: bool) -> bool {
        self.slot(handle)
            .is_some_and(|s| s.on_level(now_ms, active))
    }

    pub fn input(&self, handle: EdgeHandle) -> Result<&DebouncedEdgeInput, NavError> {
        self.slot(handle)
            .ok_or(NavError::UnknownEdgeHandle(handle.0))
    }
}
