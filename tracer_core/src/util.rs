//! Time/period helpers for tracer_core.

/// Number of milliseconds in one second.
pub const MILLIS_PER_SEC: u64 = 1_000;

/// Compute the period in milliseconds for a given tick rate in Hz.
/// - Clamps `hz` to at least 1 to avoid division by zero.
/// - Ensures result is at least 1 millisecond.
#[inline]
pub fn period_ms(hz: u32) -> u64 {
    (MILLIS_PER_SEC / u64::from(hz.max(1))).max(1)
}

/// Milliseconds elapsed between two timestamps, 0 if `now` is earlier.
#[inline]
pub fn elapsed_ms(now_ms: u64, since_ms: u64) -> u64 {
    now_ms.saturating_sub(since_ms)
}
