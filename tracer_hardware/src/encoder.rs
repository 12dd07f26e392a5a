//! Synthetic encoder pulses derived from commanded wheel duty.

/// Converts a wheel's duty into whole encoder ticks over time, carrying the
/// fractional remainder between calls.
#[derive(Debug, Clone)]
pub struct PulseGenerator {
    ticks_per_sec_at_full: f32,
    full_duty: u16,
    carry: f32,
}

impl PulseGenerator {
    pub fn new(ticks_per_sec_at_full: f32, full_duty: u16) -> Self {
        Self {
            ticks_per_sec_at_full: ticks_per_sec_at_full.max(0.0),
            full_duty: full_duty.max(1),
            carry: 0.0,
        }
    }

    /// Advance by `dt_ms` at `duty` and call `emit` once per whole tick.
    /// Direction is not encoded; single-channel encoders count both ways.
    pub fn advance(&mut self, duty: u16, dt_ms: u64, mut emit: impl FnMut()) -> u32 {
        let fraction = f32::from(duty.min(self.full_duty)) / f32::from(self.full_duty);
        self.carry += self.ticks_per_sec_at_full * fraction * dt_ms as f32 / 1000.0;
        let whole = self.carry.floor();
        self.carry -= whole;
        let n = whole as u32;
        for _ in 0..n {
            emit();
        }
        n
    }
}
