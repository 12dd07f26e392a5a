//! Steering correction from a scalar position error.

/// Integral term clamp, applied after every accumulation.
pub const INTEGRAL_LIMIT: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl Default for PidGains {
    fn default() -> Self {
        Self {
            kp: 25.0,
            ki: 0.5,
            kd: 15.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PidRegulator {
    gains: PidGains,
    integral: f32,
    previous_error: f32,
}

impl PidRegulator {
    pub fn new(gains: PidGains) -> Self {
        Self {
            gains,
            integral: 0.0,
            previous_error: 0.0,
        }
    }

    /// `Kp·e + Ki·Σe + Kd·(e − e_prev)`, with Σe clamped to ±`INTEGRAL_LIMIT`.
    ///
    /// Non-finite errors are treated as 0 so the integral never becomes NaN.
    pub fn calculate(&mut self, error: f32) -> f32 {
        let error = if error.is_finite() { error } else { 0.0 };
        let p = error;
        self.integral = (self.integral + error).clamp(-INTEGRAL_LIMIT, INTEGRAL_LIMIT);
        let d = error - self.previous_error;
        self.previous_error = error;
        self.gains.kp * p + self.gains.ki * self.integral + self.gains.kd * d
    }

    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.previous_error = 0.0;
    }

    pub fn set_gains(&mut self, gains: PidGains) {
        self.gains = gains;
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }

    pub fn previous_error(&self) -> f32 {
        self.previous_error
    }
}
