//! Signed wheel speeds to dual forward/backward PWM channels.

use eyre::WrapErr;
use tracer_traits::{HBridge, PwmChannel};

use crate::error::Result;
use crate::hw_error;
use crate::state::TurnDirection;

/// Signed per-wheel speed command. Positive drives forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WheelCommand {
    pub left: i32,
    pub right: i32,
}

impl WheelCommand {
    pub const STOP: WheelCommand = WheelCommand { left: 0, right: 0 };

    pub const fn new(left: i32, right: i32) -> Self {
        Self { left, right }
    }

    pub fn is_stop(&self) -> bool {
        *self == Self::STOP
    }
}

#[derive(Debug)]
pub struct DifferentialDrive<B> {
    bridge: B,
    max_speed: i32,
    duty_scale: f32,
    last: WheelCommand,
    // true once zeros have been written successfully
    stopped: bool,
}

impl<B: HBridge> DifferentialDrive<B> {
    pub fn new(bridge: B, max_speed: i32, duty_scale: f32) -> Self {
        Self {
            bridge,
            max_speed: max_speed.max(0),
            duty_scale,
            last: WheelCommand::STOP,
            stopped: false,
        }
    }

    #[inline]
    fn duty(&self, speed: i32) -> u16 {
        let mag = speed.unsigned_abs().min(self.max_speed as u32) as f32;
        (mag * self.duty_scale).round().clamp(0.0, f32::from(u16::MAX)) as u16
    }

    fn write_wheel(&mut self, fwd: PwmChannel, bwd: PwmChannel, speed: i32) -> Result<()> {
        let duty = self.duty(speed);
        let (f, b) = if speed >= 0 { (duty, 0) } else { (0, duty) };
        self.bridge
            .write(fwd, f)
            .map_err(|e| hw_error::report(&*e))
            .wrap_err_with(|| format!("h-bridge write {fwd:?}"))?;
        self.bridge
            .write(bwd, b)
            .map_err(|e| hw_error::report(&*e))
            .wrap_err_with(|| format!("h-bridge write {bwd:?}"))?;
        Ok(())
    }

    /// Command both wheels. Speeds are clamped to `±max_speed`.
    pub fn set_speeds(&mut self, left: i32, right: i32) -> Result<()> {
        let cmd = WheelCommand::new(
            left.clamp(-self.max_speed, self.max_speed),
            right.clamp(-self.max_speed, self.max_speed),
        );
        self.stopped = false;
        self.write_wheel(PwmChannel::LeftForward, PwmChannel::LeftBackward, cmd.left)?;
        self.write_wheel(PwmChannel::RightForward, PwmChannel::RightBackward, cmd.right)?;
        self.last = cmd;
        tracing::trace!(left = cmd.left, right = cmd.right, "drive");
        Ok(())
    }

    pub fn apply(&mut self, cmd: WheelCommand) -> Result<()> {
        self.set_speeds(cmd.left, cmd.right)
    }

    /// Zero all four channels. Repeated calls after a successful stop are no-ops.
    pub fn stop(&mut self) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        self.set_speeds(0, 0)?;
        self.stopped = true;
        Ok(())
    }

    /// In-place pivot: the outer wheel forward, the inner wheel reversed.
    pub fn pivot(&mut self, direction: TurnDirection, speed: i32) -> Result<()> {
        match direction {
            TurnDirection::Right => self.set_speeds(speed, -speed),
            TurnDirection::Left => self.set_speeds(-speed, speed),
            TurnDirection::None => self.stop(),
        }
    }

    pub fn last_command(&self) -> WheelCommand {
        self.last
    }
}
