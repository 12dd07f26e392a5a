//! Collaborators for `tracer_core`: simulated ones for hosts and tests, and
//! rppal GPIO implementations behind the `hardware` feature.

pub mod encoder;
pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;
pub mod script;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use tracer_traits::{AudioCue, AudioSink, HBridge, LineSensors, PwmChannel, SensorFrame};

use crate::error::HwError;

pub use encoder::PulseGenerator;
pub use script::{builtin_course, load_script, parse_script};

/// What the simulated array reports once its script runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Exhausted {
    /// Keep reporting the last frame.
    #[default]
    RepeatLast,
    /// Fail every further read with `HwError::Script`.
    Fail,
}

#[derive(Debug, Default)]
struct ScriptState {
    queue: VecDeque<SensorFrame>,
    last: Option<SensorFrame>,
    reads: u64,
}

/// Simulated sensor array fed from a frame script.
#[derive(Debug, Clone, Default)]
pub struct SimulatedSensors {
    state: Arc<Mutex<ScriptState>>,
    on_exhausted: Exhausted,
}

impl SimulatedSensors {
    pub fn new(frames: impl IntoIterator<Item = SensorFrame>) -> Self {
        let sensors = Self::default();
        sensors.extend(frames);
        sensors
    }

    pub fn on_exhausted(mut self, mode: Exhausted) -> Self {
        self.on_exhausted = mode;
        self
    }

    /// Shared handle for feeding frames while the navigator owns the sensors.
    pub fn handle(&self) -> Self {
        self.clone()
    }

    pub fn push(&self, frame: SensorFrame) {
        self.lock().queue.push_back(frame);
    }

    pub fn extend(&self, frames: impl IntoIterator<Item = SensorFrame>) {
        self.lock().queue.extend(frames);
    }

    pub fn remaining(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn reads(&self) -> u64 {
        self.lock().reads
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LineSensors for SimulatedSensors {
    fn read(&mut self) -> Result<SensorFrame, Box<dyn std::error::Error + Send + Sync>> {
        let mode = self.on_exhausted;
        let mut st = self.lock();
        st.reads += 1;
        if let Some(frame) = st.queue.pop_front() {
            st.last = Some(frame);
            tracing::trace!(%frame, "simulated frame");
            return Ok(frame);
        }
        match (mode, st.last) {
            (Exhausted::RepeatLast, Some(frame)) => Ok(frame),
            (Exhausted::RepeatLast, None) => Ok(SensorFrame::BLANK),
            (Exhausted::Fail, _) => Err(HwError::Script(format!(
                "script exhausted after {} reads",
                st.reads - 1
            ))
            .into()),
        }
    }
}

/// Duty table shared between a `SimulatedBridge` and observers.
#[derive(Debug, Clone, Default)]
pub struct DutyHandle(Arc<Mutex<([u16; 4], u64)>>);

impl DutyHandle {
    pub fn duty(&self, channel: PwmChannel) -> u16 {
        self.snapshot()[channel.index()]
    }

    pub fn snapshot(&self) -> [u16; 4] {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).0
    }

    pub fn writes(&self) -> u64 {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).1
    }

    /// Net duty per wheel: forward minus backward.
    pub fn wheel_duties(&self) -> (i32, i32) {
        let d = self.snapshot().map(i32::from);
        (d[0] - d[1], d[2] - d[3])
    }
}

/// Simulated dual H-bridge that records the last duty per channel.
#[derive(Debug, Clone, Default)]
pub struct SimulatedBridge {
    duties: DutyHandle,
}

impl SimulatedBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> DutyHandle {
        self.duties.clone()
    }
}

impl HBridge for SimulatedBridge {
    fn write(
        &mut self,
        channel: PwmChannel,
        duty: u16,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut g = self.duties.0.lock().unwrap_or_else(PoisonError::into_inner);
        g.0[channel.index()] = duty;
        g.1 += 1;
        Ok(())
    }
}

/// Audio sink that reports cues through `tracing` and keeps a history.
#[derive(Debug, Clone, Default)]
pub struct TracingAudio {
    played: Arc<Mutex<Vec<AudioCue>>>,
}

impl TracingAudio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn played(&self) -> Vec<AudioCue> {
        self.played
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AudioSink for TracingAudio {
    fn play(&mut self, cue: AudioCue) {
        tracing::info!(?cue, "audio");
        self.played
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(cue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_simulated_sensors_read_blank() {
        let mut s = SimulatedSensors::default();
        assert_eq!(s.read().unwrap(), SensorFrame::BLANK);
    }

    #[test]
    fn bridge_counts_writes() {
        let mut b = SimulatedBridge::new();
        let h = b.handle();
        b.write(PwmChannel::LeftBackward, 40).unwrap();
        b.write(PwmChannel::RightForward, 90).unwrap();
        assert_eq!(h.writes(), 2);
        assert_eq!(h.wheel_duties(), (-40, 90));
    }
}
