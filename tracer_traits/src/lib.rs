pub mod clock;
pub mod frame;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use frame::{ParseFrameError, SENSOR_COUNT, SensorFrame};

/// Five-channel line sensor array.
pub trait LineSensors {
    /// Sample the pre-thresholded line/no-line state of every channel.
    fn read(&mut self) -> Result<SensorFrame, Box<dyn std::error::Error + Send + Sync>>;

    /// Raw per-channel levels, used only to characterize sensor range during
    /// calibration. Digital arrays report 0 for "no line" and 1 for "line".
    fn read_levels(
        &mut self,
    ) -> Result<[u16; SENSOR_COUNT], Box<dyn std::error::Error + Send + Sync>> {
        let frame = self.read()?;
        Ok(frame.channels().map(u16::from))
    }
}

/// One of the four PWM outputs of a dual H-bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PwmChannel {
    LeftForward,
    LeftBackward,
    RightForward,
    RightBackward,
}

impl PwmChannel {
    pub const ALL: [PwmChannel; 4] = [
        PwmChannel::LeftForward,
        PwmChannel::LeftBackward,
        PwmChannel::RightForward,
        PwmChannel::RightBackward,
    ];

    /// Stable index into a `[_; 4]` duty table.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            PwmChannel::LeftForward => 0,
            PwmChannel::LeftBackward => 1,
            PwmChannel::RightForward => 2,
            PwmChannel::RightBackward => 3,
        }
    }
}

/// Dual H-bridge actuator driver with independent forward/backward PWM per wheel.
pub trait HBridge {
    fn write(
        &mut self,
        channel: PwmChannel,
        duty: u16,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Discrete events the audio collaborator may react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioCue {
    Ready,
    Start,
    Stop,
    LineLost,
    LineFound,
    Error,
    Beep,
}

/// Fire-and-forget audio feedback. Implementations must not block the caller.
pub trait AudioSink {
    fn play(&mut self, cue: AudioCue);
}

impl<T: LineSensors + ?Sized> LineSensors for Box<T> {
    fn read(&mut self) -> Result<SensorFrame, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read()
    }
    fn read_levels(
        &mut self,
    ) -> Result<[u16; SENSOR_COUNT], Box<dyn std::error::Error + Send + Sync>> {
        (**self).read_levels()
    }
}

impl<T: HBridge + ?Sized> HBridge for Box<T> {
    fn write(
        &mut self,
        channel: PwmChannel,
        duty: u16,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).write(channel, duty)
    }
}

impl<T: AudioSink + ?Sized> AudioSink for Box<T> {
    fn play(&mut self, cue: AudioCue) {
        (**self).play(cue);
    }
}
