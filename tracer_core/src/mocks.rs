//! Test and helper collaborators for tracer_core.

use tracer_traits::{AudioCue, AudioSink};

/// Audio sink that discards every cue.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAudio;

impl AudioSink for NoopAudio {
    fn play(&mut self, _cue: AudioCue) {}
}
