//! Voice activity detection boundary.

use crate::audio::AudioFrame;

/// Per-frame VAD verdict.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VadEvent {
    /// Sustained speech onset confirmed this frame
    SpeechStart,
    /// Speech continuing
    Speech { probability: f32 },
    /// Sustained silence confirmed this frame, speech segment closed
    SpeechEnd,
    /// No speech
    Silence,
}

impl VadEvent {
    pub fn is_speech(&self) -> bool {
        matches!(self, Self::SpeechStart | Self::Speech { .. })
    }
}

/// VAD engine for pluggable implementations.
///
/// Implementations use interior mutability; one engine instance tracks one
/// audio source.
pub trait VadEngine: Send + Sync {
    /// Process a single audio frame
    fn process_frame(&self, frame: &AudioFrame) -> VadEvent;

    /// Reset detection state
    fn reset(&self);
}
