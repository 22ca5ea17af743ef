//! Speech adapter boundaries.
//!
//! Real STT/TTS inference happens behind these traits; the orchestrator never
//! depends on a concrete engine.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::audio::{AudioFrame, SampleRate};
use crate::error::Error;
use crate::transcript::TranscriptResult;

/// Boxed stream of audio frames
pub type AudioStream = Pin<Box<dyn Stream<Item = AudioFrame> + Send>>;

/// Boxed stream of transcript results
pub type TranscriptStream = Pin<Box<dyn Stream<Item = TranscriptResult> + Send>>;

/// Boxed stream of synthesized frames
pub type SynthesisStream = Pin<Box<dyn Stream<Item = Result<AudioFrame, Error>> + Send>>;

/// Speech-to-text adapter.
///
/// Emits interleaved partial and final [`TranscriptResult`]s; time offsets are
/// milliseconds from stream start.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe_stream(&self, audio: AudioStream) -> Result<TranscriptStream, Error>;

    fn name(&self) -> &str;
}

/// Text-to-speech adapter.
///
/// Returns frames incrementally so playback can start before synthesis
/// finishes and cancellation can take effect mid-utterance.
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    async fn synthesize_stream(&self, text: &str) -> Result<SynthesisStream, Error>;

    /// Native output rate of this adapter
    fn sample_rate(&self) -> SampleRate;

    fn name(&self) -> &str;
}
