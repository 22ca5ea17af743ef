//! Transcript types for STT output and segmented utterances.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Transcript result from an STT adapter, partial or final.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptResult {
    /// Transcribed text
    pub text: String,

    /// Is this a final result?
    pub is_final: bool,

    /// Confidence score (0.0 - 1.0)
    pub confidence: f32,

    /// Start time offset (ms from stream start)
    pub start_time_ms: u64,

    /// End time offset (ms from stream start)
    pub end_time_ms: u64,
}

impl TranscriptResult {
    pub fn new(text: impl Into<String>, is_final: bool, confidence: f32) -> Self {
        Self {
            text: text.into(),
            is_final,
            confidence,
            start_time_ms: 0,
            end_time_ms: 0,
        }
    }

    /// Create a partial (non-final) transcript
    pub fn partial(text: impl Into<String>, confidence: f32) -> Self {
        Self::new(text, false, confidence)
    }

    /// Create a final transcript
    pub fn final_result(text: impl Into<String>, confidence: f32) -> Self {
        Self::new(text, true, confidence)
    }

    /// Set time range
    pub fn with_time_range(mut self, start_ms: u64, end_ms: u64) -> Self {
        self.start_time_ms = start_ms;
        self.end_time_ms = end_ms;
        self
    }

    /// Duration in milliseconds
    pub fn duration_ms(&self) -> u64 {
        self.end_time_ms.saturating_sub(self.start_time_ms)
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A finalized caller utterance, emitted by the turn segmenter once both the
/// final transcript has arrived and the silence window has elapsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtteranceEvent {
    pub utterance_id: Uuid,
    pub text: String,
    pub confidence: f32,
    pub start_time_ms: u64,
    pub end_time_ms: u64,
}

impl UtteranceEvent {
    pub fn duration_ms(&self) -> u64 {
        self.end_time_ms.saturating_sub(self.start_time_ms)
    }
}
