//! Audio pipeline: voice activity detection, turn segmentation, and
//! cancellable speech synthesis.

pub mod synthesis;
pub mod turn_detection;
pub mod vad;

pub use synthesis::{SpeechHandle, SynthesisConfig, SynthesisController, SynthesisOutcome};
pub use turn_detection::{SegmenterEvent, SegmenterState, TurnConfig, TurnSegmenter};
pub use vad::{EnergyVad, VadConfig};
