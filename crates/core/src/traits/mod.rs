//! Boundary traits between the orchestrator and its adapters.

pub mod lead;
pub mod llm;
pub mod speech;
pub mod tool;
pub mod vad;

pub use lead::LeadSink;
pub use llm::LanguageModel;
pub use speech::{AudioStream, SpeechToText, SynthesisStream, TextToSpeech, TranscriptStream};
pub use tool::{ParameterSchema, ParameterType, Tool, ToolSchema, DEFAULT_TOOL_TIMEOUT_SECS};
pub use vad::{VadEngine, VadEvent};
