//! Core types and boundary traits for the leasing voice agent.
//!
//! Everything the other crates share lives here: audio frames, transcripts,
//! conversation history, lead records, LLM wire types, the error taxonomy,
//! and the adapter traits (STT, TTS, VAD, LLM, tools, lead storage).

pub mod audio;
pub mod conversation;
pub mod error;
pub mod llm_types;
pub mod traits;
pub mod transcript;

pub use audio::{AudioFrame, Channels, SampleRate, StreamResampler, PCM16_NORMALIZE, PCM16_SCALE};
pub use conversation::{ConversationHistory, ConversationTurn, LeadRecord, Speaker};
pub use error::{AgentError, AudioError, Error, LlmError, PipelineError, Result, ToolError};
pub use llm_types::{
    FinishReason, GenerateRequest, GenerateResponse, Message, Role, ToolCallRequest,
    ToolCallResult, ToolDefinition, ToolErrorKind,
};
pub use traits::{
    AudioStream, LanguageModel, LeadSink, ParameterSchema, ParameterType, SpeechToText,
    SynthesisStream, TextToSpeech, Tool, ToolSchema, TranscriptStream, VadEngine, VadEvent,
};
pub use transcript::{TranscriptResult, UtteranceEvent};
