//! Error taxonomy.
//!
//! Each layer has its own error enum; the top-level [`Error`] aggregates them
//! with `#[from]` conversions. Tool failures are additionally classified into
//! [`ToolErrorKind`] so they can be surfaced to the model as observations
//! instead of aborting the reasoning loop.

use thiserror::Error;

use crate::llm_types::ToolErrorKind;

pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error
#[derive(Debug, Error)]
pub enum Error {
    #[error("audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("llm error: {0}")]
    Llm(#[from] LlmError),

    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("agent error: {0}")]
    Agent(#[from] AgentError),
}

/// Audio processing errors
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("resample failed: {0}")]
    Resample(String),

    #[error("invalid audio format: {0}")]
    InvalidFormat(String),
}

/// Pipeline errors (VAD, segmentation, synthesis)
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The STT stream went quiet while an utterance was open
    #[error("transcription gap: {0}")]
    TranscriptionGap(String),

    #[error("synthesis failed: {0}")]
    SynthesisFailure(String),

    /// speak() called while a previous utterance is still playing
    #[error("synthesis already in progress")]
    SynthesisBusy,

    #[error("channel closed: {0}")]
    ChannelClosed(String),

    #[error("vad error: {0}")]
    Vad(String),
}

/// Language model errors
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Tool execution errors
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("handler failed: {0}")]
    HandlerFailure(String),

    #[error("tool '{name}' timed out after {seconds}s")]
    Timeout { name: String, seconds: u64 },
}

impl ToolError {
    /// Map to the observation-level classification.
    pub fn kind(&self) -> ToolErrorKind {
        match self {
            Self::UnknownTool(_) => ToolErrorKind::UnknownTool,
            Self::InvalidArguments(_) => ToolErrorKind::InvalidArguments,
            Self::HandlerFailure(_) | Self::Timeout { .. } => ToolErrorKind::HandlerFailure,
        }
    }
}

/// Agent-level errors
#[derive(Debug, Error)]
pub enum AgentError {
    /// The reasoning loop hit its step cap without producing final text
    #[error("reasoning exhausted after {steps} steps")]
    ReasoningExhausted { steps: usize },

    #[error("llm error: {0}")]
    Llm(#[from] LlmError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// The transport dropped; the session winds down
    #[error("transport disconnected")]
    TransportDisconnect,

    #[error("background task failed: {0}")]
    Task(String),
}
