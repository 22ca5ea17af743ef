//! Session orchestration: the reasoning loop and the voice session state
//! machine that ties the pipeline, LLM, and tools together.

pub mod reasoning;
pub mod session;

pub use reasoning::{ReasoningConfig, ReasoningLoop, ReasoningOutcome};
pub use session::{
    EndReason, SessionEvent, SessionInput, SessionState, SessionSummary, VoiceSession,
    VoiceSessionConfig,
};
