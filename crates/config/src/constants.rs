//! Centralized defaults for the orchestrator.
//!
//! Runtime overrides come from [`crate::settings::Settings`]; these are the
//! single source of truth for the fallback values.

/// Audio frame geometry
pub mod audio {
    /// Transport sample rate (Hz)
    pub const SAMPLE_RATE_HZ: u32 = 16_000;
    /// Frame duration (ms)
    pub const FRAME_MS: u32 = 20;
    /// Samples per mono frame at the transport rate
    pub const FRAME_SAMPLES: usize = (SAMPLE_RATE_HZ as usize / 1000) * FRAME_MS as usize;
}

/// Voice activity detection
pub mod vad {
    /// Energy threshold for voiced frames (dBFS)
    pub const ENERGY_THRESHOLD_DB: f32 = -40.0;
    /// Consecutive voiced audio before speech onset is confirmed (ms)
    pub const MIN_SPEECH_MS: u32 = 60;
    /// Consecutive unvoiced audio before a speech segment closes (ms)
    pub const MIN_SILENCE_MS: u32 = 200;
}

/// Turn-taking and barge-in
pub mod turn {
    /// Silence required after a final transcript to close the utterance (ms)
    pub const SILENCE_THRESHOLD_MS: u64 = 600;
    /// Lower bound for the configurable silence threshold (ms)
    pub const MIN_SILENCE_THRESHOLD_MS: u64 = 500;
    /// Upper bound for the configurable silence threshold (ms)
    pub const MAX_SILENCE_THRESHOLD_MS: u64 = 800;
    /// Minimum sustained caller speech to count as an utterance (ms)
    pub const MIN_SPEECH_MS: u64 = 200;
    /// Sustained caller speech during agent playback before barge-in fires (ms)
    pub const BARGE_IN_MIN_SPEECH_MS: u64 = 200;
    /// Force-finalize cap for long monologues (ms)
    pub const MAX_UTTERANCE_MS: u64 = 30_000;
}

/// Reasoning loop
pub mod reasoning {
    /// Maximum LLM steps per caller utterance
    pub const MAX_STEPS: usize = 5;
    /// Spoken when the loop exhausts its steps or the model is unreachable
    pub const FALLBACK_TEXT: &str =
        "Sorry, I'm having trouble with that. Could you rephrase your question?";
    /// Spoken when synthesis fails mid-utterance
    pub const APOLOGY_TEXT: &str = "Sorry, I lost my voice for a moment. Where were we?";
    /// Spoken when the caller's speech never produced a final transcript
    pub const REPROMPT_TEXT: &str = "Sorry, I didn't catch that. Could you say it again?";
}

/// Request timeouts
pub mod timeouts {
    /// LLM request timeout (s)
    pub const LLM_REQUEST_SECS: u64 = 30;
}

/// Session defaults
pub mod session {
    /// Opening line spoken when the session starts
    pub const GREETING: &str =
        "Hi, thanks for calling Boulder Mid-Term Rentals! How can I help with your housing search today?";
}
