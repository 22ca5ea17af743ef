//! Layered runtime settings.
//!
//! Priority (highest to lowest):
//! 1. Environment variables (`LEASING_AGENT__` prefix, `__` separator)
//! 2. An explicit TOML file, when given
//! 3. `config/default` next to the binary
//! 4. Built-in defaults from [`crate::constants`]

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::{reasoning, session, timeouts, turn, vad};
use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub turn: TurnSettings,

    #[serde(default)]
    pub vad: VadSettings,

    #[serde(default)]
    pub reasoning: ReasoningSettings,

    #[serde(default)]
    pub llm: LlmSettings,

    #[serde(default)]
    pub session: SessionSettings,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.turn.silence_threshold_ms < turn::MIN_SILENCE_THRESHOLD_MS
            || self.turn.silence_threshold_ms > turn::MAX_SILENCE_THRESHOLD_MS
        {
            return Err(ConfigError::InvalidValue {
                field: "turn.silence_threshold_ms".to_string(),
                message: format!(
                    "must be between {} and {}, got {}",
                    turn::MIN_SILENCE_THRESHOLD_MS,
                    turn::MAX_SILENCE_THRESHOLD_MS,
                    self.turn.silence_threshold_ms
                ),
            });
        }

        if self.turn.barge_in_min_speech_ms < 100 {
            return Err(ConfigError::InvalidValue {
                field: "turn.barge_in_min_speech_ms".to_string(),
                message: "below 100ms barge-in would trigger on coughs and line noise"
                    .to_string(),
            });
        }

        if !(4..=6).contains(&self.reasoning.max_steps) {
            return Err(ConfigError::InvalidValue {
                field: "reasoning.max_steps".to_string(),
                message: format!("must be between 4 and 6, got {}", self.reasoning.max_steps),
            });
        }

        Ok(())
    }
}

/// Turn-taking and barge-in settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnSettings {
    /// Silence required after a final transcript to close the utterance (ms)
    #[serde(default = "default_silence_threshold_ms")]
    pub silence_threshold_ms: u64,

    /// Minimum sustained speech to count as an utterance (ms)
    #[serde(default = "default_min_speech_ms")]
    pub min_speech_ms: u64,

    /// Sustained speech during playback before barge-in fires (ms)
    #[serde(default = "default_barge_in_min_speech_ms")]
    pub barge_in_min_speech_ms: u64,

    /// Force-finalize cap for long monologues (ms)
    #[serde(default = "default_max_utterance_ms")]
    pub max_utterance_ms: u64,
}

fn default_silence_threshold_ms() -> u64 {
    turn::SILENCE_THRESHOLD_MS
}
fn default_min_speech_ms() -> u64 {
    turn::MIN_SPEECH_MS
}
fn default_barge_in_min_speech_ms() -> u64 {
    turn::BARGE_IN_MIN_SPEECH_MS
}
fn default_max_utterance_ms() -> u64 {
    turn::MAX_UTTERANCE_MS
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            silence_threshold_ms: default_silence_threshold_ms(),
            min_speech_ms: default_min_speech_ms(),
            barge_in_min_speech_ms: default_barge_in_min_speech_ms(),
            max_utterance_ms: default_max_utterance_ms(),
        }
    }
}

/// Energy VAD settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VadSettings {
    /// Energy threshold for voiced frames (dBFS)
    #[serde(default = "default_energy_threshold_db")]
    pub energy_threshold_db: f32,

    /// Consecutive voiced audio before speech onset is confirmed (ms)
    #[serde(default = "default_vad_min_speech_ms")]
    pub min_speech_ms: u32,

    /// Consecutive unvoiced audio before a speech segment closes (ms)
    #[serde(default = "default_vad_min_silence_ms")]
    pub min_silence_ms: u32,
}

fn default_energy_threshold_db() -> f32 {
    vad::ENERGY_THRESHOLD_DB
}
fn default_vad_min_speech_ms() -> u32 {
    vad::MIN_SPEECH_MS
}
fn default_vad_min_silence_ms() -> u32 {
    vad::MIN_SILENCE_MS
}

impl Default for VadSettings {
    fn default() -> Self {
        Self {
            energy_threshold_db: default_energy_threshold_db(),
            min_speech_ms: default_vad_min_speech_ms(),
            min_silence_ms: default_vad_min_silence_ms(),
        }
    }
}

/// Reasoning loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningSettings {
    /// Maximum LLM steps per caller utterance
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Spoken when the loop cannot produce a response
    #[serde(default = "default_fallback_text")]
    pub fallback_text: String,

    /// Spoken when synthesis fails mid-utterance
    #[serde(default = "default_apology_text")]
    pub apology_text: String,

    /// Spoken when the caller's speech never produced a final transcript
    #[serde(default = "default_reprompt_text")]
    pub reprompt_text: String,
}

fn default_max_steps() -> usize {
    reasoning::MAX_STEPS
}
fn default_fallback_text() -> String {
    reasoning::FALLBACK_TEXT.to_string()
}
fn default_apology_text() -> String {
    reasoning::APOLOGY_TEXT.to_string()
}
fn default_reprompt_text() -> String {
    reasoning::REPROMPT_TEXT.to_string()
}

impl Default for ReasoningSettings {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            fallback_text: default_fallback_text(),
            apology_text: default_apology_text(),
            reprompt_text: default_reprompt_text(),
        }
    }
}

/// LLM backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// API key; prefer LEASING_AGENT__LLM__API_KEY over files
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "gpt-4o".to_string()
}
fn default_endpoint() -> String {
    "https://api.openai.com".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> usize {
    256
}
fn default_llm_timeout_secs() -> u64 {
    timeouts::LLM_REQUEST_SECS
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            endpoint: default_endpoint(),
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

/// Session-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Opening line; empty string disables the greeting
    #[serde(default = "default_greeting")]
    pub greeting: String,
}

fn default_greeting() -> String {
    session::GREETING.to_string()
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            greeting: default_greeting(),
        }
    }
}

/// Load settings from files and environment.
pub fn load_settings(path: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(path) = path {
        builder = builder.add_source(File::with_name(path).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix("LEASING_AGENT")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.turn.silence_threshold_ms, 600);
        assert_eq!(settings.turn.barge_in_min_speech_ms, 200);
        assert_eq!(settings.reasoning.max_steps, 5);
    }

    #[test]
    fn silence_threshold_bounds() {
        let mut settings = Settings::default();

        settings.turn.silence_threshold_ms = 400;
        assert!(settings.validate().is_err());

        settings.turn.silence_threshold_ms = 900;
        assert!(settings.validate().is_err());

        settings.turn.silence_threshold_ms = 750;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn barge_in_floor() {
        let mut settings = Settings::default();
        settings.turn.barge_in_min_speech_ms = 50;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn max_steps_range() {
        let mut settings = Settings::default();

        settings.reasoning.max_steps = 3;
        assert!(settings.validate().is_err());

        settings.reasoning.max_steps = 7;
        assert!(settings.validate().is_err());

        settings.reasoning.max_steps = 6;
        assert!(settings.validate().is_ok());
    }
}
