//! Configuration for the leasing voice agent: centralized constants and
//! layered runtime settings.

pub mod constants;
pub mod settings;

pub use settings::{
    load_settings, LlmSettings, ReasoningSettings, SessionSettings, Settings, TurnSettings,
    VadSettings,
};

use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}
