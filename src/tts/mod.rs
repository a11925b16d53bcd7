//! Text-to-Speech (TTS) Module
//!
//! Speech synthesis for one chunk at a time, behind the
//! [`SpeechProvider`] trait. Providers hold no state between calls.

pub mod config;
pub mod language;
pub mod providers;

pub use config::*;
pub use language::Language;
pub use providers::*;

use thiserror::Error;

/// TTS errors
#[derive(Error, Debug)]
pub enum TtsError {
    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Nothing to synthesize: input text is empty")]
    EmptyInput,
}

/// Result type for TTS operations
pub type Result<T> = std::result::Result<T, TtsError>;
