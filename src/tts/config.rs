//! TTS Configuration
//!
//! Configuration for speech synthesis and the text preparation feeding it.

use serde::{Deserialize, Serialize};

use super::Language;
use crate::text::SymbolSet;

/// TTS provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtsProvider {
    /// Google Translate TTS (free, keyless)
    #[default]
    Google,
    /// OpenAI TTS
    #[serde(rename = "openai")]
    OpenAi,
}

impl std::fmt::Display for TtsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Google => write!(f, "google"),
            Self::OpenAi => write!(f, "openai"),
        }
    }
}

impl std::str::FromStr for TtsProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "google" | "gtts" => Ok(Self::Google),
            "openai" => Ok(Self::OpenAi),
            _ => Err(format!("Invalid TTS provider: {}", s)),
        }
    }
}

/// TTS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TtsConfig {
    /// Speech provider
    #[serde(default)]
    pub provider: TtsProvider,
    /// Default synthesis language
    #[serde(default)]
    pub language: Language,
    /// Characters per synthesis request
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Symbols stripped before synthesis
    #[serde(default)]
    pub excluded_symbols: SymbolSet,
    /// OpenAI speech model
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    /// OpenAI voice ID
    #[serde(default = "default_openai_voice")]
    pub openai_voice: String,
    /// Override for the provider endpoint (tests, proxies)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_openai_model() -> String {
    "tts-1".to_string()
}

fn default_openai_voice() -> String {
    "alloy".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            provider: TtsProvider::Google,
            language: Language::English,
            chunk_size: default_chunk_size(),
            excluded_symbols: SymbolSet::new(),
            openai_model: default_openai_model(),
            openai_voice: default_openai_voice(),
            base_url: None,
            timeout_seconds: default_timeout(),
        }
    }
}

impl TtsConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunkSize must be greater than 0".to_string());
        }

        if self.timeout_seconds == 0 {
            return Err("timeoutSeconds must be greater than 0".to_string());
        }

        if self.provider == TtsProvider::OpenAi {
            if self.openai_model.trim().is_empty() {
                return Err("openaiModel must not be empty".to_string());
            }
            if self.openai_voice.trim().is_empty() {
                return Err("openaiVoice must not be empty".to_string());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::Symbol;

    #[test]
    fn test_defaults() {
        let config = TtsConfig::default();
        assert_eq!(config.provider, TtsProvider::Google);
        assert_eq!(config.language, Language::English);
        assert_eq!(config.chunk_size, 1000);
        assert!(config.excluded_symbols.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_camel_case() {
        let config: TtsConfig = serde_json::from_str(
            r#"{"provider":"openai","language":"de","chunkSize":500,"excludedSymbols":["hash"]}"#,
        )
        .unwrap();
        assert_eq!(config.provider, TtsProvider::OpenAi);
        assert_eq!(config.language, Language::German);
        assert_eq!(config.chunk_size, 500);
        assert!(config.excluded_symbols.contains(Symbol::Hash));
        assert_eq!(config.openai_voice, "alloy");
    }

    #[test]
    fn test_zero_chunk_size_invalid() {
        let config = TtsConfig {
            chunk_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("OpenAI".parse::<TtsProvider>().unwrap(), TtsProvider::OpenAi);
        assert_eq!("google".parse::<TtsProvider>().unwrap(), TtsProvider::Google);
        assert!("edge".parse::<TtsProvider>().is_err());
    }
}
