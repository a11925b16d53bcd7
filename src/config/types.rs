//! Typed configuration structures
//!
//! Each section is owned by the module it configures; this file assembles
//! them into the root document.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::audio::AudioConfig;
use crate::cache::CacheConfig;
use crate::credentials::CredentialsConfig;
use crate::logging::LoggingConfig;
use crate::optimize::OptimizationConfig;
use crate::tts::TtsConfig;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Base directory for the cache and credential store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    #[serde(default)]
    pub tts: TtsConfig,

    #[serde(default)]
    pub optimization: OptimizationConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub credentials: CredentialsConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// A single validation problem, located by its config path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl Config {
    /// Validate every section, collecting all problems.
    pub fn validate(&self) -> Vec<ValidationError> {
        let sections: [(&str, Result<(), String>); 5] = [
            ("tts", self.tts.validate()),
            ("optimization", self.optimization.validate()),
            ("cache", self.cache.validate()),
            ("audio", self.audio.validate()),
            ("logging", self.logging.validate()),
        ];

        sections
            .into_iter()
            .filter_map(|(path, result)| {
                result.err().map(|message| ValidationError {
                    path: path.to_string(),
                    message,
                })
            })
            .collect()
    }
}
