//! Configuration loading
//!
//! The config file is JSON5, read from `SPEAKDOWN_CONFIG_PATH` or
//! `<config dir>/speakdown/speakdown.json5`. A missing file means defaults.

pub mod types;

pub use types::{Config, ValidationError};

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::credentials::CREDENTIAL_FILE;

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV: &str = "SPEAKDOWN_CONFIG_PATH";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Invalid configuration: {}", format_issues(.0))]
    Validation(Vec<ValidationError>),
}

fn format_issues(issues: &[ValidationError]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Location of the config file.
pub fn get_config_path() -> PathBuf {
    config_path_from(std::env::var(CONFIG_PATH_ENV).ok())
}

fn config_path_from(env_value: Option<String>) -> PathBuf {
    match env_value.filter(|v| !v.trim().is_empty()) {
        Some(path) => PathBuf::from(path),
        None => dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("speakdown")
            .join("speakdown.json5"),
    }
}

/// Load the config from the default location.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&get_config_path())
}

/// Load and validate the config at `path`. A missing file yields defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Config::default());
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.display().to_string(),
                source,
            })
        }
    };

    let config = parse_config(&raw).map_err(|message| ConfigError::Parse {
        path: path.display().to_string(),
        message,
    })?;

    let issues = config.validate();
    if !issues.is_empty() {
        return Err(ConfigError::Validation(issues));
    }

    tracing::debug!(path = %path.display(), "Config loaded");
    Ok(config)
}

/// Parse JSON5 text into a config without validating it.
pub fn parse_config(raw: &str) -> Result<Config, String> {
    if raw.trim().is_empty() {
        return Ok(Config::default());
    }
    json5::from_str::<Config>(raw).map_err(|e| e.to_string())
}

/// Default data directory: `.speakdown` beside the executable.
pub fn default_data_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".speakdown")
}

impl Config {
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    /// Directory holding cached optimizations.
    pub fn cache_dir(&self) -> PathBuf {
        self.cache
            .dir
            .clone()
            .unwrap_or_else(|| self.data_dir().join("cache").join("optimized"))
    }

    /// Path of the encrypted credential file.
    pub fn credential_path(&self) -> PathBuf {
        self.credentials
            .path
            .clone()
            .unwrap_or_else(|| self.data_dir().join("credentials").join(CREDENTIAL_FILE))
    }

    /// Where finished audio is written.
    pub fn output_dir(&self) -> PathBuf {
        self.audio
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogFormat;
    use crate::text::Symbol;
    use crate::tts::{Language, TtsProvider};
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config_from(&dir.path().join("absent.json5")).unwrap();
        assert_eq!(config.tts.chunk_size, 1000);
        assert_eq!(config.cache.expiry_days, 30);
        assert!(!config.optimization.enabled);
    }

    #[test]
    fn test_json5_with_comments_and_trailing_commas() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("speakdown.json5");
        std::fs::write(
            &path,
            r#"{
                // speech
                tts: { provider: "openai", language: "ja", excludedSymbols: ["hash", "pipe",], },
                optimization: { enabled: true, chunkSize: 2000 },
                logging: { format: "json" },
                dataDir: "/var/lib/speakdown",
            }"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.tts.provider, TtsProvider::OpenAi);
        assert_eq!(config.tts.language, Language::Japanese);
        assert!(config.tts.excluded_symbols.contains(Symbol::Pipe));
        assert!(config.optimization.enabled);
        assert_eq!(config.optimization.chunk_size, 2000);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(
            config.cache_dir(),
            PathBuf::from("/var/lib/speakdown/cache/optimized")
        );
        assert_eq!(
            config.credential_path(),
            PathBuf::from("/var/lib/speakdown/credentials/api_key.enc")
        );
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json5");
        std::fs::write(&path, "{ tts: { chunkSize: ").unwrap();
        assert!(matches!(load_config_from(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_unknown_language_is_parse_error() {
        assert!(parse_config(r#"{ tts: { language: "xx" } }"#).is_err());
    }

    #[test]
    fn test_invalid_values_collected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("invalid.json5");
        std::fs::write(
            &path,
            r#"{ tts: { chunkSize: 0 }, cache: { expiryDays: 0 } }"#,
        )
        .unwrap();

        match load_config_from(&path) {
            Err(ConfigError::Validation(issues)) => {
                let paths: Vec<&str> = issues.iter().map(|i| i.path.as_str()).collect();
                assert_eq!(paths, vec!["tts", "cache"]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_config_path_from_env() {
        assert_eq!(
            config_path_from(Some("/etc/speakdown.json5".to_string())),
            PathBuf::from("/etc/speakdown.json5")
        );
        assert!(config_path_from(None).ends_with("speakdown/speakdown.json5"));
        assert!(config_path_from(Some("  ".to_string())).ends_with("speakdown.json5"));
    }

    #[test]
    fn test_default_paths_under_data_dir() {
        let config = Config::default();
        assert!(config.cache_dir().ends_with(".speakdown/cache/optimized"));
        assert!(config.credential_path().ends_with(".speakdown/credentials/api_key.enc"));
        assert_eq!(config.output_dir(), PathBuf::from("."));
    }
}
