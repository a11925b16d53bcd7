//! Text optimization
//!
//! Rewrites a document through a language model so it reads naturally when
//! spoken. Results are cached by the hash of the input text, so optimizing
//! the same document twice costs one round of model calls.

pub mod prompt;
pub mod providers;

pub use providers::{OpenAiRewriter, TextRewriter};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::{content_hash, OptimizationCache};
use crate::text;

/// Optimization errors
#[derive(Error, Debug)]
pub enum OptimizeError {
    #[error("API key required for text optimization")]
    MissingCredential,

    #[error("Nothing to optimize: input text is empty")]
    EmptyInput,

    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Rate limit exceeded. Retry after: {retry_after}s")]
    RateLimitExceeded { retry_after: u64 },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Model returned no text")]
    EmptyResponse,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Result type for optimization operations
pub type Result<T> = std::result::Result<T, OptimizeError>;

/// Optimization configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationConfig {
    /// Optimize by default when converting
    #[serde(default)]
    pub enabled: bool,
    /// Chat model
    #[serde(default = "default_model")]
    pub model: String,
    /// OpenAI-compatible API root
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Characters per rewrite request
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Progress percentage reported when optimization starts
    #[serde(default = "default_progress_low")]
    pub progress_low: u8,
    /// Progress percentage reported when optimization finishes
    #[serde(default = "default_progress_high")]
    pub progress_high: u8,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_chunk_size() -> usize {
    3000
}

fn default_temperature() -> f32 {
    0.3
}

fn default_timeout() -> u64 {
    120
}

fn default_progress_low() -> u8 {
    15
}

fn default_progress_high() -> u8 {
    40
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: default_model(),
            base_url: default_base_url(),
            chunk_size: default_chunk_size(),
            temperature: default_temperature(),
            timeout_seconds: default_timeout(),
            progress_low: default_progress_low(),
            progress_high: default_progress_high(),
        }
    }
}

impl OptimizationConfig {
    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.chunk_size == 0 {
            return Err("optimization chunkSize must be greater than 0".to_string());
        }
        if self.progress_low >= self.progress_high || self.progress_high > 100 {
            return Err("progressLow must be below progressHigh, and progressHigh at most 100".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err("temperature must be between 0.0 and 2.0".to_string());
        }
        if self.model.trim().is_empty() {
            return Err("model must not be empty".to_string());
        }
        url::Url::parse(&self.base_url).map_err(|e| format!("Invalid baseUrl: {}", e))?;
        Ok(())
    }
}

/// Chunked, cached rewriting of whole documents.
pub struct Optimizer {
    rewriter: Arc<dyn TextRewriter>,
    cache: Option<OptimizationCache>,
    chunk_size: usize,
    progress_low: u8,
    progress_high: u8,
}

impl Optimizer {
    pub fn new(rewriter: Arc<dyn TextRewriter>, config: &OptimizationConfig) -> Result<Self> {
        config.validate().map_err(OptimizeError::InvalidConfig)?;
        Ok(Self {
            rewriter,
            cache: None,
            chunk_size: config.chunk_size,
            progress_low: config.progress_low,
            progress_high: config.progress_high,
        })
    }

    /// Build an optimizer backed by the OpenAI chat completions API.
    pub fn openai(config: &OptimizationConfig) -> Result<Self> {
        Self::new(Arc::new(OpenAiRewriter::new(config)?), config)
    }

    pub fn with_cache(mut self, cache: OptimizationCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The percentage range this optimizer reports within.
    pub fn progress_bounds(&self) -> (u8, u8) {
        (self.progress_low, self.progress_high)
    }

    /// Rewrite `text` for speech.
    ///
    /// `progress` receives percentages between the configured bounds, never
    /// decreasing. The cache is keyed by the hash of `text` as given.
    pub async fn optimize(
        &self,
        text: &str,
        credential: &str,
        progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<String> {
        if credential.trim().is_empty() {
            return Err(OptimizeError::MissingCredential);
        }
        if text.trim().is_empty() {
            return Err(OptimizeError::EmptyInput);
        }

        let hash = content_hash(text);

        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(&hash).await {
                tracing::info!(key = %hash, "Using cached optimization");
                progress(self.progress_high);
                return Ok(cached);
            }
        }

        let chunks = text::split(text, self.chunk_size)
            .map_err(|e| OptimizeError::InvalidConfig(e.to_string()))?;
        let total = chunks.len();
        progress(self.progress_low);

        tracing::info!(
            provider = self.rewriter.name(),
            chunks = total,
            chars = text.chars().count(),
            "Optimizing text"
        );

        let mut rewritten = Vec::with_capacity(total);
        for chunk in &chunks {
            let output = self.rewriter.rewrite(&chunk.text, credential).await?;
            rewritten.push(output);
            progress(self.percent_after(chunk.index + 1, total));
        }

        let optimized = rewritten.join("\n");

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put(&hash, &optimized).await {
                tracing::warn!(key = %hash, error = %e, "Failed to cache optimized text");
            }
        }

        Ok(optimized)
    }

    fn percent_after(&self, done: usize, total: usize) -> u8 {
        let span = usize::from(self.progress_high - self.progress_low);
        let advanced = span * done / total.max(1);
        self.progress_low + advanced as u8
    }
}
