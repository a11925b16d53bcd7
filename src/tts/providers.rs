//! TTS Providers
//!
//! Text-to-speech provider implementations.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{Language, Result, TtsConfig, TtsError, TtsProvider};

/// Longest text the Google endpoint accepts in one request.
pub const GOOGLE_MAX_REQUEST_CHARS: usize = 100;

const GOOGLE_DEFAULT_BASE_URL: &str = "https://translate.google.com";
const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Speech synthesis for a single chunk of text.
///
/// Implementations are stateless request/response adapters. Returned bytes are
/// an MP3 stream.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Synthesize speech from text
    async fn synthesize(&self, text: &str, language: Language) -> Result<Vec<u8>>;

    /// Get provider name
    fn name(&self) -> &str;
}

fn build_client(timeout_seconds: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .build()
        .map_err(TtsError::NetworkError)
}

async fn handle_api_error(provider: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    match status.as_u16() {
        400 | 422 => Err(TtsError::ProviderError(format!(
            "{} rejected the request: {}",
            provider, body
        ))),
        401 | 403 => Err(TtsError::ProviderError(format!(
            "{} authentication failed: {}",
            provider, body
        ))),
        _ => Err(TtsError::ProviderError(format!(
            "{} error {}: {}",
            provider, status, body
        ))),
    }
}

/// Split `text` into pieces of at most `max_chars` characters, breaking on
/// whitespace. A single word longer than the limit is cut by character count.
pub fn split_for_requests(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for part in chars.chunks(max_chars) {
                pieces.push(part.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() { word_len } else { word_len + 1 };
        if current_len + needed > max_chars {
            pieces.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        pieces.push(current);
    }

    pieces
}

/// Google Translate TTS provider (free, keyless)
pub struct GoogleTranslateTts {
    client: reqwest::Client,
    base_url: String,
}

impl GoogleTranslateTts {
    /// Create new Google TTS provider
    pub fn new(timeout_seconds: u64) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_seconds)?,
            base_url: GOOGLE_DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the provider at a different host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request_url(&self, piece: &str, language: Language, idx: usize, total: usize) -> Result<url::Url> {
        let endpoint = format!("{}/translate_tts", self.base_url);
        let textlen = piece.chars().count().to_string();
        let idx = idx.to_string();
        let total = total.to_string();
        url::Url::parse_with_params(
            &endpoint,
            &[
                ("ie", "UTF-8"),
                ("q", piece),
                ("tl", language.code()),
                ("client", "tw-ob"),
                ("total", total.as_str()),
                ("idx", idx.as_str()),
                ("textlen", textlen.as_str()),
            ],
        )
        .map_err(|e| TtsError::ConfigError(format!("Invalid TTS endpoint {}: {}", endpoint, e)))
    }
}

#[async_trait]
impl SpeechProvider for GoogleTranslateTts {
    async fn synthesize(&self, text: &str, language: Language) -> Result<Vec<u8>> {
        let pieces = split_for_requests(text, GOOGLE_MAX_REQUEST_CHARS);
        if pieces.is_empty() {
            return Err(TtsError::EmptyInput);
        }

        let total = pieces.len();
        let mut audio = Vec::new();

        for (idx, piece) in pieces.iter().enumerate() {
            let url = self.request_url(piece, language, idx, total)?;
            let response = self
                .client
                .get(url)
                .header("Referer", "http://translate.google.com/")
                .send()
                .await?;
            let response = handle_api_error("Google TTS", response).await?;
            let bytes = response.bytes().await?;

            tracing::debug!(
                language = %language,
                piece = idx,
                total = total,
                bytes = bytes.len(),
                "Google TTS piece synthesized"
            );

            // MP3 frames are self-delimiting, so pieces concatenate into one stream.
            audio.extend_from_slice(&bytes);
        }

        Ok(audio)
    }

    fn name(&self) -> &str {
        "google"
    }
}

/// OpenAI TTS provider
pub struct OpenAiTtsProvider {
    api_key: String,
    model: String,
    voice: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiTtsProvider {
    /// Create new OpenAI TTS provider
    pub fn new(api_key: String, config: &TtsConfig) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(TtsError::ConfigError("OpenAI API key required".to_string()));
        }

        Ok(Self {
            api_key,
            model: config.openai_model.clone(),
            voice: config.openai_voice.clone(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| OPENAI_DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            client: build_client(config.timeout_seconds)?,
        })
    }
}

#[async_trait]
impl SpeechProvider for OpenAiTtsProvider {
    async fn synthesize(&self, text: &str, language: Language) -> Result<Vec<u8>> {
        if text.trim().is_empty() {
            return Err(TtsError::EmptyInput);
        }

        // The model detects the spoken language from the input itself.
        tracing::debug!(language = %language, chars = text.chars().count(), "OpenAI TTS request");

        let response = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&serde_json::json!({
                "model": self.model,
                "input": text,
                "voice": self.voice,
                "response_format": "mp3",
            }))
            .send()
            .await?;

        let response = handle_api_error("OpenAI TTS", response).await?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Build the provider selected in `config`.
///
/// `api_key` is only consulted for providers that need one.
pub fn create_provider(config: &TtsConfig, api_key: Option<String>) -> Result<Arc<dyn SpeechProvider>> {
    config.validate().map_err(TtsError::ConfigError)?;

    let provider: Arc<dyn SpeechProvider> = match config.provider {
        TtsProvider::Google => {
            let mut google = GoogleTranslateTts::new(config.timeout_seconds)?;
            if let Some(base_url) = &config.base_url {
                google = google.with_base_url(base_url.clone());
            }
            Arc::new(google)
        }
        TtsProvider::OpenAi => {
            let api_key = api_key
                .ok_or_else(|| TtsError::ConfigError("OpenAI API key required".to_string()))?;
            Arc::new(OpenAiTtsProvider::new(api_key, config)?)
        }
    };

    tracing::debug!(provider = provider.name(), "Speech provider ready");
    Ok(provider)
}
