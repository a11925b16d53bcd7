//! Rewrite providers
//!
//! Language-model backends that turn one chunk of text into its
//! speech-friendly form.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{prompt, OptimizationConfig, OptimizeError, Result};

/// One rewrite call per chunk.
#[async_trait]
pub trait TextRewriter: Send + Sync {
    /// Rewrite `text`, authenticating with `credential`.
    async fn rewrite(&self, text: &str, credential: &str) -> Result<String>;

    /// Get provider name
    fn name(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Pull the first choice's text out of a chat completion body.
fn extract_openai_text(body: &str) -> Result<String> {
    let response: ChatCompletionResponse = serde_json::from_str(body)?;
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(OptimizeError::EmptyResponse);
    }
    Ok(text)
}

/// Handle API errors with proper status code mapping
async fn handle_api_error(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    match status.as_u16() {
        401 | 403 => Err(OptimizeError::AuthenticationError(body)),
        429 => Err(OptimizeError::RateLimitExceeded {
            retry_after: retry_after.unwrap_or(60),
        }),
        400 | 422 => Err(OptimizeError::InvalidRequest(body)),
        _ => Err(OptimizeError::ApiError(format!("{}: {}", status, body))),
    }
}

/// OpenAI-compatible chat completions backend
pub struct OpenAiRewriter {
    model: String,
    base_url: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiRewriter {
    pub fn new(config: &OptimizationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(OptimizeError::NetworkError)?;

        Ok(Self {
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            client,
        })
    }
}

#[async_trait]
impl TextRewriter for OpenAiRewriter {
    async fn rewrite(&self, text: &str, credential: &str) -> Result<String> {
        let user = prompt::user_prompt(text);
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: prompt::SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(credential)
            .json(&request)
            .send()
            .await?;

        let response = handle_api_error(response).await?;
        let body = response.text().await?;
        extract_openai_text(&body)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_first_choice() {
        let body = r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"  spoken text \n"}}]}"#;
        assert_eq!(extract_openai_text(body).unwrap(), "spoken text");
    }

    #[test]
    fn test_extract_empty_choices() {
        assert!(matches!(
            extract_openai_text(r#"{"choices":[]}"#),
            Err(OptimizeError::EmptyResponse)
        ));
        assert!(matches!(
            extract_openai_text(r#"{"choices":[{"message":{"content":null}}]}"#),
            Err(OptimizeError::EmptyResponse)
        ));
    }

    #[test]
    fn test_extract_malformed_body() {
        assert!(matches!(
            extract_openai_text("<html>gateway timeout</html>"),
            Err(OptimizeError::SerializationError(_))
        ));
    }

    #[test]
    fn test_request_shape() {
        let request = ChatCompletionRequest {
            model: "gpt-4o-mini",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            temperature: 0.3,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = OptimizationConfig {
            base_url: "http://localhost:8080/v1/".to_string(),
            ..Default::default()
        };
        let rewriter = OpenAiRewriter::new(&config).unwrap();
        assert_eq!(rewriter.base_url, "http://localhost:8080/v1");
    }
}
