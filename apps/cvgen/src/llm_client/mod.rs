/// LLM Client: the single point of entry for all text-completion calls in cvgen.
///
/// ARCHITECTURAL RULE: No other module may call a completion API directly.
/// All LLM interactions MUST go through this module.
///
/// Models are hardcoded per provider and tier. Temperature is always 0 so
/// repeated scoring of the same entry stays as stable as the service allows.
use std::time::Duration;

use clap::ValueEnum;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const MAX_TOKENS: u32 = 4096;
const MAX_RETRIES: u32 = 3;
const TEMPERATURE: f32 = 0.0;

/// Which completion service backs the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    #[value(name = "openai")]
    OpenAi,
    #[value(name = "claude")]
    Claude,
}

/// Heavier model for whole-document work, lighter one for per-entry scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    Analysis,
    Scoring,
}

impl Provider {
    pub fn model(&self, tier: ModelTier) -> &'static str {
        match (self, tier) {
            (Provider::OpenAi, _) => "gpt-4o",
            (Provider::Claude, ModelTier::Analysis) => "claude-sonnet-4-5",
            (Provider::Claude, ModelTier::Scoring) => "claude-3-5-haiku-latest",
        }
    }

    pub fn api_key_var(&self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Claude => "ANTHROPIC_API_KEY",
        }
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

impl AnthropicResponse {
    fn into_text(self) -> Option<String> {
        debug!(
            "LLM call succeeded: input_tokens={}, output_tokens={}",
            self.usage.input_tokens, self.usage.output_tokens
        );
        self.content
            .into_iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text)
    }
}

impl OpenAiResponse {
    fn into_text(self) -> Option<String> {
        if let Some(usage) = &self.usage {
            debug!(
                "LLM call succeeded: input_tokens={}, output_tokens={}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }
        self.choices.into_iter().next().and_then(|c| c.message.content)
    }
}

/// Both services wrap errors as `{"error": {"message": ...}}`.
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// The single LLM client used by every AI-backed stage.
/// Wraps the provider's chat API with retry logic and structured output helpers.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    provider: Provider,
    api_key: String,
}

impl LlmClient {
    pub fn new(provider: Provider, api_key: String, timeout: Duration) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            provider,
            api_key,
        })
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Makes a raw call to the completion API and returns the text content.
    /// Retries on 429 (rate limit) and 5xx errors with exponential backoff.
    pub async fn call(
        &self,
        prompt: &str,
        system: &str,
        tier: ModelTier,
    ) -> Result<String, LlmError> {
        let model = self.provider.model(tier);
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self.send(model, prompt, system).await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ApiError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let text = match self.provider {
                Provider::Claude => response.json::<AnthropicResponse>().await?.into_text(),
                Provider::OpenAi => response.json::<OpenAiResponse>().await?.into_text(),
            };
            return text.filter(|t| !t.trim().is_empty()).ok_or(LlmError::EmptyContent);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }

    /// Convenience method that calls the LLM and deserializes the text response as JSON.
    /// The prompt must instruct the model to return valid JSON.
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        prompt: &str,
        system: &str,
        tier: ModelTier,
    ) -> Result<T, LlmError> {
        let text = self.call(prompt, system, tier).await?;
        serde_json::from_str(strip_json_fences(&text)).map_err(LlmError::Parse)
    }

    async fn send(
        &self,
        model: &str,
        prompt: &str,
        system: &str,
    ) -> Result<reqwest::Response, reqwest::Error> {
        match self.provider {
            Provider::Claude => {
                let body = AnthropicRequest {
                    model,
                    max_tokens: MAX_TOKENS,
                    temperature: TEMPERATURE,
                    system,
                    messages: vec![ChatMessage {
                        role: "user",
                        content: prompt,
                    }],
                };
                self.client
                    .post(ANTHROPIC_API_URL)
                    .header("x-api-key", &self.api_key)
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .header("content-type", "application/json")
                    .json(&body)
                    .send()
                    .await
            }
            Provider::OpenAi => {
                let body = OpenAiRequest {
                    model,
                    temperature: TEMPERATURE,
                    messages: vec![
                        ChatMessage {
                            role: "system",
                            content: system,
                        },
                        ChatMessage {
                            role: "user",
                            content: prompt,
                        },
                    ],
                    response_format: ResponseFormat {
                        format_type: "json_object",
                    },
                };
                self.client
                    .post(OPENAI_API_URL)
                    .bearer_auth(&self.api_key)
                    .json(&body)
                    .send()
                    .await
            }
        }
    }
}

/// Removes a surrounding markdown code fence (with or without a `json` tag).
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(body) = text.strip_prefix("```") else {
        return text;
    };
    let body = body.strip_prefix("json").unwrap_or(body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
