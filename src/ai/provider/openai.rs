//! OpenAI API Backend
//!
//! Hosted GPT-style backend using the Chat Completions API. The request
//! shape (token-limit parameter, temperature, system role) comes from the
//! model parameter policy, so reasoning-family models are handled without
//! any local branching.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{Completion, CompletionRequest, ProviderAdapter, TokenUsage};
use crate::ai::params;
use crate::ai::pricing::{OPENAI_PRICES, PriceTable};
use crate::config::LlmConfig;
use crate::types::{AuditError, Result};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";

/// OpenAI backend with secure API key handling
pub struct OpenAiBackend {
    /// API key stored securely - never exposed in logs or debug output
    api_key: SecretString,
    api_base: String,
    model: String,
    max_tokens: u32,
    prices: &'static PriceTable,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiBackend")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl OpenAiBackend {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                AuditError::ProviderUnavailable(
                    "OpenAI API key not found. Set OPENAI_API_KEY or provide llm.api_key"
                        .to_string(),
                )
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                AuditError::ProviderUnavailable(format!("Failed to create HTTP client: {e}"))
            })?;

        let backend = Self {
            api_key: SecretString::from(api_key),
            api_base: config
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: config.max_tokens,
            prices: &OPENAI_PRICES,
            client,
        };
        info!("Initialized OpenAI backend with model: {}", backend.model);
        Ok(backend)
    }
}

/// Build an OpenAI-style chat-completions body from the resolved call spec.
/// Also used by the OpenAI-compatible local backend.
pub(super) fn build_chat_body(model: &str, request: &CompletionRequest) -> Value {
    let spec = params::resolve(
        model,
        &request.system,
        &request.user,
        request.max_tokens,
        request.temperature,
    );

    let mut body = serde_json::json!({
        "model": model,
        "messages": spec.messages,
    });
    body[spec.max_tokens_param] = Value::from(spec.max_tokens);
    if let Some(temperature) = spec.temperature {
        body["temperature"] = Value::from(temperature);
    }
    // reasoning models also reject response_format
    if request.json_response && spec.supports_system_role() {
        body["response_format"] = serde_json::json!({"type": "json_object"});
    }

    body
}

/// Extract text + usage from an OpenAI-style response.
pub(super) fn parse_chat_response(
    response: ChatCompletionResponse,
    backend: &str,
) -> Result<(String, TokenUsage)> {
    let usage = response
        .usage
        .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
        .unwrap_or_default();

    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AuditError::provider_call(format!("No content in {backend} response")))?;

    Ok((content, usage))
}

#[async_trait]
impl ProviderAdapter for OpenAiBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        debug!(model = %self.model, "sending request to OpenAI API");

        let body = build_chat_body(&self.model, &request);
        let url = format!("{}/chat/completions", self.api_base);

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AuditError::provider_call(format!("OpenAI request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuditError::provider_call(format!(
                "OpenAI API error ({status}): {body}"
            )));
        }

        let response: ChatCompletionResponse = response.json().await.map_err(|e| {
            AuditError::provider_call(format!("Failed to parse OpenAI response: {e}"))
        })?;

        let (text, usage) = parse_chat_response(response, "OpenAI")?;
        let cost_usd = self.estimate_cost(usage.input_tokens, usage.output_tokens);

        Ok(Completion {
            text,
            usage,
            cost_usd,
        })
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn max_output_tokens(&self) -> u32 {
        self.max_tokens
    }

    fn estimate_cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        self.prices.estimate(&self.model, input_tokens, output_tokens)
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models", self.api_base);

        let response = self
            .client
            .get(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                info!("OpenAI API is available");
                Ok(true)
            }
            Ok(resp) => {
                warn!("OpenAI API check failed: {}", resp.status());
                Ok(false)
            }
            Err(e) => {
                warn!("OpenAI API check failed: {e}");
                Ok(false)
            }
        }
    }
}

// Wire types

#[derive(Debug, Deserialize)]
pub(super) struct ChatCompletionResponse {
    pub choices: Vec<Choice>,
    pub usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
pub(super) struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub(super) struct ResponseMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct UsageInfo {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}
