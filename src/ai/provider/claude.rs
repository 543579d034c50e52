//! Anthropic Claude Backend
//!
//! Hosted Claude-style backend using the Messages API. The wire shape
//! differs from chat completions: the system instruction is a top-level
//! field and `max_tokens` is mandatory. The call spec still supplies the
//! resolved messages, token limit, and temperature decision.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{Completion, CompletionRequest, ProviderAdapter, TokenUsage};
use crate::ai::params;
use crate::ai::pricing::{CLAUDE_PRICES, PriceTable};
use crate::config::LlmConfig;
use crate::constants::network;
use crate::types::{AuditError, Result};

const DEFAULT_API_BASE: &str = "https://api.anthropic.com/v1";
const DEFAULT_MODEL: &str = "claude-3-sonnet-20240229";

/// Anthropic backend with secure API key handling
pub struct ClaudeBackend {
    api_key: SecretString,
    api_base: String,
    model: String,
    max_tokens: u32,
    prices: &'static PriceTable,
    client: reqwest::Client,
}

impl std::fmt::Debug for ClaudeBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaudeBackend")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl ClaudeBackend {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .ok_or_else(|| {
                AuditError::ProviderUnavailable(
                    "Anthropic API key not found. Set ANTHROPIC_API_KEY or provide llm.api_key"
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
            prices: &CLAUDE_PRICES,
            client,
        };
        info!("Initialized Claude backend with model: {}", backend.model);
        Ok(backend)
    }

    fn build_body(&self, request: &CompletionRequest) -> Value {
        let spec = params::resolve(
            &self.model,
            &request.system,
            &request.user,
            request.max_tokens,
            request.temperature,
        );

        // The Messages API takes the system instruction as a top-level
        // field; user-role messages pass through unchanged.
        let system = spec
            .messages
            .iter()
            .find(|m| m.role == "system")
            .map(|m| m.content.clone());
        let messages: Vec<Value> = spec
            .messages
            .iter()
            .filter(|m| m.role != "system")
            .map(|m| serde_json::json!({"role": m.role, "content": m.content}))
            .collect();

        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": spec.max_tokens,
            "messages": messages,
        });
        if let Some(system) = system {
            body["system"] = Value::from(system);
        }
        if let Some(temperature) = spec.temperature {
            body["temperature"] = Value::from(temperature);
        }

        body
    }
}

#[async_trait]
impl ProviderAdapter for ClaudeBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        debug!(model = %self.model, "sending request to Anthropic API");

        let body = self.build_body(&request);
        let url = format!("{}/messages", self.api_base);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", network::ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AuditError::provider_call(format!("Anthropic request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuditError::provider_call(format!(
                "Anthropic API error ({status}): {body}"
            )));
        }

        let response: MessagesResponse = response.json().await.map_err(|e| {
            AuditError::provider_call(format!("Failed to parse Anthropic response: {e}"))
        })?;

        let text = response
            .content
            .into_iter()
            .find_map(|block| block.text)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuditError::provider_call("No content in Anthropic response"))?;

        let usage = TokenUsage::new(response.usage.input_tokens, response.usage.output_tokens);
        let cost_usd = self.estimate_cost(usage.input_tokens, usage.output_tokens);

        Ok(Completion {
            text,
            usage,
            cost_usd,
        })
    }

    fn name(&self) -> &str {
        "claude"
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
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", network::ANTHROPIC_VERSION)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                info!("Anthropic API is available");
                Ok(true)
            }
            Ok(resp) => {
                warn!("Anthropic API check failed: {}", resp.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Anthropic API check failed: {e}");
                Ok(false)
            }
        }
    }
}

// Wire types

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: MessagesUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::prompt::Prompt;

    fn backend() -> ClaudeBackend {
        ClaudeBackend::new(&LlmConfig {
            provider: "claude".to_string(),
            api_key: Some("test-key".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_system_lifted_to_top_level() {
        let request = CompletionRequest::new(
            Prompt {
                system: "You are a security analyst.".to_string(),
                user: "Triage this.".to_string(),
            },
            500,
            0.2,
        );

        let body = backend().build_body(&request);
        assert_eq!(body["system"], "You are a security analyst.");
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(body["max_tokens"], 500);
    }

    #[test]
    fn test_missing_key_is_unavailable() {
        if std::env::var("ANTHROPIC_API_KEY").is_ok() {
            return;
        }
        let config = LlmConfig {
            provider: "claude".to_string(),
            ..Default::default()
        };
        match ClaudeBackend::new(&config) {
            Err(AuditError::ProviderUnavailable(_)) => {}
            other => panic!("expected ProviderUnavailable, got {other:?}"),
        }
    }
}

