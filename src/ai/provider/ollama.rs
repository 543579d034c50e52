//! Ollama Local Backend
//!
//! Backend for any locally-hosted OpenAI-compatible endpoint (Ollama by
//! default). Reuses the chat-completions wire shape; calls cost nothing.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::openai::{ChatCompletionResponse, build_chat_body, parse_chat_response};
use super::{Completion, CompletionRequest, ProviderAdapter};
use crate::config::LlmConfig;
use crate::types::{AuditError, Result};

const DEFAULT_API_BASE: &str = "http://localhost:11434/v1";
const DEFAULT_MODEL: &str = "llama3";

/// Local OpenAI-compatible backend
#[derive(Debug)]
pub struct OllamaBackend {
    api_base: String,
    model: String,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_base = config
            .api_base
            .clone()
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let api_base = Self::validate_endpoint(&api_base)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                AuditError::ProviderUnavailable(format!("Failed to create HTTP client: {e}"))
            })?;

        let backend = Self {
            api_base,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: config.max_tokens,
            client,
        };
        info!(
            "Initialized Ollama backend with model: {} at {}",
            backend.model, backend.api_base
        );
        Ok(backend)
    }

    /// Validate endpoint URL for security (SSRF prevention).
    ///
    /// Only allows http/https schemes and warns for non-localhost endpoints.
    /// Appends `/v1` when the OpenAI-compatible prefix is missing.
    fn validate_endpoint(endpoint: &str) -> Result<String> {
        let url = url::Url::parse(endpoint).map_err(|e| {
            AuditError::ProviderUnavailable(format!(
                "Invalid Ollama endpoint URL '{endpoint}': {e}"
            ))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(AuditError::ProviderUnavailable(format!(
                "Ollama endpoint must use http or https scheme, got: {}",
                url.scheme()
            )));
        }

        if let Some(host) = url.host_str()
            && !matches!(host, "localhost" | "127.0.0.1" | "::1")
        {
            warn!("Ollama endpoint is not localhost: {host}. Ensure this is intentional.");
        }

        let mut result = url.to_string();
        while result.ends_with('/') {
            result.pop();
        }
        if !result.ends_with("/v1") {
            result.push_str("/v1");
        }
        Ok(result)
    }
}

#[async_trait]
impl ProviderAdapter for OllamaBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        debug!(model = %self.model, "sending request to Ollama API");

        let body: Value = build_chat_body(&self.model, &request);
        let url = format!("{}/chat/completions", self.api_base);

        let response = self
            .client
            .post(&url)
            // some OpenAI-compatible servers insist on a bearer token
            .header("Authorization", "Bearer ollama")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    AuditError::provider_call(format!(
                        "Failed to connect to Ollama at {}. Is Ollama running? Start with: ollama serve",
                        self.api_base
                    ))
                } else {
                    AuditError::provider_call(format!("Ollama request failed: {e}"))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuditError::provider_call(format!(
                "Ollama API error ({status}): {body}"
            )));
        }

        let response: ChatCompletionResponse = response.json().await.map_err(|e| {
            AuditError::provider_call(format!("Failed to parse Ollama response: {e}"))
        })?;

        let (text, usage) = parse_chat_response(response, "Ollama")?;

        // Local model, no API cost
        Ok(Completion {
            text,
            usage,
            cost_usd: 0.0,
        })
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn max_output_tokens(&self) -> u32 {
        self.max_tokens
    }

    fn estimate_cost(&self, _input_tokens: u32, _output_tokens: u32) -> f64 {
        0.0
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models", self.api_base);

        let response = self.client.get(&url).send().await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                info!("Ollama is available");
                Ok(true)
            }
            Ok(resp) => {
                warn!("Ollama API check failed: {}", resp.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Ollama not available: {e}. Start with: ollama serve");
                Ok(false)
            }
        }
    }
}
