//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/auditmind/) and project (.auditmind/) level
//! configuration.

use serde::{Deserialize, Serialize};

use crate::constants::{budget, network, sandbox};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// LLM backend settings
    pub llm: LlmConfig,

    /// Cost governance settings
    pub budget: BudgetConfig,

    /// Diagram sandbox settings
    pub sandbox: SandboxConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            llm: LlmConfig::default(),
            budget: BudgetConfig::default(),
            sandbox: SandboxConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `AuditError::Config` on validation failure.
    pub fn validate(&self) -> crate::types::Result<()> {
        if self.llm.timeout_secs == 0 {
            return Err(crate::types::AuditError::Config(
                "LLM timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.llm.max_tokens == 0 {
            return Err(crate::types::AuditError::Config(
                "LLM max_tokens must be greater than 0".to_string(),
            ));
        }

        if self.budget.cost_ceiling_usd < 0.0 {
            return Err(crate::types::AuditError::Config(format!(
                "Budget cost_ceiling_usd must be non-negative, got {}",
                self.budget.cost_ceiling_usd
            )));
        }

        if self.sandbox.timeout_secs == 0 {
            return Err(crate::types::AuditError::Config(
                "Sandbox timeout_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

/// LLM backend configuration
///
/// Note: API keys are handled securely - they are never serialized to output
/// and are redacted in debug output. Each backend converts the key to
/// SecretString internally for runtime protection.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Backend type: "openai", "claude", "ollama"
    pub provider: String,

    /// Model name (backend-specific)
    pub model: Option<String>,

    /// API key (for OpenAI, Anthropic)
    /// Never serialized to output for security
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Default maximum tokens for analysis responses
    pub max_tokens: u32,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: None,
            api_key: None,
            api_base: None,
            max_tokens: 2000,
            timeout_secs: network::DEFAULT_TIMEOUT_SECS,
        }
    }
}

// =============================================================================
// Budget Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Ceiling on average cost per stuck-scan analysis (USD)
    pub cost_ceiling_usd: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            cost_ceiling_usd: budget::DEFAULT_COST_CEILING_USD,
        }
    }
}

// =============================================================================
// Sandbox Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Interpreter used to run generated diagram scripts
    pub interpreter: String,

    /// Hard wall-clock limit for one execution (seconds)
    pub timeout_secs: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            interpreter: sandbox::DEFAULT_INTERPRETER.to_string(),
            timeout_secs: sandbox::EXEC_TIMEOUT_SECS,
        }
    }
}
