//! AI Orchestration Layer
//!
//! Everything between the caller and the model backends: parameter policy,
//! pricing, provider adapters, response sanitization, cost governance, and
//! the reasoning orchestrator.

pub mod budget;
pub mod orchestrator;
pub mod params;
pub mod pricing;
pub mod prompt;
pub mod provider;
pub mod sanitize;

pub use budget::{Admission, CostGovernor, LedgerEntry, LedgerStats};
pub use orchestrator::ReasoningOrchestrator;
pub use params::{ChatMessage, ModelCallSpec, ModelFamily, family_of, resolve};
pub use pricing::{CLAUDE_PRICES, OPENAI_PRICES, PriceRow, PriceTable};
pub use provider::{
    ClaudeBackend, Completion, CompletionRequest, OllamaBackend, OpenAiBackend, ProviderAdapter,
    SharedProvider, TokenUsage, create_provider,
};
