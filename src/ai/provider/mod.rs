//! Provider Adapters
//!
//! A uniform capability contract over API-incompatible model backends.
//! Each backend implements only the low-level `complete` call (plus
//! identification, pricing, and a health probe); the analysis operations are
//! provided methods built on top of it, so prompt construction, response
//! sanitization, and fallback behavior are identical across backends.
//!
//! ## Failure contract
//!
//! The capability operations never surface transport or parse errors: any
//! internal failure becomes the operation's typed fallback value (zero
//! confidence, zero cost, reason text in the result). Only construction may
//! fail, with `ProviderUnavailable`.

mod claude;
mod ollama;
mod openai;

pub use claude::ClaudeBackend;
pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info};

use crate::ai::{prompt, sanitize};
use crate::config::LlmConfig;
use crate::constants::tokens;
use crate::types::{
    ArchitectureOverview, AuditError, DiagnosticSnapshot, RemediationPlan, Result, ScanAnalysis,
    Severity, TriageAssessment,
};

use super::budget::LedgerEntry;

// =============================================================================
// Completion Request / Response
// =============================================================================

/// One low-level model call, backend-agnostic.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    /// Desired sampling temperature; dropped for model families that only
    /// accept their default
    pub temperature: f32,
    /// Ask the backend for a JSON object response where supported
    pub json_response: bool,
}

impl CompletionRequest {
    pub fn new(prompt: prompt::Prompt, max_tokens: u32, temperature: f32) -> Self {
        Self {
            system: prompt.system,
            user: prompt.user,
            max_tokens,
            temperature,
            json_response: false,
        }
    }

    pub fn expect_json(mut self) -> Self {
        self.json_response = true;
        self
    }
}

/// Token usage reported (or estimated) by a backend for one call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens as u64 + self.output_tokens as u64
    }
}

/// Raw outcome of one model call: text plus accounting.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
    /// Estimated cost of this call in USD (0 for local backends)
    pub cost_usd: f64,
}

// =============================================================================
// Provider Adapter Trait
// =============================================================================

/// Shared provider adapter handle.
pub type SharedProvider = Arc<dyn ProviderAdapter>;

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Execute one model call. The only method that may return transport or
    /// parse errors; everything above it converts them to fallbacks.
    async fn complete(&self, request: CompletionRequest) -> Result<Completion>;

    /// Backend name for logging
    fn name(&self) -> &str;

    /// Model id currently in use
    fn model(&self) -> &str;

    /// Configured output-token default for analysis responses
    fn max_output_tokens(&self) -> u32;

    /// Estimate cost in USD from the backend's price table. Unknown model
    /// ids fall back to a designated default row.
    fn estimate_cost(&self, input_tokens: u32, output_tokens: u32) -> f64;

    /// Check whether the backend is reachable
    async fn health_check(&self) -> Result<bool>;

    // =========================================================================
    // Capability operations (identical across backends)
    // =========================================================================

    /// Diagnose a stuck scan. Returns a fallback analysis (confidence 0,
    /// cost 0) on any internal failure.
    async fn analyze_stuck_scan(
        &self,
        snapshot: &DiagnosticSnapshot,
        history: &[LedgerEntry],
    ) -> ScanAnalysis {
        let request = CompletionRequest::new(
            prompt::stuck_scan(snapshot, history),
            self.max_output_tokens(),
            0.3,
        )
        .expect_json();

        match self.complete(request).await {
            Ok(completion) => match sanitize::parse_json(&completion.text) {
                Ok(value) => {
                    let analysis = ScanAnalysis::from_response(
                        &value,
                        completion.cost_usd,
                        completion.usage.total(),
                    );
                    info!(
                        provider = self.name(),
                        suggestions = analysis.suggestions.len(),
                        confidence = analysis.confidence,
                        cost = analysis.estimated_cost,
                        "scan analysis complete"
                    );
                    analysis
                }
                Err(failure) => {
                    error!(
                        provider = self.name(),
                        "unparseable analysis response: {}", failure.message
                    );
                    // The call still happened; keep its cost attribution.
                    let mut analysis = ScanAnalysis::fallback(
                        "Failed to parse model response",
                        "The model reply could not be converted into a structured analysis.",
                    );
                    analysis.estimated_cost = completion.cost_usd;
                    analysis.tokens_used = completion.usage.total();
                    analysis
                }
            },
            Err(e) => {
                error!(provider = self.name(), "scan analysis failed: {e}");
                ScanAnalysis::fallback(
                    format!("AI analysis failed: {e}"),
                    "Unable to complete AI analysis due to an error.",
                )
            }
        }
    }

    /// Triage one finding. The fallback keeps the scanner-reported severity.
    async fn triage_finding(
        &self,
        title: &str,
        description: &str,
        severity: &str,
        scanner: &str,
    ) -> TriageAssessment {
        let reported = Severity::parse_or_default(severity);
        let request = CompletionRequest::new(
            prompt::triage(title, description, severity, scanner),
            tokens::TRIAGE,
            0.2,
        )
        .expect_json();

        match self.complete(request).await {
            Ok(completion) => match sanitize::parse_json(&completion.text) {
                Ok(value) => TriageAssessment::from_response(&value, reported),
                Err(failure) => {
                    error!(
                        provider = self.name(),
                        "unparseable triage response: {}", failure.message
                    );
                    TriageAssessment::fallback(reported, "Failed to parse triage response")
                }
            },
            Err(e) => {
                error!(provider = self.name(), "triage failed: {e}");
                TriageAssessment::fallback(reported, format!("AI triage failed: {e}"))
            }
        }
    }

    /// Generate a remediation plan for a vulnerability.
    async fn generate_remediation(
        &self,
        vuln_type: &str,
        description: &str,
        context: &str,
        language: &str,
    ) -> RemediationPlan {
        let request = CompletionRequest::new(
            prompt::remediation(vuln_type, description, context, language),
            tokens::REMEDIATION,
            0.2,
        )
        .expect_json();

        match self.complete(request).await {
            Ok(completion) => match sanitize::parse_json(&completion.text) {
                Ok(value) => RemediationPlan::from_response(&value),
                // Unstructured advice is still advice; hand the text back.
                Err(failure) => RemediationPlan::fallback(failure.raw),
            },
            Err(e) => {
                error!(provider = self.name(), "remediation failed: {e}");
                RemediationPlan::fallback(format!("AI generation failed: {e}"))
            }
        }
    }

    /// Generate an architecture report plus diagram source code.
    async fn generate_architecture_overview(
        &self,
        repo_name: &str,
        file_structure: &str,
        config_files: &BTreeMap<String, String>,
    ) -> ArchitectureOverview {
        let request = CompletionRequest::new(
            prompt::architecture(repo_name, file_structure, config_files),
            tokens::ARCHITECTURE,
            0.3,
        );

        match self.complete(request).await {
            Ok(completion) => {
                let (report, diagram_source) =
                    sanitize::split_architecture_response(&completion.text);
                info!(
                    provider = self.name(),
                    has_diagram = diagram_source.is_some(),
                    "architecture overview complete"
                );
                ArchitectureOverview {
                    report,
                    diagram_source,
                }
            }
            Err(e) => {
                error!(provider = self.name(), "architecture overview failed: {e}");
                ArchitectureOverview {
                    report: format!("Failed to generate architecture overview: {e}"),
                    diagram_source: None,
                }
            }
        }
    }

    /// Explain a scan timeout in plain language.
    async fn explain_timeout(
        &self,
        repo_name: &str,
        scanner: &str,
        timeout_secs: u64,
        context: &Value,
    ) -> String {
        let request = CompletionRequest::new(
            prompt::explain_timeout(repo_name, scanner, timeout_secs, context),
            tokens::EXPLAIN,
            0.5,
        );

        match self.complete(request).await {
            Ok(completion) => completion.text.trim().to_string(),
            Err(e) => {
                error!(provider = self.name(), "timeout explanation failed: {e}");
                format!(
                    "The {scanner} scanner exceeded the {timeout_secs} second timeout \
                     while scanning {repo_name}."
                )
            }
        }
    }

    /// Ask for a corrected version of a failing diagram script.
    ///
    /// Unlike the capability operations this may fail: the repair loop owns
    /// the terminal fallback (it keeps the last editable source).
    async fn repair_diagram_code(&self, source: &str, failure: &str) -> Result<String> {
        let request = CompletionRequest::new(
            prompt::diagram_repair(source, failure),
            tokens::DIAGRAM_REPAIR,
            0.2,
        );

        let completion = self.complete(request).await?;
        match sanitize::extract_python_block(&completion.text) {
            Some(code) if !code.trim().is_empty() => Ok(code),
            _ => {
                let stripped = sanitize::strip_code_fences(&completion.text);
                if stripped.trim().is_empty() {
                    Err(AuditError::provider_call("repair produced no code"))
                } else {
                    Ok(stripped)
                }
            }
        }
    }
}

// =============================================================================
// Factory
// =============================================================================

/// Create a shared provider adapter from configuration.
///
/// Fails fast with `ProviderUnavailable` when the selected backend cannot be
/// constructed (missing credential, bad endpoint).
pub fn create_provider(config: &LlmConfig) -> Result<SharedProvider> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiBackend::new(config)?)),
        "claude" => Ok(Arc::new(ClaudeBackend::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaBackend::new(config)?)),
        other => Err(AuditError::Config(format!(
            "Unknown provider: {other}. Supported: openai, claude, ollama"
        ))),
    }
}

// =============================================================================
// Tests (mock-backed; exercise the shared capability surface)
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::AnalysisRequest;
    use std::time::Duration;

    /// Scripted backend used to drive the provided capability methods.
    /// Responses and per-call costs are consumed in order; the last value
    /// repeats.
    pub(crate) struct MockBackend {
        pub responses: std::sync::Mutex<Vec<String>>,
        pub costs: std::sync::Mutex<Vec<f64>>,
        pub fail: bool,
    }

    impl MockBackend {
        pub fn with_response(response: &str) -> Self {
            Self::with_costs(vec![response.to_string()], vec![0.01])
        }

        pub fn with_responses(responses: Vec<String>) -> Self {
            Self::with_costs(responses, vec![0.01])
        }

        pub fn with_costs(responses: Vec<String>, costs: Vec<f64>) -> Self {
            Self {
                responses: std::sync::Mutex::new(responses),
                costs: std::sync::Mutex::new(costs),
                fail: false,
            }
        }

        pub fn failing() -> Self {
            Self {
                responses: std::sync::Mutex::new(Vec::new()),
                costs: std::sync::Mutex::new(Vec::new()),
                fail: true,
            }
        }

        fn next<T: Clone + Default>(queue: &std::sync::Mutex<Vec<T>>) -> T {
            let mut queue = queue.lock().unwrap();
            if queue.len() > 1 {
                queue.remove(0)
            } else {
                queue.first().cloned().unwrap_or_default()
            }
        }
    }

    #[async_trait]
    impl ProviderAdapter for MockBackend {
        async fn complete(&self, _request: CompletionRequest) -> Result<Completion> {
            if self.fail {
                return Err(AuditError::provider_call("connection refused"));
            }
            Ok(Completion {
                text: Self::next(&self.responses),
                usage: TokenUsage::new(100, 50),
                cost_usd: Self::next(&self.costs),
            })
        }

        fn name(&self) -> &str {
            "mock"
        }

        fn model(&self) -> &str {
            "mock-model"
        }

        fn max_output_tokens(&self) -> u32 {
            2000
        }

        fn estimate_cost(&self, _input_tokens: u32, _output_tokens: u32) -> f64 {
            self.costs.lock().unwrap().first().copied().unwrap_or(0.0)
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(!self.fail)
        }
    }

    fn snapshot() -> DiagnosticSnapshot {
        AnalysisRequest::new("svc-gateway", "semgrep", "scan", Duration::from_secs(900)).snapshot()
    }

    #[tokio::test]
    async fn test_analysis_parses_fenced_response() {
        let backend = MockBackend::with_response(
            "```json\n{\"root_cause\": \"oversized repo\", \"severity\": \"high\", \
             \"confidence\": 0.9, \"explanation\": \"too many files\", \
             \"remediation_suggestions\": [{\"action\": \"increase_timeout\", \
             \"params\": {}, \"rationale\": \"slow disk\", \"confidence\": 0.7, \
             \"estimated_impact\": \"completes\", \"safety_level\": \"safe\"}]}\n```",
        );

        let analysis = backend.analyze_stuck_scan(&snapshot(), &[]).await;
        assert_eq!(analysis.root_cause, "oversized repo");
        assert_eq!(analysis.severity, Severity::High);
        assert_eq!(analysis.suggestions.len(), 1);
        assert!((analysis.estimated_cost - 0.01).abs() < 1e-12);
        assert_eq!(analysis.tokens_used, 150);
    }

    #[tokio::test]
    async fn test_analysis_transport_failure_falls_back() {
        let backend = MockBackend::failing();
        let analysis = backend.analyze_stuck_scan(&snapshot(), &[]).await;
        assert_eq!(analysis.confidence, 0.0);
        assert_eq!(analysis.estimated_cost, 0.0);
        assert_eq!(analysis.tokens_used, 0);
        assert!(analysis.root_cause.contains("AI analysis failed"));
    }

    #[tokio::test]
    async fn test_analysis_parse_failure_keeps_cost() {
        let backend = MockBackend::with_response("this is not json");
        let analysis = backend.analyze_stuck_scan(&snapshot(), &[]).await;
        assert_eq!(analysis.confidence, 0.0);
        assert!(analysis.root_cause.contains("parse"));
        // the call happened; its spend is still attributed
        assert!((analysis.estimated_cost - 0.01).abs() < 1e-12);
        assert_eq!(analysis.tokens_used, 150);
    }

    #[tokio::test]
    async fn test_triage_fallback_keeps_reported_severity() {
        let backend = MockBackend::failing();
        let triage = backend
            .triage_finding("SQLi", "user input in query", "High", "semgrep")
            .await;
        assert_eq!(triage.priority, Severity::High);
        assert_eq!(triage.confidence, 0.0);
        assert!(triage.reasoning.contains("AI triage failed"));
    }

    #[tokio::test]
    async fn test_remediation_unparseable_returns_raw_text() {
        let backend = MockBackend::with_response("Upgrade the dependency to 2.4.1 or later.");
        let plan = backend
            .generate_remediation("CVE-2024-0001", "outdated dep", "serde = \"1\"", "rust")
            .await;
        assert!(plan.remediation.contains("Upgrade the dependency"));
        assert!(plan.diff.is_empty());
    }

    #[tokio::test]
    async fn test_architecture_splits_report_and_diagram() {
        let backend = MockBackend::with_response(
            "## Overview\nA gateway service.\n\n```python\nfrom diagrams import Diagram\n```",
        );
        let overview = backend
            .generate_architecture_overview("svc-gateway", "src/", &BTreeMap::new())
            .await;
        assert!(overview.report.contains("## Overview"));
        assert!(!overview.report.contains("```python"));
        assert_eq!(
            overview.diagram_source.as_deref(),
            Some("from diagrams import Diagram")
        );
    }

    #[tokio::test]
    async fn test_explain_timeout_fallback_sentence() {
        let backend = MockBackend::failing();
        let text = backend
            .explain_timeout("svc-gateway", "trivy", 1800, &serde_json::json!({}))
            .await;
        assert!(text.contains("trivy"));
        assert!(text.contains("1800"));
        assert!(text.contains("svc-gateway"));
    }

    #[tokio::test]
    async fn test_repair_strips_fences() {
        let backend = MockBackend::with_response(
            "Here you go:\n```python\nfrom diagrams import Diagram\n```",
        );
        let code = backend
            .repair_diagram_code("broken", "ImportError: whatever")
            .await
            .unwrap();
        assert_eq!(code, "from diagrams import Diagram");
    }

    #[test]
    fn test_factory_rejects_unknown_backend() {
        let config = LlmConfig {
            provider: "watson".to_string(),
            ..Default::default()
        };
        assert!(create_provider(&config).is_err());
    }
}
