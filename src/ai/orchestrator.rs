//! Reasoning Orchestrator
//!
//! Composes a provider adapter with the cost governor and the analysis
//! history to serve the analysis operations with uniform fallback behavior.
//! Only the stuck-scan diagnosis path is budget-governed; it is the
//! spend-heavy, highest-call-volume operation. Triage, remediation, and
//! architecture requests delegate straight to the adapter.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{info, warn};

use crate::ai::budget::{Admission, CostGovernor, LedgerEntry, LedgerStats};
use crate::ai::provider::SharedProvider;
use crate::types::{
    AnalysisRequest, ArchitectureOverview, RemediationPlan, Result, ScanAnalysis, TriageAssessment,
};

pub struct ReasoningOrchestrator {
    provider: SharedProvider,
    governor: CostGovernor,
}

impl ReasoningOrchestrator {
    pub fn new(provider: SharedProvider, cost_ceiling: f64) -> Self {
        Self {
            provider,
            governor: CostGovernor::new(cost_ceiling),
        }
    }

    /// Diagnose a stuck scan.
    ///
    /// Admission is checked before the paid call; a denial synthesizes a
    /// fallback without touching the provider or the ledger. An admitted
    /// call is recorded exactly once, whether the adapter succeeded or fell
    /// back internally.
    pub async fn analyze_stuck_scan(&self, request: &AnalysisRequest) -> ScanAnalysis {
        match self.governor.admit() {
            Admission::Denied { average, ceiling } => {
                warn!(
                    repo = %request.repo_name,
                    average,
                    ceiling,
                    "skipping analysis: cost budget exceeded"
                );
                ScanAnalysis::fallback(
                    format!(
                        "Cost budget exceeded: average ${average:.2} per analysis \
                         over ${ceiling:.2} ceiling"
                    ),
                    format!(
                        "Unable to perform AI analysis for {} ({}). Using fallback.",
                        request.repo_name, request.scanner
                    ),
                )
            }
            Admission::Granted => {
                let snapshot = request.snapshot();
                let history = self.governor.history_for_repo(&request.repo_name);

                info!(
                    repo = %request.repo_name,
                    scanner = %request.scanner,
                    provider = self.provider.name(),
                    "analyzing stuck scan"
                );
                let analysis = self.provider.analyze_stuck_scan(&snapshot, &history).await;

                self.governor
                    .record_analysis(LedgerEntry::new(snapshot, analysis.clone()));

                info!(
                    repo = %request.repo_name,
                    suggestions = analysis.suggestions.len(),
                    confidence = analysis.confidence,
                    cost = analysis.estimated_cost,
                    "analysis complete"
                );
                analysis
            }
        }
    }

    /// Triage a finding. Not budget-governed.
    pub async fn triage_finding(
        &self,
        title: &str,
        description: &str,
        severity: &str,
        scanner: &str,
    ) -> TriageAssessment {
        self.provider
            .triage_finding(title, description, severity, scanner)
            .await
    }

    /// Generate a remediation plan. Not budget-governed.
    pub async fn generate_remediation(
        &self,
        vuln_type: &str,
        description: &str,
        context: &str,
        language: &str,
    ) -> RemediationPlan {
        self.provider
            .generate_remediation(vuln_type, description, context, language)
            .await
    }

    /// Generate an architecture overview. Not budget-governed.
    pub async fn generate_architecture_overview(
        &self,
        repo_name: &str,
        file_structure: &str,
        config_files: &BTreeMap<String, String>,
    ) -> ArchitectureOverview {
        self.provider
            .generate_architecture_overview(repo_name, file_structure, config_files)
            .await
    }

    /// Explain a scan timeout in plain language. Not budget-governed.
    pub async fn explain_timeout(
        &self,
        repo_name: &str,
        scanner: &str,
        timeout_secs: u64,
        context: &Value,
    ) -> String {
        self.provider
            .explain_timeout(repo_name, scanner, timeout_secs, context)
            .await
    }

    /// Seed spend recorded outside the governed analysis path.
    pub fn record_external_cost(&self, cost: f64, tokens: u64) {
        self.governor.record_external(cost, tokens);
    }

    /// Probe the configured backend.
    pub async fn health_check(&self) -> Result<bool> {
        self.provider.health_check().await
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn history(&self) -> Vec<LedgerEntry> {
        self.governor.history()
    }

    pub fn total_cost(&self) -> f64 {
        self.governor.total_cost()
    }

    pub fn stats(&self) -> LedgerStats {
        self.governor.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::tests::MockBackend;
    use std::sync::Arc;
    use std::time::Duration;

    const ANALYSIS_JSON: &str = "{\"root_cause\": \"repo too large\", \"severity\": \"high\", \
         \"confidence\": 0.8, \"explanation\": \"x\", \"remediation_suggestions\": []}";

    fn request(repo: &str) -> AnalysisRequest {
        AnalysisRequest::new(repo, "semgrep", "scan", Duration::from_secs(900))
    }

    #[tokio::test]
    async fn test_admitted_call_recorded_exactly_once() {
        let backend = Arc::new(MockBackend::with_response(ANALYSIS_JSON));
        let orchestrator = ReasoningOrchestrator::new(backend, 0.50);

        let analysis = orchestrator.analyze_stuck_scan(&request("svc-gateway")).await;
        assert_eq!(analysis.root_cause, "repo too large");
        assert_eq!(orchestrator.history().len(), 1);
        assert!((orchestrator.total_cost() - 0.01).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_adapter_failure_still_recorded() {
        let backend = Arc::new(MockBackend::failing());
        let orchestrator = ReasoningOrchestrator::new(backend, 0.50);

        let analysis = orchestrator.analyze_stuck_scan(&request("svc-gateway")).await;
        assert_eq!(analysis.confidence, 0.0);
        // the admitted call completed (as a fallback) and entered history
        assert_eq!(orchestrator.history().len(), 1);
        assert_eq!(orchestrator.total_cost(), 0.0);
    }

    #[tokio::test]
    async fn test_budget_denial_end_to_end() {
        // ceiling $0.50; two admitted calls summing to $1.20 (avg $0.60)
        let backend = Arc::new(MockBackend::with_costs(
            vec![ANALYSIS_JSON.to_string()],
            vec![0.40, 0.80],
        ));
        let orchestrator = ReasoningOrchestrator::new(backend, 0.50);
        orchestrator.analyze_stuck_scan(&request("repo-a")).await;
        orchestrator.analyze_stuck_scan(&request("repo-b")).await;
        assert!((orchestrator.total_cost() - 1.20).abs() < 1e-9);

        let denied = orchestrator.analyze_stuck_scan(&request("svc-gateway")).await;
        assert_eq!(denied.confidence, 0.0);
        assert!(denied.root_cause.contains("budget exceeded"));
        // ledger untouched by the denial
        assert!((orchestrator.total_cost() - 1.20).abs() < 1e-9);
        assert_eq!(orchestrator.history().len(), 2);
    }

    #[tokio::test]
    async fn test_history_accumulates_per_repo() {
        let backend = Arc::new(MockBackend::with_response(ANALYSIS_JSON));
        let orchestrator = ReasoningOrchestrator::new(backend, 10.0);

        orchestrator.analyze_stuck_scan(&request("repo-a")).await;
        orchestrator.analyze_stuck_scan(&request("repo-b")).await;
        orchestrator.analyze_stuck_scan(&request("repo-a")).await;

        let history = orchestrator.history();
        assert_eq!(history.len(), 3);
        assert_eq!(
            history
                .iter()
                .filter(|entry| entry.repo_name == "repo-a")
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn test_stats_average() {
        let backend = Arc::new(MockBackend::with_response(ANALYSIS_JSON));
        let orchestrator = ReasoningOrchestrator::new(backend, 10.0);

        orchestrator.analyze_stuck_scan(&request("repo-a")).await;
        orchestrator.analyze_stuck_scan(&request("repo-b")).await;

        let stats = orchestrator.stats();
        assert_eq!(stats.analyses, 2);
        assert!((stats.average_cost - 0.01).abs() < 1e-12);
    }
}
