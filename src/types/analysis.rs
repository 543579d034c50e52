//! Analysis Domain Model
//!
//! Typed results for the four analysis operations plus the request/snapshot
//! pair handed to provider adapters. Every result type has a fallback
//! constructor so failure paths stay well-formed: confidence drops to zero
//! and cost/token counters default to zero, but no field is ever absent.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

// =============================================================================
// Severity
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

impl Severity {
    /// Parse leniently, falling back to Medium for anything unrecognized.
    pub fn parse_or_default(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

// =============================================================================
// Remediation
// =============================================================================

/// Closed set of remediation kinds a model may suggest for a stuck scan.
/// Suggestions with any other action are dropped during parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationAction {
    IncreaseTimeout,
    ExcludePaths,
    ReduceScope,
    RetryScan,
    SkipScanner,
    IncreaseResources,
}

impl FromStr for RemediationAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "increase_timeout" => Ok(Self::IncreaseTimeout),
            "exclude_paths" => Ok(Self::ExcludePaths),
            "reduce_scope" => Ok(Self::ReduceScope),
            "retry_scan" => Ok(Self::RetryScan),
            "skip_scanner" => Ok(Self::SkipScanner),
            "increase_resources" => Ok(Self::IncreaseResources),
            _ => Err(format!("unknown remediation action: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SafetyLevel {
    Safe,
    #[default]
    Moderate,
    Risky,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationSuggestion {
    pub action: RemediationAction,
    /// Action parameters (e.g. new timeout value, paths to exclude)
    pub params: serde_json::Map<String, Value>,
    pub rationale: String,
    /// Model confidence in this suggestion, clamped to [0, 1]
    pub confidence: f32,
    pub estimated_impact: String,
    pub safety_level: SafetyLevel,
}

impl RemediationSuggestion {
    /// Parse one suggestion from a model response element.
    ///
    /// Returns None when the action is missing or outside the closed set;
    /// a bad suggestion never aborts the surrounding analysis.
    pub fn from_value(value: &Value) -> Option<Self> {
        let action = value.get("action")?.as_str()?;
        let action = match action.parse::<RemediationAction>() {
            Ok(a) => a,
            Err(e) => {
                warn!("skipping invalid suggestion: {e}");
                return None;
            }
        };

        Some(Self {
            action,
            params: value
                .get("params")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            rationale: json_string(value, "rationale"),
            confidence: json_confidence(value, "confidence", 0.5),
            estimated_impact: value
                .get("estimated_impact")
                .and_then(Value::as_str)
                .unwrap_or("Unknown")
                .to_string(),
            safety_level: value
                .get("safety_level")
                .and_then(Value::as_str)
                .and_then(|s| {
                    serde_json::from_value::<SafetyLevel>(Value::String(s.to_string())).ok()
                })
                .unwrap_or_default(),
        })
    }
}

// =============================================================================
// Scan Analysis
// =============================================================================

/// Result of one stuck-scan analysis.
///
/// Invariants: `confidence` is within [0, 1]; `estimated_cost` and
/// `tokens_used` are always present, defaulting to zero on failure paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanAnalysis {
    pub root_cause: String,
    pub severity: Severity,
    pub suggestions: Vec<RemediationSuggestion>,
    pub confidence: f32,
    pub explanation: String,
    pub estimated_cost: f64,
    pub tokens_used: u64,
}

impl ScanAnalysis {
    /// Build an analysis from a parsed model response, attributing the
    /// call's actual cost and token usage. Invalid suggestions are skipped
    /// individually.
    pub fn from_response(value: &Value, cost: f64, tokens: u64) -> Self {
        let suggestions = value
            .get("remediation_suggestions")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(RemediationSuggestion::from_value)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            root_cause: value
                .get("root_cause")
                .and_then(Value::as_str)
                .unwrap_or("Unknown")
                .to_string(),
            severity: value
                .get("severity")
                .and_then(Value::as_str)
                .map(Severity::parse_or_default)
                .unwrap_or_default(),
            suggestions,
            confidence: json_confidence(value, "confidence", 0.5),
            explanation: json_string(value, "explanation"),
            estimated_cost: cost.max(0.0),
            tokens_used: tokens,
        }
    }

    /// Synthesize the zero-confidence fallback used on every failure path.
    pub fn fallback(root_cause: impl Into<String>, explanation: impl Into<String>) -> Self {
        Self {
            root_cause: root_cause.into(),
            severity: Severity::Medium,
            suggestions: Vec::new(),
            confidence: 0.0,
            explanation: explanation.into(),
            estimated_cost: 0.0,
            tokens_used: 0,
        }
    }
}

// =============================================================================
// Triage
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageAssessment {
    pub priority: Severity,
    pub confidence: f32,
    pub false_positive_probability: f32,
    pub reasoning: String,
}

impl TriageAssessment {
    pub fn from_response(value: &Value, reported: Severity) -> Self {
        Self {
            priority: value
                .get("priority")
                .and_then(Value::as_str)
                .map(Severity::parse_or_default)
                .unwrap_or(reported),
            confidence: json_confidence(value, "confidence", 0.0),
            false_positive_probability: json_confidence(value, "false_positive_probability", 0.0),
            reasoning: json_string(value, "reasoning"),
        }
    }

    /// Fallback keeps the scanner-reported severity as the priority.
    pub fn fallback(reported: Severity, reasoning: impl Into<String>) -> Self {
        Self {
            priority: reported,
            confidence: 0.0,
            false_positive_probability: 0.0,
            reasoning: reasoning.into(),
        }
    }
}

// =============================================================================
// Remediation Plan & Architecture Overview
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationPlan {
    /// Markdown explanation of the fix
    pub remediation: String,
    /// Unified diff, empty when no code change applies
    pub diff: String,
}

impl RemediationPlan {
    pub fn from_response(value: &Value) -> Self {
        Self {
            remediation: json_string(value, "remediation"),
            diff: json_string(value, "diff"),
        }
    }

    pub fn fallback(remediation: impl Into<String>) -> Self {
        Self {
            remediation: remediation.into(),
            diff: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchitectureOverview {
    /// Markdown report with the diagram code block removed
    pub report: String,
    /// Extracted diagram script, when the model produced one
    pub diagram_source: Option<String>,
}

// =============================================================================
// Request & Snapshot
// =============================================================================

/// One stuck-scan analysis request. Immutable once built.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub repo_name: String,
    pub scanner: String,
    pub phase: String,
    pub timeout: Duration,
    pub repo_metadata: Option<Value>,
    pub scanner_progress: Option<Value>,
}

impl AnalysisRequest {
    pub fn new(
        repo_name: impl Into<String>,
        scanner: impl Into<String>,
        phase: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            repo_name: repo_name.into(),
            scanner: scanner.into(),
            phase: phase.into(),
            timeout,
            repo_metadata: None,
            scanner_progress: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.repo_metadata = Some(metadata);
        self
    }

    pub fn with_progress(mut self, progress: Value) -> Self {
        self.scanner_progress = Some(progress);
        self
    }

    /// Freeze this request into the snapshot handed to a provider adapter.
    pub fn snapshot(&self) -> DiagnosticSnapshot {
        DiagnosticSnapshot {
            repo_name: self.repo_name.clone(),
            scanner: self.scanner.clone(),
            phase: self.phase.clone(),
            timeout_secs: self.timeout.as_secs(),
            repo_metadata: self.repo_metadata.clone(),
            scanner_progress: self.scanner_progress.clone(),
            captured_at: Utc::now(),
        }
    }
}

/// Read-only view of an analysis request at capture time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticSnapshot {
    pub repo_name: String,
    pub scanner: String,
    pub phase: String,
    pub timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_metadata: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scanner_progress: Option<Value>,
    pub captured_at: DateTime<Utc>,
}

// =============================================================================
// JSON helpers
// =============================================================================

fn json_string(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Read a float field and clamp it into [0, 1].
fn json_confidence(value: &Value, key: &str, default: f32) -> f32 {
    value
        .get(key)
        .and_then(Value::as_f64)
        .map(|f| f as f32)
        .unwrap_or(default)
        .clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_severity_parse_lenient() {
        assert_eq!(Severity::parse_or_default("Critical"), Severity::Critical);
        assert_eq!(Severity::parse_or_default("HIGH"), Severity::High);
        assert_eq!(Severity::parse_or_default("nonsense"), Severity::Medium);
    }

    #[test]
    fn test_suggestion_parses_known_action() {
        let value = json!({
            "action": "increase_timeout",
            "params": {"timeout_seconds": 1800},
            "rationale": "large repository",
            "confidence": 0.8,
            "estimated_impact": "scan completes",
            "safety_level": "safe"
        });

        let suggestion = RemediationSuggestion::from_value(&value).unwrap();
        assert_eq!(suggestion.action, RemediationAction::IncreaseTimeout);
        assert_eq!(suggestion.safety_level, SafetyLevel::Safe);
        assert_eq!(suggestion.params["timeout_seconds"], json!(1800));
    }

    #[test]
    fn test_suggestion_unknown_action_dropped() {
        let value = json!({"action": "reboot_universe", "confidence": 0.9});
        assert!(RemediationSuggestion::from_value(&value).is_none());
    }

    #[test]
    fn test_analysis_skips_invalid_suggestions_only() {
        let value = json!({
            "root_cause": "scanner stuck on vendored dependencies",
            "severity": "high",
            "confidence": 0.85,
            "explanation": "semgrep walks node_modules",
            "remediation_suggestions": [
                {"action": "exclude_paths", "params": {"paths": ["node_modules"]}},
                {"action": "not_a_real_action"},
                {"no_action_field": true}
            ]
        });

        let analysis = ScanAnalysis::from_response(&value, 0.012, 900);
        assert_eq!(analysis.suggestions.len(), 1);
        assert_eq!(analysis.severity, Severity::High);
        assert!((analysis.estimated_cost - 0.012).abs() < f64::EPSILON);
        assert_eq!(analysis.tokens_used, 900);
    }

    #[test]
    fn test_analysis_confidence_clamped() {
        let value = json!({"confidence": 7.5});
        let analysis = ScanAnalysis::from_response(&value, 0.0, 0);
        assert_eq!(analysis.confidence, 1.0);

        let value = json!({"confidence": -2.0});
        let analysis = ScanAnalysis::from_response(&value, 0.0, 0);
        assert_eq!(analysis.confidence, 0.0);
    }

    #[test]
    fn test_fallback_shape() {
        let analysis = ScanAnalysis::fallback("AI analysis failed: timeout", "unavailable");
        assert_eq!(analysis.confidence, 0.0);
        assert_eq!(analysis.estimated_cost, 0.0);
        assert_eq!(analysis.tokens_used, 0);
        assert!(analysis.suggestions.is_empty());
        assert_eq!(analysis.severity, Severity::Medium);
    }

    #[test]
    fn test_triage_fallback_keeps_reported_severity() {
        let triage = TriageAssessment::fallback(Severity::High, "AI triage failed");
        assert_eq!(triage.priority, Severity::High);
        assert_eq!(triage.confidence, 0.0);
    }

    #[test]
    fn test_snapshot_derives_from_request() {
        let request = AnalysisRequest::new(
            "svc-gateway",
            "semgrep",
            "scan",
            Duration::from_secs(1200),
        )
        .with_metadata(json!({"size_mb": 840}));

        let snapshot = request.snapshot();
        assert_eq!(snapshot.repo_name, "svc-gateway");
        assert_eq!(snapshot.timeout_secs, 1200);
        assert_eq!(snapshot.repo_metadata, Some(json!({"size_mb": 840})));
    }
}
