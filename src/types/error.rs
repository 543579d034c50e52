//! Unified Error Type System
//!
//! Centralized error types for the entire application.
//!
//! ## Propagation policy
//!
//! `ProviderUnavailable` is the only variant that may abort construction or
//! startup. Everything else is caught at the orchestrator or sandbox boundary
//! and converted into a typed fallback value; callers of the analysis
//! operations always receive a well-formed result.

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Parse Failure
// =============================================================================

/// A structured-parse failure carrying the original model output.
///
/// Callers must substitute a safe default; the raw text is retained so the
/// failure reason can be surfaced or logged.
#[derive(Debug, Clone)]
pub struct ParseFailure {
    /// Parser diagnostic
    pub message: String,
    /// The unmodified model output that failed to parse
    pub raw: String,
}

impl ParseFailure {
    pub fn new(message: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            raw: raw.into(),
        }
    }
}

impl std::fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "response parse failed: {}", self.message)
    }
}

impl std::error::Error for ParseFailure {}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum AuditError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Provider Errors
    // -------------------------------------------------------------------------
    /// Missing credential or unusable backend configuration. Raised only
    /// from constructors, never per call.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Transport or API-level failure of a model call
    #[error("provider call failed: {0}")]
    ProviderCall(String),

    /// The sanitizer could not recover structured data from a response
    #[error("{0}")]
    ResponseParse(#[from] ParseFailure),

    // -------------------------------------------------------------------------
    // Governance Errors
    // -------------------------------------------------------------------------
    #[error("cost budget exceeded: average ${average:.2} per analysis over ${ceiling:.2} ceiling")]
    BudgetExceeded { average: f64, ceiling: f64 },

    // -------------------------------------------------------------------------
    // Sandbox Errors
    // -------------------------------------------------------------------------
    #[error("diagram script timed out after {timeout:?}")]
    SandboxTimeout { timeout: Duration },

    #[error("diagram script failed: {output}")]
    SandboxExecution { output: String },

    #[error("diagram script produced no image artifact")]
    ArtifactMissing,
}

pub type Result<T> = std::result::Result<T, AuditError>;

impl AuditError {
    /// Create a provider-call error from any displayable cause
    pub fn provider_call(message: impl Into<String>) -> Self {
        Self::ProviderCall(message.into())
    }

    /// True for failures the orchestrator converts into fallback values
    /// rather than surfacing to the caller.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::ProviderUnavailable(_) | Self::Config(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_failure_retains_raw() {
        let failure = ParseFailure::new("expected value", "not json at all");
        assert_eq!(failure.raw, "not json at all");
        assert!(failure.to_string().contains("expected value"));
    }

    #[test]
    fn test_provider_unavailable_not_recoverable() {
        assert!(!AuditError::ProviderUnavailable("no key".into()).is_recoverable());
        assert!(AuditError::ProviderCall("503".into()).is_recoverable());
        assert!(AuditError::ArtifactMissing.is_recoverable());
    }

    #[test]
    fn test_budget_exceeded_display() {
        let err = AuditError::BudgetExceeded {
            average: 0.6,
            ceiling: 0.5,
        };
        let text = err.to_string();
        assert!(text.contains("$0.60"));
        assert!(text.contains("$0.50"));
    }
}
