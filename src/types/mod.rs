pub mod analysis;
pub mod error;

pub use analysis::{
    AnalysisRequest, ArchitectureOverview, DiagnosticSnapshot, RemediationAction, RemediationPlan,
    RemediationSuggestion, SafetyLevel, ScanAnalysis, Severity, TriageAssessment,
};
pub use error::{AuditError, ParseFailure, Result};
