//! AuditMind - AI Engine for Security Scan Dashboards
//!
//! The AI-orchestration layer behind a security-findings dashboard: stuck-scan
//! diagnosis, finding triage, remediation plans, and architecture overviews,
//! served over interchangeable model backends.
//!
//! ## Core Guarantees
//!
//! - **Uniform backends**: one capability contract over OpenAI-style,
//!   Claude-style, and local OpenAI-compatible APIs; request shapes resolved
//!   by a pure per-model parameter policy
//! - **Bounded spend**: a cost governor gates the analysis path against a
//!   running-average ceiling
//! - **No raw failures**: model output is sanitized into typed results;
//!   every failure path yields a well-formed fallback value
//! - **Contained execution**: generated diagram scripts run in a scratch
//!   sandbox with a hard timeout and at most one automated repair cycle
//!
//! ## Quick Start
//!
//! ```ignore
//! use auditmind::{ConfigLoader, ReasoningOrchestrator, create_provider};
//! use auditmind::types::AnalysisRequest;
//! use std::time::Duration;
//!
//! let config = ConfigLoader::load()?;
//! let provider = create_provider(&config.llm)?;
//! let orchestrator = ReasoningOrchestrator::new(provider, config.budget.cost_ceiling_usd);
//!
//! let request = AnalysisRequest::new("svc-gateway", "semgrep", "scan", Duration::from_secs(1800));
//! let analysis = orchestrator.analyze_stuck_scan(&request).await;
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: parameter policy, pricing, provider adapters, sanitizer,
//!   cost governor, orchestrator
//! - [`diagram`]: sandboxed script execution and the repair loop
//! - [`config`]: layered configuration
//! - [`types`]: domain model and error taxonomy

pub mod ai;
pub mod config;
pub mod constants;
pub mod diagram;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

pub use ai::{
    CostGovernor,
    LedgerEntry,
    ProviderAdapter,
    ReasoningOrchestrator,
    SharedProvider,
    create_provider,
};
pub use config::{Config, ConfigLoader};
pub use diagram::{ArtifactState, DiagramArtifact, DiagramPipeline, DiagramSandbox};
pub use types::{AuditError, Result};
