//! Diagram Repair Loop
//!
//! Drives a generated diagram script through execution with at most one
//! automated repair cycle:
//!
//! `Generated → Executing → {Succeeded, Failed}`; a first failure enters
//! `Repairing` (one model call fed the exact failure text), then re-executes;
//! any further failure is `FailedFinal`. Terminal artifacts always keep the
//! last source so the caller retains something editable.

use tracing::{info, warn};

use crate::ai::provider::SharedProvider;
use crate::types::AuditError;

use super::sandbox::DiagramSandbox;

/// Lifecycle of one diagram artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    Generated,
    Executing,
    Succeeded,
    Failed,
    Repairing,
    FailedFinal,
}

impl ArtifactState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ArtifactState::Succeeded | ArtifactState::FailedFinal)
    }
}

/// A model-authored diagram script and its execution outcome.
#[derive(Debug, Clone)]
pub struct DiagramArtifact {
    /// Untrusted source code, replaced once by a repair
    pub source: String,
    pub state: ArtifactState,
    /// 0 or 1; one repair cycle is permitted per artifact
    pub repair_attempts: u8,
    /// Rendered image bytes once `Succeeded`
    pub image: Option<Vec<u8>>,
    pub last_failure: Option<String>,
}

impl DiagramArtifact {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            state: ArtifactState::Generated,
            repair_attempts: 0,
            image: None,
            last_failure: None,
        }
    }
}

/// Executes artifacts and applies the bounded repair policy.
pub struct DiagramPipeline {
    sandbox: DiagramSandbox,
    provider: SharedProvider,
}

impl DiagramPipeline {
    pub fn new(sandbox: DiagramSandbox, provider: SharedProvider) -> Self {
        Self { sandbox, provider }
    }

    /// Render a script, repairing it at most once on failure.
    ///
    /// Always returns a terminal artifact: `Succeeded` with image bytes, or
    /// `FailedFinal` with the last source and failure reason.
    pub async fn render(&self, source: impl Into<String>) -> DiagramArtifact {
        let mut artifact = DiagramArtifact::new(source);

        loop {
            artifact.state = ArtifactState::Executing;
            match self.sandbox.execute(&artifact.source).await {
                Ok(bytes) => {
                    artifact.image = Some(bytes);
                    artifact.state = ArtifactState::Succeeded;
                    return artifact;
                }
                Err(error) => {
                    let reason = failure_reason(&error);
                    warn!(
                        attempts = artifact.repair_attempts,
                        "diagram execution failed: {reason}"
                    );
                    artifact.last_failure = Some(reason.clone());
                    artifact.state = ArtifactState::Failed;

                    if artifact.repair_attempts >= 1 {
                        artifact.state = ArtifactState::FailedFinal;
                        return artifact;
                    }

                    artifact.state = ArtifactState::Repairing;
                    match self.provider.repair_diagram_code(&artifact.source, &reason).await {
                        Ok(repaired) => {
                            info!("diagram repair produced new source");
                            artifact.repair_attempts += 1;
                            artifact.source = repaired;
                        }
                        Err(error) => {
                            warn!("diagram repair call failed: {error}");
                            artifact.state = ArtifactState::FailedFinal;
                            return artifact;
                        }
                    }
                }
            }
        }
    }

    /// Re-render an already-repaired or operator-edited script without
    /// granting a fresh repair budget.
    pub async fn render_once(&self, source: impl Into<String>) -> DiagramArtifact {
        let mut artifact = DiagramArtifact::new(source);
        artifact.repair_attempts = 1;

        artifact.state = ArtifactState::Executing;
        match self.sandbox.execute(&artifact.source).await {
            Ok(bytes) => {
                artifact.image = Some(bytes);
                artifact.state = ArtifactState::Succeeded;
            }
            Err(error) => {
                artifact.last_failure = Some(failure_reason(&error));
                artifact.state = ArtifactState::FailedFinal;
            }
        }
        artifact
    }

    /// Operator-initiated refinement: one model call rewriting the script
    /// per the instruction, then a render with the usual repair budget.
    pub async fn refine(&self, source: &str, instruction: &str) -> DiagramArtifact {
        match self.provider.repair_diagram_code(source, instruction).await {
            Ok(refined) => self.render(refined).await,
            Err(error) => {
                warn!("diagram refinement call failed: {error}");
                let mut artifact = DiagramArtifact::new(source);
                artifact.last_failure = Some(error.to_string());
                artifact.state = ArtifactState::FailedFinal;
                artifact
            }
        }
    }
}

/// The repair prompt receives the exact captured output for execution
/// failures; other errors are described by their display form.
fn failure_reason(error: &AuditError) -> String {
    match error {
        AuditError::SandboxExecution { output } => output.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;
    use crate::ai::provider::tests::MockBackend;
    use std::sync::Arc;
    use std::time::Duration;

    const GOOD_SCRIPT: &str = "printf 'png-bytes' > architecture_diagram.png\n";
    const BAD_SCRIPT: &str = "echo 'NameError: Kubernetes is not defined' >&2\nexit 1\n";

    fn sandbox() -> DiagramSandbox {
        DiagramSandbox::with_interpreter("sh", Duration::from_secs(10))
    }

    fn fenced(script: &str) -> String {
        format!("```python\n{script}```")
    }

    #[tokio::test]
    async fn test_good_script_succeeds_without_repair() {
        let provider = Arc::new(MockBackend::failing());
        let pipeline = DiagramPipeline::new(sandbox(), provider);

        let artifact = pipeline.render(GOOD_SCRIPT).await;
        assert_eq!(artifact.state, ArtifactState::Succeeded);
        assert_eq!(artifact.repair_attempts, 0);
        assert_eq!(artifact.image.as_deref(), Some(b"png-bytes".as_slice()));
    }

    #[tokio::test]
    async fn test_failed_script_repaired_once_then_succeeds() {
        // the repair call returns a working script
        let provider = Arc::new(MockBackend::with_response(&fenced(GOOD_SCRIPT)));
        let pipeline = DiagramPipeline::new(sandbox(), provider);

        let artifact = pipeline.render(BAD_SCRIPT).await;
        assert_eq!(artifact.state, ArtifactState::Succeeded);
        assert_eq!(artifact.repair_attempts, 1);
        assert!(artifact.image.is_some());
        // the original failure was observed before the repair
        assert!(
            artifact
                .last_failure
                .as_deref()
                .unwrap()
                .contains("NameError")
        );
    }

    #[tokio::test]
    async fn test_second_failure_is_final_no_further_repair() {
        // the "repaired" script still fails; no second repair is attempted
        let provider = Arc::new(MockBackend::with_response(&fenced(BAD_SCRIPT)));
        let pipeline = DiagramPipeline::new(sandbox(), provider);

        let artifact = pipeline.render(BAD_SCRIPT).await;
        assert_eq!(artifact.state, ArtifactState::FailedFinal);
        assert_eq!(artifact.repair_attempts, 1);
        assert!(artifact.image.is_none());
        // the caller keeps an editable source plus the failure reason
        assert!(artifact.source.contains("NameError"));
        assert!(
            artifact
                .last_failure
                .as_deref()
                .unwrap()
                .contains("NameError")
        );
    }

    #[tokio::test]
    async fn test_repair_call_failure_is_final() {
        let provider = Arc::new(MockBackend::failing());
        let pipeline = DiagramPipeline::new(sandbox(), provider);

        let artifact = pipeline.render(BAD_SCRIPT).await;
        assert_eq!(artifact.state, ArtifactState::FailedFinal);
        assert_eq!(artifact.repair_attempts, 0);
        // the original source survives
        assert_eq!(artifact.source, BAD_SCRIPT);
    }

    #[tokio::test]
    async fn test_repair_receives_exact_failure_text() {
        // scripted: repair returns the good script; verify via success that
        // the loop passed through Repairing exactly once
        let provider = Arc::new(MockBackend::with_responses(vec![fenced(GOOD_SCRIPT)]));
        let pipeline = DiagramPipeline::new(sandbox(), provider);

        let artifact = pipeline.render(BAD_SCRIPT).await;
        assert_eq!(artifact.state, ArtifactState::Succeeded);
        assert_eq!(artifact.repair_attempts, 1);
        assert_eq!(
            artifact.last_failure.as_deref(),
            Some("NameError: Kubernetes is not defined")
        );
    }

    #[tokio::test]
    async fn test_render_once_never_repairs() {
        let provider = Arc::new(MockBackend::with_response(&fenced(GOOD_SCRIPT)));
        let pipeline = DiagramPipeline::new(sandbox(), provider);

        let artifact = pipeline.render_once(BAD_SCRIPT).await;
        assert_eq!(artifact.state, ArtifactState::FailedFinal);
        assert_eq!(artifact.repair_attempts, 1);
    }

    #[test]
    fn test_terminal_states() {
        assert!(ArtifactState::Succeeded.is_terminal());
        assert!(ArtifactState::FailedFinal.is_terminal());
        assert!(!ArtifactState::Failed.is_terminal());
        assert!(!ArtifactState::Repairing.is_terminal());
    }
}
