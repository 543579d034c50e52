//! Diagram Sandbox
//!
//! Executes untrusted, model-authored diagram scripts in an isolated,
//! time-bounded environment and extracts the rendered artifact.
//!
//! Isolation contract: a fresh scratch directory per execution, a cleared
//! environment, and a hard wall-clock timeout. The child is killed on
//! timeout and on cancellation (`kill_on_drop`); the scratch directory is
//! reclaimed on every exit path via `TempDir` RAII.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::SandboxConfig;
use crate::constants::sandbox;
use crate::types::{AuditError, Result};

pub struct DiagramSandbox {
    interpreter: String,
    timeout: Duration,
}

impl DiagramSandbox {
    pub fn new(config: &SandboxConfig) -> Self {
        Self {
            interpreter: config.interpreter.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn with_interpreter(interpreter: impl Into<String>, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout,
        }
    }

    /// Run a diagram script and return the rendered image bytes.
    ///
    /// Errors map onto the execution outcomes: nonzero exit or spawn
    /// failure (`SandboxExecution`, carrying combined output), wall-clock
    /// overrun (`SandboxTimeout`), or a clean run that produced no image
    /// (`ArtifactMissing`).
    pub async fn execute(&self, source: &str) -> Result<Vec<u8>> {
        let workdir = tempfile::tempdir()?;
        let script = workdir.path().join("diagram_script.py");
        tokio::fs::write(&script, source).await?;

        debug!(
            interpreter = %self.interpreter,
            workdir = %workdir.path().display(),
            "executing diagram script"
        );

        let mut cmd = Command::new(&self.interpreter);
        cmd.arg(&script)
            .current_dir(workdir.path())
            .env_clear()
            .env("PATH", std::env::var("PATH").unwrap_or_default())
            // scratch HOME keeps library caches inside the sandbox
            .env("HOME", workdir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| AuditError::SandboxExecution {
            output: format!("failed to spawn {}: {e}", self.interpreter),
        })?;

        let output = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                // dropping the wait future kills the child (kill_on_drop)
                warn!(timeout = ?self.timeout, "diagram script timed out");
                return Err(AuditError::SandboxTimeout {
                    timeout: self.timeout,
                });
            }
        };

        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(AuditError::SandboxExecution {
                output: combined.trim().to_string(),
            });
        }

        let artifact = locate_artifact(workdir.path())?;
        let bytes = tokio::fs::read(&artifact).await?;
        info!(
            artifact = %artifact.display(),
            size = bytes.len(),
            "diagram rendered"
        );
        Ok(bytes)
    }
}

/// Find the rendered image: the conventional filename first, then any file
/// with an image extension.
fn locate_artifact(dir: &Path) -> Result<PathBuf> {
    let preferred = dir.join(sandbox::DIAGRAM_ARTIFACT);
    if preferred.exists() {
        return Ok(preferred);
    }

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| sandbox::IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false);
        if is_image {
            return Ok(path);
        }
    }

    Err(AuditError::ArtifactMissing)
}

#[cfg(test)]
mod tests {
    use super::*;

    // The sandbox only needs an interpreter that runs a script file from its
    // working directory, so the tests drive it with `sh` instead of python.
    #[cfg(unix)]
    fn sh_sandbox(timeout_secs: u64) -> DiagramSandbox {
        DiagramSandbox::with_interpreter("sh", Duration::from_secs(timeout_secs))
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_success_returns_artifact_bytes() {
        let sandbox = sh_sandbox(10);
        let bytes = sandbox
            .execute("printf 'fake-png' > architecture_diagram.png\n")
            .await
            .unwrap();
        assert_eq!(bytes, b"fake-png");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fallback_to_any_image_file() {
        let sandbox = sh_sandbox(10);
        let bytes = sandbox
            .execute("printf 'svg-bytes' > other_name.svg\n")
            .await
            .unwrap();
        assert_eq!(bytes, b"svg-bytes");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_captures_output() {
        let sandbox = sh_sandbox(10);
        let err = sandbox
            .execute("echo 'ImportError: no module named diagrams' >&2\nexit 1\n")
            .await
            .unwrap_err();
        match err {
            AuditError::SandboxExecution { output } => {
                assert!(output.contains("ImportError"));
            }
            other => panic!("expected SandboxExecution, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_clean_run_without_image_is_artifact_missing() {
        let sandbox = sh_sandbox(10);
        let err = sandbox.execute("echo done > notes.txt\n").await.unwrap_err();
        assert!(matches!(err, AuditError::ArtifactMissing));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_script() {
        let sandbox = sh_sandbox(1);
        let start = std::time::Instant::now();
        let err = sandbox.execute("sleep 30\n").await.unwrap_err();
        assert!(matches!(err, AuditError::SandboxTimeout { .. }));
        // the sandbox did not wait out the sleep
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_execution_error() {
        let sandbox = DiagramSandbox::with_interpreter(
            "definitely-not-an-interpreter",
            Duration::from_secs(1),
        );
        let err = sandbox.execute("pass").await.unwrap_err();
        assert!(matches!(err, AuditError::SandboxExecution { .. }));
    }

    #[tokio::test]
    #[ignore = "requires python3 and the diagrams package"]
    async fn test_real_diagram_script() {
        let sandbox = DiagramSandbox::new(&SandboxConfig::default());
        let source = "from diagrams import Diagram\n\
                      from diagrams.onprem.database import PostgreSQL\n\
                      with Diagram(\"t\", show=False, filename=\"architecture_diagram\"):\n\
                          PostgreSQL(\"db\")\n";
        let bytes = sandbox.execute(source).await.unwrap();
        assert!(!bytes.is_empty());
    }
}
