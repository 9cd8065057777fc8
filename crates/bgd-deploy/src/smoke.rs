//! Smoke-test execution.
//!
//! The script is run with the probe route's FQDN as its only argument. Its
//! stdout and stderr are streamed to ours by two reader tasks, and both are
//! drained before the result is decided. Exit code 0 passes.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{DeployError, DeployResult};

/// Result of validating the staging app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmokeTestOutcome {
    /// No smoke test was configured.
    Skipped,
    Passed,
    /// Nonzero exit. `None` when the script was killed by a signal.
    Failed { exit_code: Option<i32> },
    /// The script outlived its timeout and was killed.
    TimedOut { after: Duration },
}

impl SmokeTestOutcome {
    /// Whether the staging app may be promoted.
    pub fn passed(&self) -> bool {
        matches!(self, SmokeTestOutcome::Skipped | SmokeTestOutcome::Passed)
    }

    pub fn describe(&self) -> String {
        match self {
            SmokeTestOutcome::Skipped => "smoke test skipped".to_string(),
            SmokeTestOutcome::Passed => "smoke test passed".to_string(),
            SmokeTestOutcome::Failed {
                exit_code: Some(code),
            } => format!("smoke test exited with status {code}"),
            SmokeTestOutcome::Failed { exit_code: None } => {
                "smoke test was terminated by a signal".to_string()
            }
            SmokeTestOutcome::TimedOut { after } => {
                format!("smoke test timed out after {}s", after.as_secs_f64())
            }
        }
    }
}

/// A smoke-test script and its run limits.
#[derive(Debug, Clone)]
pub struct SmokeTest {
    script: PathBuf,
    timeout: Option<Duration>,
}

impl SmokeTest {
    pub fn new(script: impl Into<PathBuf>, timeout: Option<Duration>) -> Self {
        Self {
            script: script.into(),
            timeout,
        }
    }

    /// Run the script against `fqdn`.
    ///
    /// A script that cannot be started is a [`DeployError::SmokeTestLaunch`];
    /// a script that runs and fails is a normal [`SmokeTestOutcome::Failed`].
    pub async fn run(&self, fqdn: &str) -> DeployResult<SmokeTestOutcome> {
        info!(script = %self.script.display(), target = fqdn, "running smoke test");

        let mut child = Command::new(&self.script)
            .arg(fqdn)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DeployError::SmokeTestLaunch {
                script: self.script.clone(),
                reason: e.to_string(),
            })?;

        let stdout = child.stdout.take().map(|out| forward(out, tokio::io::stdout()));
        let stderr = child.stderr.take().map(|err| forward(err, tokio::io::stderr()));

        let waited = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => Some(status),
                Err(_) => {
                    warn!(script = %self.script.display(), ?limit, "smoke test timed out, killing");
                    if let Err(e) = child.kill().await {
                        warn!(error = %e, "failed to kill smoke test");
                    }
                    None
                }
            },
            None => Some(child.wait().await),
        };

        for reader in [stdout, stderr].into_iter().flatten() {
            // A killed script may have left descendants holding the pipes open.
            if waited.is_none() {
                reader.abort();
            }
            if let Err(e) = reader.await {
                debug!(error = %e, "smoke test output reader ended abnormally");
            }
        }

        let outcome = match waited {
            None => SmokeTestOutcome::TimedOut {
                after: self.timeout.unwrap_or_default(),
            },
            Some(Ok(status)) if status.success() => SmokeTestOutcome::Passed,
            Some(Ok(status)) => SmokeTestOutcome::Failed {
                exit_code: status.code(),
            },
            Some(Err(e)) => {
                return Err(DeployError::SmokeTestLaunch {
                    script: self.script.clone(),
                    reason: e.to_string(),
                });
            }
        };
        info!(result = %outcome.describe(), "smoke test finished");
        Ok(outcome)
    }
}

/// Copy one child pipe to one of our output streams until EOF.
fn forward<R, W>(mut from: R, mut to: W) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = tokio::io::copy(&mut from, &mut to).await {
            debug!(error = %e, "smoke test output stream closed");
        }
    })
}
