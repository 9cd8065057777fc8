//! Deploy error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors reported by a [`Platform`](crate::Platform) implementation.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The command ran but reported failure.
    #[error("`{command}` failed: {message}")]
    Command { command: String, message: String },

    /// The command could not be started.
    #[error("could not run `{command}`: {message}")]
    Spawn { command: String, message: String },

    /// The platform answered with something we could not interpret.
    #[error("unexpected platform response: {0}")]
    Response(String),
}

pub type PlatformResult<T> = Result<T, PlatformError>;

/// Errors that end a deploy.
///
/// A failing smoke test is not an error; it is reported as
/// [`DeployOutcome::Failed`](crate::DeployOutcome::Failed).
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("{operation}: {source}")]
    Platform {
        operation: String,
        #[source]
        source: PlatformError,
    },

    #[error("could not launch smoke test {}: {reason}", .script.display())]
    SmokeTestLaunch { script: PathBuf, reason: String },

    #[error(transparent)]
    Manifest(#[from] bgd_manifest::ManifestError),
}

pub type DeployResult<T> = Result<T, DeployError>;

/// Wrap a platform error with a description of the step that failed.
pub(crate) fn during(operation: impl Into<String>) -> impl FnOnce(PlatformError) -> DeployError {
    let operation = operation.into();
    move |source| DeployError::Platform { operation, source }
}
