//! Error types for manifest reading and resolution.

use thiserror::Error;

/// Result type alias for manifest operations.
pub type ManifestResult<T> = Result<T, ManifestError>;

/// Errors that can occur while reading or resolving a manifest.
///
/// No partial application list is ever returned alongside an error.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest file (or an inherited one) could not be located or read.
    #[error("failed to read manifest: {0}")]
    Read(String),

    /// The file is not YAML, or its top level is not a non-empty mapping.
    #[error("failed to parse manifest: {0}")]
    Parse(String),

    /// Every problem found while validating, expanding, or resolving routes.
    #[error("invalid manifest:\n{}", .0.join("\n"))]
    Validation(Vec<String>),
}

impl ManifestError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(vec![message.into()])
    }
}
