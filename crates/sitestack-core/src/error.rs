//! Error types for the SiteStack core.

use std::path::PathBuf;

/// Configuration and validation errors.
///
/// Every variant is raised before any remote call is made, so a run that
/// fails with a [`SiteStackError`] has no partial effects on the bucket.
#[derive(Debug, thiserror::Error)]
pub enum SiteStackError {
    /// The bucket name violates S3 naming rules.
    #[error("invalid bucket name '{name}': {reason}")]
    InvalidBucketName {
        /// The rejected name.
        name: String,
        /// Which rule was violated.
        reason: String,
    },

    /// No bucket name could be resolved for the stage.
    #[error("could not find bucket name for stage '{stage}'")]
    MissingBucket {
        /// The stage that was being resolved.
        stage: String,
    },

    /// The site manifest could not be read.
    #[error("failed to read site manifest {path}")]
    ManifestIo {
        /// Manifest path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The site manifest is not valid JSON for the expected shape.
    #[error("failed to parse site manifest {path}")]
    ManifestParse {
        /// Manifest path.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Convenience result type for SiteStack core operations.
pub type SiteStackResult<T> = Result<T, SiteStackError>;
