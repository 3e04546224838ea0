//! Deployment error types.
//!
//! [`StoreError`] is what a [`SiteStore`](crate::store::SiteStore) backend
//! reports for a single remote call. [`DeployError`] is what a reconciliation
//! run reports, tagged with the [`Phase`](crate::reconciler::Phase) that
//! failed so the caller knows how much remote state may have changed.

use std::path::PathBuf;

use sitestack_core::SiteStackError;

use crate::reconciler::Phase;

/// Error from a single object-store call.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The bucket does not exist.
    #[error("the specified bucket does not exist: {bucket}")]
    NoSuchBucket {
        /// The bucket name that was not found.
        bucket: String,
    },

    /// The request could not be built.
    #[error("invalid {operation} request: {message}")]
    InvalidRequest {
        /// Operation name (e.g. `"DeleteObjects"`).
        operation: &'static str,
        /// What was wrong.
        message: String,
    },

    /// Transport, authentication, or service error.
    #[error("{operation} failed: {message}")]
    Request {
        /// Operation name (e.g. `"PutObject"`).
        operation: &'static str,
        /// Full error chain rendered as text.
        message: String,
    },

    /// The batch delete reported per-key failures.
    #[error("DeleteObjects failed for {} key(s), first: {}", .failed.len(), .failed.first().map_or("", String::as_str))]
    PartialDelete {
        /// Keys the store refused to delete, with reasons.
        failed: Vec<String>,
    },
}

/// Convenience result type for object-store calls.
pub type StoreResult<T> = Result<T, StoreError>;

/// One file that did not make it into the bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFailure {
    /// Object key (or local path when no key could be derived).
    pub key: String,
    /// Why the upload failed.
    pub reason: String,
}

/// Error from a reconciliation run.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Invalid configuration; raised before any remote call.
    #[error(transparent)]
    Config(#[from] SiteStackError),

    /// The local build output directory does not exist.
    #[error("local directory does not exist or is not a directory: {}", .0.display())]
    MissingDistFolder(PathBuf),

    /// A remote step failed; the run was aborted at `phase`.
    #[error("{phase} failed")]
    Store {
        /// Step that failed.
        phase: Phase,
        /// Underlying store error.
        #[source]
        source: StoreError,
    },

    /// The run was cancelled before the purge; bucket content is unchanged.
    #[error("deployment cancelled before purge, bucket content left unchanged")]
    Cancelled,

    /// Some files were not uploaded; the bucket holds a subset of the site.
    #[error(
        "upload incomplete: {uploaded} uploaded, {} failed, {skipped} skipped",
        .failures.len()
    )]
    UploadIncomplete {
        /// Number of objects written.
        uploaded: usize,
        /// Files that failed.
        failures: Vec<UploadFailure>,
        /// Files never attempted because the run was cancelled.
        skipped: usize,
    },
}

impl DeployError {
    /// Wrap a store error with the phase it happened in.
    #[must_use]
    pub fn store(phase: Phase, source: StoreError) -> Self {
        Self::Store { phase, source }
    }
}

/// Convenience result type for reconciliation steps.
pub type DeployResult<T> = Result<T, DeployError>;
