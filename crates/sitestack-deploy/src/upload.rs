//! Upload engine.
//!
//! Turns each local file into an [`UploadDescriptor`] (key, body, content
//! type, optional content encoding) and writes it to the bucket. Uploads are
//! independent of each other: they run concurrently up to a fixed bound, a
//! failure never stops its siblings, and every outcome is collected into an
//! [`UploadReport`].

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use sitestack_core::DeploymentTarget;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::UploadFailure;
use crate::store::SiteStore;
use crate::transform::maybe_compress;
use crate::walker::{LocalAsset, WalkError};

/// One object ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadDescriptor {
    /// Object key.
    pub key: String,
    /// Object body, possibly compressed.
    pub body: Bytes,
    /// MIME type of the original file.
    pub content_type: String,
    /// `Content-Encoding`, set when the body was compressed.
    pub content_encoding: Option<String>,
}

impl UploadDescriptor {
    /// Uncompressed object with an explicit content type.
    pub fn plain(
        key: impl Into<String>,
        body: impl Into<Bytes>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            body: body.into(),
            content_type: content_type.into(),
            content_encoding: None,
        }
    }
}

/// MIME type for a file, inferred from its extension.
///
/// Total: unknown or missing extensions map to `application/octet-stream`.
///
/// ```
/// use std::path::Path;
/// use sitestack_deploy::upload::content_type_for;
///
/// assert_eq!(content_type_for(Path::new("index.html")), mime::TEXT_HTML);
/// assert_eq!(
///     content_type_for(Path::new("blob.nosuchext")),
///     mime::APPLICATION_OCTET_STREAM
/// );
/// ```
#[must_use]
pub fn content_type_for(path: &Path) -> mime::Mime {
    mime_guess::from_path(path).first_or_octet_stream()
}

/// Read a local file and build its descriptor.
pub async fn prepare(asset: &LocalAsset, gzip: bool) -> std::io::Result<UploadDescriptor> {
    let raw = tokio::fs::read(&asset.absolute_path).await?;
    let transformed = maybe_compress(Bytes::from(raw), gzip);

    Ok(UploadDescriptor {
        key: asset.relative_key.clone(),
        body: transformed.body,
        content_type: content_type_for(&asset.absolute_path).essence_str().to_owned(),
        content_encoding: transformed.content_encoding.map(str::to_owned),
    })
}

/// Outcome of uploading a whole tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    /// Keys written.
    pub uploaded: Vec<String>,
    /// Files that could not be read or written.
    pub failures: Vec<UploadFailure>,
    /// Files not attempted because the run was cancelled.
    pub skipped: usize,
    /// How many written objects are gzip-encoded.
    pub compressed: usize,
}

impl UploadReport {
    /// Whether every file was uploaded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.skipped == 0
    }
}

enum Outcome {
    Uploaded { key: String, compressed: bool },
    Failed(UploadFailure),
    Skipped,
    Ignored,
}

/// Writes local files into the target bucket.
pub struct UploadEngine {
    store: Arc<dyn SiteStore>,
    bucket: String,
    gzip: bool,
    concurrency: usize,
    cancel: CancellationToken,
}

impl std::fmt::Debug for UploadEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadEngine")
            .field("bucket", &self.bucket)
            .field("gzip", &self.gzip)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl UploadEngine {
    /// Create an engine for `target`.
    ///
    /// `concurrency` is clamped to at least 1. Once `cancel` fires, no new
    /// upload starts; uploads already in flight run to completion.
    #[must_use]
    pub fn new(
        store: Arc<dyn SiteStore>,
        target: &DeploymentTarget,
        gzip: bool,
        concurrency: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            bucket: target.bucket().as_str().to_owned(),
            gzip,
            concurrency: concurrency.max(1),
            cancel,
        }
    }

    /// Upload one file. Returns the descriptor that was written.
    pub async fn upload(&self, asset: &LocalAsset) -> Result<UploadDescriptor, UploadFailure> {
        let failure = |reason: String| UploadFailure {
            key: asset.relative_key.clone(),
            reason,
        };

        let descriptor = prepare(asset, self.gzip)
            .await
            .map_err(|e| failure(format!("failed to read {}: {e}", asset.absolute_path.display())))?;

        info!(
            key = %descriptor.key,
            bucket = %self.bucket,
            content_type = %descriptor.content_type,
            compressed = descriptor.content_encoding.is_some(),
            "uploading file"
        );

        self.store
            .put_object(&self.bucket, descriptor.clone())
            .await
            .map_err(|e| failure(e.to_string()))?;

        Ok(descriptor)
    }

    /// Upload every file yielded by `assets` and collect the outcomes.
    ///
    /// Walk errors are recorded as failures; directory entries are ignored.
    pub async fn upload_all<S>(&self, assets: S) -> UploadReport
    where
        S: Stream<Item = Result<LocalAsset, WalkError>>,
    {
        let mut outcomes = std::pin::pin!(
            assets
                .map(|item| async move {
                    match item {
                        Err(e) => Outcome::Failed(UploadFailure {
                            key: e.path().display().to_string(),
                            reason: e.to_string(),
                        }),
                        Ok(asset) if asset.is_directory => Outcome::Ignored,
                        Ok(_) if self.cancel.is_cancelled() => Outcome::Skipped,
                        Ok(asset) => match self.upload(&asset).await {
                            Ok(descriptor) => Outcome::Uploaded {
                                key: descriptor.key,
                                compressed: descriptor.content_encoding.is_some(),
                            },
                            Err(failure) => Outcome::Failed(failure),
                        },
                    }
                })
                .buffer_unordered(self.concurrency)
        );

        let mut report = UploadReport::default();
        while let Some(outcome) = outcomes.next().await {
            match outcome {
                Outcome::Uploaded { key, compressed } => {
                    report.compressed += usize::from(compressed);
                    report.uploaded.push(key);
                }
                Outcome::Failed(failure) => {
                    warn!(key = %failure.key, reason = %failure.reason, "upload failed");
                    report.failures.push(failure);
                }
                Outcome::Skipped => report.skipped += 1,
                Outcome::Ignored => {}
            }
        }

        debug!(
            bucket = %self.bucket,
            uploaded = report.uploaded.len(),
            failed = report.failures.len(),
            skipped = report.skipped,
            "upload stage finished"
        );
        report
    }
}
