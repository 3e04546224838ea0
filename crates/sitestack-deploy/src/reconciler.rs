//! The reconciliation driver.
//!
//! A run is a plain ordered pipeline of fallible steps:
//!
//! ```text
//! Inspect -> CreateBucket? -> ConfigureWebsite -> ConfigurePolicy -> Purge -> Walk -> Upload*
//! ```
//!
//! The first fatal error aborts the run; nothing is rolled back. Every step
//! before the purge is idempotent, so a failed run converges when re-run. A
//! failure after the purge leaves the bucket holding a subset of the site
//! until the next successful run.
//!
//! Concurrent runs against the same bucket are not coordinated here and must
//! be serialized by the caller.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use futures::Stream;
use sitestack_core::config::DEFAULT_UPLOAD_CONCURRENCY;
use sitestack_core::{DeploymentTarget, ResolvedDeploy};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{DeployError, DeployResult};
use crate::inventory::inspect;
use crate::provision::{configure_policy, configure_website, ensure_bucket};
use crate::purge::purge;
use crate::store::SiteStore;
use crate::upload::UploadEngine;
use crate::walker::{LocalAsset, LocalTree, WalkError};

/// Buffered walk entries between the walker thread and the upload stage.
const WALK_CHANNEL_CAPACITY: usize = 256;

/// Step of a reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Bucket existence and object listing.
    Inspect,
    /// Bucket creation.
    CreateBucket,
    /// Website configuration.
    ConfigureWebsite,
    /// Public-access block and bucket policy.
    ConfigurePolicy,
    /// Deletion of prior objects.
    Purge,
}

impl Phase {
    /// Human-readable step name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inspect => "inspect",
            Self::CreateBucket => "create bucket",
            Self::ConfigureWebsite => "configure website",
            Self::ConfigurePolicy => "configure policy",
            Self::Purge => "purge",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployReport {
    /// Whether the bucket was created by this run.
    pub bucket_created: bool,
    /// Number of prior objects deleted.
    pub purged: usize,
    /// Keys written.
    pub uploaded: Vec<String>,
    /// How many written objects are gzip-encoded.
    pub compressed: usize,
}

/// Drives one deployment of a local tree to a bucket.
pub struct Reconciler {
    store: Arc<dyn SiteStore>,
    gzip: bool,
    concurrency: usize,
    cancel: CancellationToken,
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("gzip", &self.gzip)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Create a reconciler with gzip disabled and the default upload
    /// concurrency.
    #[must_use]
    pub fn new(store: Arc<dyn SiteStore>) -> Self {
        Self {
            store,
            gzip: false,
            concurrency: DEFAULT_UPLOAD_CONCURRENCY,
            cancel: CancellationToken::new(),
        }
    }

    /// Create a reconciler using the options of a resolved configuration.
    #[must_use]
    pub fn from_resolved(store: Arc<dyn SiteStore>, resolved: &ResolvedDeploy) -> Self {
        Self::new(store)
            .with_gzip(resolved.gzip)
            .with_concurrency(resolved.upload_concurrency)
    }

    /// Enable or disable gzip content encoding.
    #[must_use]
    pub fn with_gzip(mut self, gzip: bool) -> Self {
        self.gzip = gzip;
        self
    }

    /// Maximum number of uploads in flight; clamped to at least 1.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Token that stops new uploads once cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Mirror `dist_folder` into the target bucket.
    ///
    /// # Errors
    ///
    /// - [`DeployError::MissingDistFolder`] before any remote call when the
    ///   local directory does not exist
    /// - [`DeployError::Store`] when a remote step fails; the run stops there
    /// - [`DeployError::Cancelled`] when `cancel` fired before the purge
    /// - [`DeployError::UploadIncomplete`] when any file failed or was skipped
    pub async fn run(
        &self,
        target: &DeploymentTarget,
        dist_folder: &Path,
    ) -> DeployResult<DeployReport> {
        if !dist_folder.is_dir() {
            return Err(DeployError::MissingDistFolder(dist_folder.to_path_buf()));
        }

        let bucket = target.bucket().as_str();
        info!(
            bucket,
            region = %target.region(),
            stage = %target.stage(),
            dist = %dist_folder.display(),
            gzip = self.gzip,
            "starting deployment"
        );

        let store = self.store.as_ref();
        let state = inspect(store, target).await?;
        let bucket_created = ensure_bucket(store, target, &state).await?;
        configure_website(store, target).await?;
        configure_policy(store, target).await?;

        if self.cancel.is_cancelled() {
            warn!(bucket, "deployment cancelled, skipping purge and upload");
            return Err(DeployError::Cancelled);
        }
        let purged = purge(store, target, &state).await?;

        let engine = UploadEngine::new(
            Arc::clone(&self.store),
            target,
            self.gzip,
            self.concurrency,
            self.cancel.clone(),
        );
        let report = engine
            .upload_all(walk_stream(LocalTree::new(dist_folder)))
            .await;

        if !report.is_complete() {
            warn!(
                bucket,
                uploaded = report.uploaded.len(),
                failed = report.failures.len(),
                skipped = report.skipped,
                "bucket is in a mixed state: prior content was purged and only part of the site was uploaded; re-run to converge"
            );
            return Err(DeployError::UploadIncomplete {
                uploaded: report.uploaded.len(),
                failures: report.failures,
                skipped: report.skipped,
            });
        }

        info!(
            bucket,
            created = bucket_created,
            purged,
            uploaded = report.uploaded.len(),
            compressed = report.compressed,
            "deployment finished"
        );
        Ok(DeployReport {
            bucket_created,
            purged,
            uploaded: report.uploaded,
            compressed: report.compressed,
        })
    }
}

/// Walk `tree` on a blocking thread and stream its files.
///
/// The walker feeds a bounded channel, so at most
/// [`WALK_CHANNEL_CAPACITY`] entries are buffered ahead of the uploads. The
/// walk always runs to the end; cancellation is applied by the consumer.
fn walk_stream(tree: LocalTree) -> impl Stream<Item = Result<LocalAsset, WalkError>> {
    let (tx, rx) = mpsc::channel(WALK_CHANNEL_CAPACITY);
    tokio::task::spawn_blocking(move || {
        for entry in tree.files() {
            if tx.blocking_send(entry).is_err() {
                break;
            }
        }
    });

    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|entry| (entry, rx))
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::fs;

    use sitestack_core::{AwsRegion, BucketName, Stage};

    use super::*;
    use crate::memory::InMemorySiteStore;
    use crate::provision::{BucketPolicy, WebsiteConfig};
    use crate::upload::UploadDescriptor;

    fn target() -> DeploymentTarget {
        DeploymentTarget::new(
            BucketName::new("my-site").unwrap(),
            AwsRegion::default(),
            Stage::default(),
        )
    }

    fn write(root: &Path, key: &str, body: &str) {
        let path = root.join(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, body).unwrap();
    }

    fn spa() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "index.html", "<html><body>app</body></html>");
        write(dir.path(), "assets/app.js", "console.log('app');");
        dir
    }

    fn reconciler(store: &Arc<InMemorySiteStore>) -> Reconciler {
        Reconciler::new(store.clone()).with_concurrency(4)
    }

    fn key_set(keys: impl IntoIterator<Item = String>) -> BTreeSet<String> {
        keys.into_iter().collect()
    }

    #[test]
    fn test_should_name_phases() {
        assert_eq!(Phase::Inspect.to_string(), "inspect");
        assert_eq!(Phase::CreateBucket.to_string(), "create bucket");
        assert_eq!(Phase::Purge.to_string(), "purge");
    }

    #[tokio::test]
    async fn test_should_deploy_to_absent_bucket() {
        let dir = spa();
        let store = Arc::new(InMemorySiteStore::new());

        let report = reconciler(&store).run(&target(), dir.path()).await.unwrap();

        assert!(report.bucket_created);
        assert_eq!(report.purged, 0);
        assert_eq!(
            key_set(report.uploaded),
            key_set(["assets/app.js".to_owned(), "index.html".to_owned()])
        );

        assert_eq!(store.website("my-site"), Some(WebsiteConfig::single_page_app()));
        let policy = BucketPolicy::public_read(target().bucket()).to_json().unwrap();
        assert_eq!(store.policy("my-site"), Some(policy));
        assert!(store.public_policy_allowed("my-site"));

        assert_eq!(store.object("my-site", "index.html").unwrap().content_type, "text/html");
        let js = store.object("my-site", "assets/app.js").unwrap().content_type;
        assert!(js.contains("javascript"), "unexpected js type {js}");
    }

    #[tokio::test]
    async fn test_should_follow_pipeline_order() {
        let dir = spa();
        let store = Arc::new(InMemorySiteStore::new());
        store.create_bucket("my-site", "us-east-1").await.unwrap();
        store
            .put_object("my-site", UploadDescriptor::plain("old.html", "x", "text/html"))
            .await
            .unwrap();
        store.clear_calls();

        reconciler(&store).run(&target(), dir.path()).await.unwrap();

        let ops = store.operations();
        assert_eq!(
            &ops[..6],
            [
                "ListBuckets",
                "ListObjectsV2",
                "PutBucketWebsite",
                "PutPublicAccessBlock",
                "PutBucketPolicy",
                "DeleteObjects",
            ]
        );
        assert_eq!(&ops[6..], ["PutObject", "PutObject"]);
    }

    #[tokio::test]
    async fn test_should_remove_keys_missing_from_new_tree() {
        let store = Arc::new(InMemorySiteStore::new());

        let first = tempfile::tempdir().unwrap();
        write(first.path(), "index.html", "v1");
        write(first.path(), "legacy/page.html", "old");
        write(first.path(), "assets/old.js", "old");
        reconciler(&store).run(&target(), first.path()).await.unwrap();
        assert_eq!(store.object_keys("my-site").len(), 3);

        let second = spa();
        let report = reconciler(&store).run(&target(), second.path()).await.unwrap();

        assert!(!report.bucket_created);
        assert_eq!(report.purged, 3);
        assert_eq!(store.object_keys("my-site"), vec!["assets/app.js", "index.html"]);
    }

    #[tokio::test]
    async fn test_should_mirror_identical_tree_on_rerun() {
        let dir = spa();
        let store = Arc::new(InMemorySiteStore::new());

        reconciler(&store).run(&target(), dir.path()).await.unwrap();
        store.clear_calls();
        let report = reconciler(&store).run(&target(), dir.path()).await.unwrap();

        assert_eq!(report.purged, 2);
        assert_eq!(store.calls_named("CreateBucket"), 0);
        assert_eq!(store.calls_named("DeleteObjects"), 1);
        assert_eq!(store.object_keys("my-site"), vec!["assets/app.js", "index.html"]);
    }

    #[tokio::test]
    async fn test_should_mirror_nested_tree() {
        let dir = tempfile::tempdir().unwrap();
        let keys = [
            "index.html",
            "favicon.ico",
            "assets/css/site.css",
            "assets/js/vendor/lib.js",
            "docs/guide/intro/index.html",
        ];
        for key in keys {
            write(dir.path(), key, key);
        }
        fs::create_dir_all(dir.path().join("empty/nested")).unwrap();
        let store = Arc::new(InMemorySiteStore::new());

        reconciler(&store).run(&target(), dir.path()).await.unwrap();

        assert_eq!(
            key_set(store.object_keys("my-site")),
            key_set(keys.map(str::to_owned))
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_should_upload_contents_of_symlinked_directory() {
        let dir = spa();
        let vendor = tempfile::tempdir().unwrap();
        write(vendor.path(), "lib.js", "export const lib = 1;");
        std::os::unix::fs::symlink(vendor.path(), dir.path().join("vendor")).unwrap();
        let store = Arc::new(InMemorySiteStore::new());

        reconciler(&store).run(&target(), dir.path()).await.unwrap();

        assert_eq!(
            store.object_keys("my-site"),
            vec!["assets/app.js", "index.html", "vendor/lib.js"]
        );
        let lib = store.object("my-site", "vendor/lib.js").unwrap();
        assert_eq!(lib.body, bytes::Bytes::from_static(b"export const lib = 1;"));
    }

    #[tokio::test]
    async fn test_should_gzip_every_object_when_enabled() {
        let dir = spa();
        let store = Arc::new(InMemorySiteStore::new());

        let report = reconciler(&store)
            .with_gzip(true)
            .run(&target(), dir.path())
            .await
            .unwrap();

        assert_eq!(report.compressed, 2);
        let html = store.object("my-site", "index.html").unwrap();
        assert_eq!(html.content_encoding.as_deref(), Some("gzip"));
        assert_eq!(html.content_type, "text/html");
    }

    #[tokio::test]
    async fn test_should_reject_missing_dist_folder_without_remote_calls() {
        let store = Arc::new(InMemorySiteStore::new());

        let err = reconciler(&store)
            .run(&target(), Path::new("/nonexistent/site/.spa"))
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::MissingDistFolder(_)));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_should_stop_before_purge_when_provisioning_fails() {
        let dir = spa();
        let store = Arc::new(InMemorySiteStore::new());
        store.create_bucket("my-site", "us-east-1").await.unwrap();
        store
            .put_object("my-site", UploadDescriptor::plain("old.html", "x", "text/html"))
            .await
            .unwrap();
        store.fail_operation("PutBucketWebsite");

        let err = reconciler(&store).run(&target(), dir.path()).await.unwrap_err();

        assert!(matches!(
            err,
            DeployError::Store {
                phase: Phase::ConfigureWebsite,
                ..
            }
        ));
        assert_eq!(store.calls_named("DeleteObjects"), 0);
        assert_eq!(store.object_keys("my-site"), vec!["old.html"]);
    }

    #[tokio::test]
    async fn test_should_fail_run_when_any_upload_fails() {
        let dir = spa();
        let store = Arc::new(InMemorySiteStore::new());
        store.fail_key("assets/app.js");

        let err = reconciler(&store).run(&target(), dir.path()).await.unwrap_err();

        match err {
            DeployError::UploadIncomplete {
                uploaded,
                failures,
                skipped,
            } => {
                assert_eq!(uploaded, 1);
                assert_eq!(skipped, 0);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].key, "assets/app.js");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.object_keys("my-site"), vec!["index.html"]);
    }

    #[tokio::test]
    async fn test_should_keep_live_content_when_cancelled_before_purge() {
        let dir = spa();
        let store = Arc::new(InMemorySiteStore::new());
        store.create_bucket("my-site", "us-east-1").await.unwrap();
        store
            .put_object("my-site", UploadDescriptor::plain("index.html", "live", "text/html"))
            .await
            .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = reconciler(&store)
            .with_cancellation(cancel)
            .run(&target(), dir.path())
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::Cancelled));
        assert_eq!(store.calls_named("DeleteObjects"), 0);
        assert_eq!(store.calls_named("PutObject"), 1);
        assert_eq!(store.object_keys("my-site"), vec!["index.html"]);
        let live = store.object("my-site", "index.html").unwrap();
        assert_eq!(live.body, bytes::Bytes::from_static(b"live"));
    }

    #[tokio::test]
    async fn test_should_stream_every_file_from_walker() {
        use futures::StreamExt;

        let dir = spa();
        let keys: Vec<String> = walk_stream(LocalTree::new(dir.path()))
            .map(|entry| entry.unwrap().relative_key)
            .collect()
            .await;

        assert_eq!(
            key_set(keys),
            key_set(["assets/app.js".to_owned(), "index.html".to_owned()])
        );
    }
}
