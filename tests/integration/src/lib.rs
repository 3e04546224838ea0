//! Integration tests for SiteStack against a running S3-compatible endpoint.
//!
//! These tests require a server at `localhost:4566` (or `S3_ENDPOINT_URL`).
//! They are marked `#[ignore]` so they don't run during normal `cargo test`.
//!
//! Run them with:
//! ```text
//! cargo test -p sitestack-integration -- --ignored
//! ```

use std::path::Path;
use std::sync::{Arc, Once};

use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use sitestack_core::{AwsRegion, BucketName, DeploymentTarget, Stage};
use sitestack_deploy::{AwsSiteStore, Reconciler};

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Endpoint URL for the server.
fn endpoint_url() -> String {
    std::env::var("S3_ENDPOINT_URL").unwrap_or_else(|_| "http://localhost:4566".to_owned())
}

/// Create a configured S3 client pointing at the local server.
#[must_use]
pub fn s3_client() -> aws_sdk_s3::Client {
    init_tracing();

    let creds = Credentials::new("test", "test", None, None, "integration-test");

    let config = aws_sdk_s3::config::Builder::new()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(AwsRegion::DEFAULT))
        .credentials_provider(creds)
        .endpoint_url(endpoint_url())
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(config)
}

/// Reconciler wired to the local server.
#[must_use]
pub fn reconciler(client: &aws_sdk_s3::Client) -> Reconciler {
    Reconciler::new(Arc::new(AwsSiteStore::new(client.clone()))).with_concurrency(4)
}

/// Generate a unique bucket name for a test.
#[must_use]
pub fn test_bucket_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string()[..8].to_owned();
    format!("site-{prefix}-{id}")
}

/// Deployment target for a fresh, not yet created bucket.
#[must_use]
pub fn test_target(prefix: &str) -> DeploymentTarget {
    let name = test_bucket_name(prefix);
    DeploymentTarget::new(
        BucketName::new(name).unwrap_or_else(|e| panic!("invalid test bucket name: {e}")),
        AwsRegion::default(),
        Stage::default(),
    )
}

/// Write `files` (key, body) below `root`, creating parent directories.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (key, body) in files {
        let path = root.join(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap_or_else(|e| panic!("mkdir {parent:?}: {e}"));
        }
        std::fs::write(&path, body).unwrap_or_else(|e| panic!("write {path:?}: {e}"));
    }
}

/// All keys in `bucket`, sorted.
pub async fn list_keys(client: &aws_sdk_s3::Client, bucket: &str) -> Vec<String> {
    let mut keys = Vec::new();
    let mut continuation_token = None;
    loop {
        let resp = client
            .list_objects_v2()
            .bucket(bucket)
            .set_continuation_token(continuation_token.take())
            .send()
            .await
            .unwrap_or_else(|e| panic!("failed to list {bucket}: {e}"));

        keys.extend(resp.contents().iter().filter_map(|o| o.key().map(ToOwned::to_owned)));

        if resp.is_truncated() == Some(true) {
            continuation_token = resp.next_continuation_token().map(ToOwned::to_owned);
        } else {
            break;
        }
    }
    keys.sort();
    keys
}

/// Delete all objects in a bucket, then delete the bucket.
pub async fn cleanup_bucket(client: &aws_sdk_s3::Client, bucket: &str) {
    let mut continuation_token = None;
    loop {
        let Ok(resp) = client
            .list_objects_v2()
            .bucket(bucket)
            .set_continuation_token(continuation_token.take())
            .send()
            .await
        else {
            return; // Bucket may not exist.
        };

        for obj in resp.contents() {
            if let Some(key) = obj.key() {
                let _ = client.delete_object().bucket(bucket).key(key).send().await;
            }
        }

        if resp.is_truncated() == Some(true) {
            continuation_token = resp.next_continuation_token().map(ToOwned::to_owned);
        } else {
            break;
        }
    }

    let _ = client.delete_bucket().bucket(bucket).send().await;
}

mod test_deploy;
