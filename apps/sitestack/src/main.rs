//! SiteStack - deploy a built single-page app to an S3 website bucket.
//!
//! Makes the target bucket an exact mirror of the local build output: creates
//! the bucket if needed, applies website hosting and a public-read policy,
//! deletes every existing object, then uploads the local tree.
//!
//! # Usage
//!
//! ```text
//! SITE_BUCKET=my-site SITE_STAGE=prod SITE_GZIP=true sitestack
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SITE_DIST_FOLDER` | `.spa` | Local build output directory |
//! | `SITE_BUCKET` | *(unset)* | Bucket name (overrides the manifest) |
//! | `SITE_STAGE` | `dev` | Deployment stage |
//! | `SITE_REGION` / `AWS_REGION` | `us-east-1` | Bucket region |
//! | `SITE_GZIP` | `false` | Gzip objects and set `Content-Encoding` |
//! | `SITE_UPLOAD_CONCURRENCY` | `16` | Maximum uploads in flight |
//! | `S3_ENDPOINT_URL` | *(unset)* | S3-compatible endpoint (path-style) |
//! | `SITE_MANIFEST` | *(unset)* | JSON site manifest with per-stage buckets |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |
//!
//! Credentials come from the standard AWS provider chain.

use std::sync::Arc;

use anyhow::{Context, Result};
use sitestack_core::{DeployConfig, ResolvedDeploy};
use sitestack_deploy::{AwsSiteStore, DeployReport, Reconciler, SiteStore};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Binary version reported at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    Ok(())
}

/// Cancel `cancel` on Ctrl-C so no new uploads start.
fn cancel_on_interrupt(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("received interrupt, waiting for in-flight uploads");
            cancel.cancel();
        }
    });
}

/// Run one deployment against `store`.
async fn deploy(
    store: Arc<dyn SiteStore>,
    resolved: &ResolvedDeploy,
    cancel: CancellationToken,
) -> Result<DeployReport> {
    Reconciler::from_resolved(store, resolved)
        .with_cancellation(cancel)
        .run(&resolved.target, &resolved.dist_folder)
        .await
        .with_context(|| format!("failed to deploy to bucket {}", resolved.target.bucket()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = DeployConfig::from_env();

    init_tracing(&config.log_level)?;

    let manifest = config
        .load_manifest()
        .context("failed to load site manifest")?;
    let resolved = config
        .resolve(manifest.as_ref())
        .context("invalid deployment configuration")?;

    info!(
        bucket = %resolved.target.bucket(),
        region = %resolved.target.region(),
        stage = %resolved.target.stage(),
        dist = %resolved.dist_folder.display(),
        gzip = resolved.gzip,
        concurrency = resolved.upload_concurrency,
        version = VERSION,
        "starting SiteStack",
    );

    let store = AwsSiteStore::connect(resolved.target.region(), config.endpoint_url.as_deref()).await;
    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    let report = deploy(Arc::new(store), &resolved, cancel).await?;

    info!(
        bucket = %resolved.target.bucket(),
        created = report.bucket_created,
        purged = report.purged,
        uploaded = report.uploaded.len(),
        compressed = report.compressed,
        "site deployed",
    );
    Ok(())
}
