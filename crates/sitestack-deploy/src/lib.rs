//! Static-site deployment to S3 website buckets.
//!
//! A [`Reconciler`] makes a bucket an exact mirror of a local build output
//! directory: it inspects the bucket, creates it if needed, (re)applies the
//! single-page-app website configuration and the public-read policy, purges
//! every prior object, then walks the local tree and uploads each file with
//! its inferred content type and optional gzip encoding.
//!
//! Remote calls go through the [`SiteStore`] trait. [`AwsSiteStore`] talks to
//! S3 or an S3-compatible endpoint; [`InMemorySiteStore`] keeps everything in
//! process and records each call.
//!
//! ```no_run
//! # async fn deploy() -> Result<(), Box<dyn std::error::Error>> {
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use sitestack_core::{AwsRegion, BucketName, DeploymentTarget, Stage};
//! use sitestack_deploy::{AwsSiteStore, Reconciler};
//!
//! let target = DeploymentTarget::new(
//!     BucketName::new("my-site")?,
//!     AwsRegion::default(),
//!     Stage::default(),
//! );
//! let store = AwsSiteStore::connect(target.region(), None).await;
//! let report = Reconciler::new(Arc::new(store))
//!     .with_gzip(true)
//!     .run(&target, Path::new(".spa"))
//!     .await?;
//! println!("uploaded {} objects", report.uploaded.len());
//! # Ok(())
//! # }
//! ```

pub mod aws;
pub mod error;
pub mod inventory;
pub mod memory;
pub mod provision;
pub mod purge;
pub mod reconciler;
pub mod store;
pub mod transform;
pub mod upload;
pub mod walker;

pub use aws::AwsSiteStore;
pub use error::{DeployError, DeployResult, StoreError, StoreResult, UploadFailure};
pub use memory::InMemorySiteStore;
pub use reconciler::{DeployReport, Phase, Reconciler};
pub use store::{ObjectPage, SiteStore};
pub use upload::{UploadDescriptor, UploadReport};
