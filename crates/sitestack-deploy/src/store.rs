//! The object-store boundary.
//!
//! [`SiteStore`] is the seam between the reconciler and the remote service.
//! It names exactly the operations a deployment needs; everything above it is
//! provider-agnostic and everything below it speaks one wire protocol.
//!
//! Implementations:
//!
//! - [`AwsSiteStore`](crate::aws::AwsSiteStore) -- Amazon S3 or any
//!   S3-compatible endpoint via `aws-sdk-s3`
//! - [`InMemorySiteStore`](crate::memory::InMemorySiteStore) -- an in-process
//!   bucket model that records every call

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::provision::WebsiteConfig;
use crate::upload::UploadDescriptor;

/// One page of an object listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectPage {
    /// Keys on this page, in listing order.
    pub keys: Vec<String>,
    /// Token for the next page; `None` on the last page.
    pub next_token: Option<String>,
}

/// Remote object-store operations used by a deployment.
///
/// All methods are safe to call concurrently; the reconciler only does so for
/// [`put_object`](SiteStore::put_object).
#[async_trait]
pub trait SiteStore: Send + Sync + 'static {
    /// Names of all buckets visible to the caller's credentials.
    async fn list_buckets(&self) -> StoreResult<Vec<String>>;

    /// One page of object keys in `bucket`, starting after `continuation`.
    async fn list_objects(
        &self,
        bucket: &str,
        continuation: Option<String>,
    ) -> StoreResult<ObjectPage>;

    /// Delete `keys` from `bucket` in one batch request.
    ///
    /// Callers must not pass more than
    /// [`MAX_DELETE_BATCH`](crate::purge::MAX_DELETE_BATCH) keys.
    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> StoreResult<()>;

    /// Create `bucket` in `region`.
    async fn create_bucket(&self, bucket: &str, region: &str) -> StoreResult<()>;

    /// Replace the bucket's website configuration.
    async fn put_bucket_website(&self, bucket: &str, config: &WebsiteConfig) -> StoreResult<()>;

    /// Clear every public-access block flag on the bucket so a public policy
    /// can be attached.
    async fn allow_public_policy(&self, bucket: &str) -> StoreResult<()>;

    /// Replace the bucket policy with the JSON document `policy`.
    async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> StoreResult<()>;

    /// Write one object.
    async fn put_object(&self, bucket: &str, object: UploadDescriptor) -> StoreResult<()>;
}
