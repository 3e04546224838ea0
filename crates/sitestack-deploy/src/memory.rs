//! In-memory [`SiteStore`].
//!
//! Models the subset of bucket behavior a deployment relies on: a bucket
//! table, ordered keys with paged listing, website configuration, policy, and
//! the public-access block. Every call is appended to a log so callers can
//! assert on ordering and request counts, and individual operations or keys
//! can be made to fail.
//!
//! # Thread Safety
//!
//! The bucket table is a `DashMap`; the call log and fault sets sit behind
//! `parking_lot` locks.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::provision::WebsiteConfig;
use crate::purge::MAX_DELETE_BATCH;
use crate::store::{ObjectPage, SiteStore};
use crate::upload::UploadDescriptor;

/// Default number of keys per listing page, matching S3.
const DEFAULT_PAGE_SIZE: usize = 1000;

/// An object as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Body bytes as written.
    pub body: Bytes,
    /// `Content-Type` as written.
    pub content_type: String,
    /// `Content-Encoding` as written.
    pub content_encoding: Option<String>,
}

/// One recorded store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    /// Operation name, as in the S3 API (e.g. `"PutObject"`).
    pub operation: &'static str,
    /// Bucket the call targeted, if any.
    pub bucket: Option<String>,
    /// Object key for single-object calls.
    pub key: Option<String>,
}

#[derive(Debug)]
struct MemoryBucket {
    region: String,
    objects: BTreeMap<String, StoredObject>,
    website: Option<WebsiteConfig>,
    policy: Option<String>,
    public_policy_allowed: bool,
}

impl MemoryBucket {
    fn new(region: &str) -> Self {
        Self {
            region: region.to_owned(),
            objects: BTreeMap::new(),
            website: None,
            policy: None,
            public_policy_allowed: false,
        }
    }
}

/// In-process bucket store.
#[derive(Debug)]
pub struct InMemorySiteStore {
    buckets: DashMap<String, MemoryBucket>,
    page_size: usize,
    calls: Mutex<Vec<StoreCall>>,
    failing_operations: RwLock<HashSet<&'static str>>,
    failing_keys: RwLock<HashSet<String>>,
}

impl Default for InMemorySiteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySiteStore {
    /// Create an empty store with S3's listing page size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Create an empty store that lists at most `page_size` keys per page.
    #[must_use]
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            buckets: DashMap::new(),
            page_size: page_size.max(1),
            calls: Mutex::new(Vec::new()),
            failing_operations: RwLock::new(HashSet::new()),
            failing_keys: RwLock::new(HashSet::new()),
        }
    }

    /// Make every future call of `operation` fail.
    pub fn fail_operation(&self, operation: &'static str) {
        self.failing_operations.write().insert(operation);
    }

    /// Make every future `PutObject` of `key` fail.
    pub fn fail_key(&self, key: impl Into<String>) {
        self.failing_keys.write().insert(key.into());
    }

    /// Stop injecting failures.
    pub fn clear_failures(&self) {
        self.failing_operations.write().clear();
        self.failing_keys.write().clear();
    }

    /// All calls made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    /// Operation names of all calls made so far, in order.
    #[must_use]
    pub fn operations(&self) -> Vec<&'static str> {
        self.calls.lock().iter().map(|c| c.operation).collect()
    }

    /// Number of calls made to `operation`.
    #[must_use]
    pub fn calls_named(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    /// Forget all recorded calls.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Keys in `bucket`, sorted. Empty if the bucket does not exist.
    #[must_use]
    pub fn object_keys(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .get(bucket)
            .map(|b| b.objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Object stored under `key`.
    #[must_use]
    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.buckets.get(bucket)?.objects.get(key).cloned()
    }

    /// Region the bucket was created in.
    #[must_use]
    pub fn bucket_region(&self, bucket: &str) -> Option<String> {
        self.buckets.get(bucket).map(|b| b.region.clone())
    }

    /// Current website configuration.
    #[must_use]
    pub fn website(&self, bucket: &str) -> Option<WebsiteConfig> {
        self.buckets.get(bucket)?.website.clone()
    }

    /// Current policy document.
    #[must_use]
    pub fn policy(&self, bucket: &str) -> Option<String> {
        self.buckets.get(bucket)?.policy.clone()
    }

    /// Whether the public-access block has been cleared.
    #[must_use]
    pub fn public_policy_allowed(&self, bucket: &str) -> bool {
        self.buckets
            .get(bucket)
            .is_some_and(|b| b.public_policy_allowed)
    }

    fn record(
        &self,
        operation: &'static str,
        bucket: Option<&str>,
        key: Option<&str>,
    ) -> StoreResult<()> {
        self.calls.lock().push(StoreCall {
            operation,
            bucket: bucket.map(str::to_owned),
            key: key.map(str::to_owned),
        });

        if self.failing_operations.read().contains(operation) {
            return Err(StoreError::Request {
                operation,
                message: "injected failure".to_owned(),
            });
        }
        Ok(())
    }

    fn with_bucket<T>(
        &self,
        bucket: &str,
        f: impl FnOnce(&mut MemoryBucket) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut entry = self
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::NoSuchBucket {
                bucket: bucket.to_owned(),
            })?;
        f(&mut entry)
    }
}

#[async_trait]
impl SiteStore for InMemorySiteStore {
    async fn list_buckets(&self) -> StoreResult<Vec<String>> {
        self.record("ListBuckets", None, None)?;
        let mut names: Vec<String> = self.buckets.iter().map(|b| b.key().clone()).collect();
        names.sort();
        Ok(names)
    }

    async fn list_objects(
        &self,
        bucket: &str,
        continuation: Option<String>,
    ) -> StoreResult<ObjectPage> {
        self.record("ListObjectsV2", Some(bucket), None)?;
        let page_size = self.page_size;
        self.with_bucket(bucket, |b| {
            let mut keys = b
                .objects
                .keys()
                .filter(|k| continuation.as_ref().is_none_or(|after| *k > after))
                .take(page_size + 1)
                .cloned()
                .collect::<Vec<_>>();

            let next_token = if keys.len() > page_size {
                keys.truncate(page_size);
                keys.last().cloned()
            } else {
                None
            };
            Ok(ObjectPage { keys, next_token })
        })
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> StoreResult<()> {
        self.record("DeleteObjects", Some(bucket), None)?;
        if keys.is_empty() || keys.len() > MAX_DELETE_BATCH {
            return Err(StoreError::InvalidRequest {
                operation: "DeleteObjects",
                message: format!(
                    "batch must hold 1..={MAX_DELETE_BATCH} keys, got {}",
                    keys.len()
                ),
            });
        }
        self.with_bucket(bucket, |b| {
            for key in keys {
                b.objects.remove(key);
            }
            debug!(bucket, deleted = keys.len(), "deleted objects");
            Ok(())
        })
    }

    async fn create_bucket(&self, bucket: &str, region: &str) -> StoreResult<()> {
        self.record("CreateBucket", Some(bucket), None)?;
        if self.buckets.contains_key(bucket) {
            return Err(StoreError::Request {
                operation: "CreateBucket",
                message: format!("BucketAlreadyOwnedByYou: {bucket}"),
            });
        }
        self.buckets
            .insert(bucket.to_owned(), MemoryBucket::new(region));
        Ok(())
    }

    async fn put_bucket_website(&self, bucket: &str, config: &WebsiteConfig) -> StoreResult<()> {
        self.record("PutBucketWebsite", Some(bucket), None)?;
        self.with_bucket(bucket, |b| {
            b.website = Some(config.clone());
            Ok(())
        })
    }

    async fn allow_public_policy(&self, bucket: &str) -> StoreResult<()> {
        self.record("PutPublicAccessBlock", Some(bucket), None)?;
        self.with_bucket(bucket, |b| {
            b.public_policy_allowed = true;
            Ok(())
        })
    }

    async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> StoreResult<()> {
        self.record("PutBucketPolicy", Some(bucket), None)?;
        self.with_bucket(bucket, |b| {
            b.policy = Some(policy.to_owned());
            Ok(())
        })
    }

    async fn put_object(&self, bucket: &str, object: UploadDescriptor) -> StoreResult<()> {
        self.record("PutObject", Some(bucket), Some(&object.key))?;
        if self.failing_keys.read().contains(&object.key) {
            return Err(StoreError::Request {
                operation: "PutObject",
                message: format!("injected failure for {}", object.key),
            });
        }
        self.with_bucket(bucket, |b| {
            b.objects.insert(
                object.key,
                StoredObject {
                    body: object.body,
                    content_type: object.content_type,
                    content_encoding: object.content_encoding,
                },
            );
            Ok(())
        })
    }
}
