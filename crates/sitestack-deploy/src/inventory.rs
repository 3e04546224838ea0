//! Object inventory: what the target bucket holds right now.

use sitestack_core::DeploymentTarget;
use tracing::info;

use crate::error::{DeployError, DeployResult};
use crate::reconciler::Phase;
use crate::store::SiteStore;

/// Remote state observed at the start of a run.
///
/// Derived fresh for every run and discarded at the end of it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketState {
    /// Whether the bucket is visible to the caller.
    pub exists: bool,
    /// Keys currently stored, in listing order.
    pub object_keys: Vec<String>,
}

impl BucketState {
    /// State of a bucket that does not exist yet.
    #[must_use]
    pub fn absent() -> Self {
        Self::default()
    }
}

/// Inspect the target bucket.
///
/// Lists all buckets to decide existence, then walks every page of the object
/// listing. Any store error is fatal: without a complete inventory it is not
/// safe to purge.
pub async fn inspect(store: &dyn SiteStore, target: &DeploymentTarget) -> DeployResult<BucketState> {
    let bucket = target.bucket().as_str();

    let buckets = store
        .list_buckets()
        .await
        .map_err(|e| DeployError::store(Phase::Inspect, e))?;

    if !buckets.iter().any(|b| b == bucket) {
        info!(bucket, "bucket does not exist yet");
        return Ok(BucketState::absent());
    }
    info!(bucket, "bucket already exists");

    let mut object_keys = Vec::new();
    let mut continuation = None;
    let mut pages = 0usize;
    loop {
        let page = store
            .list_objects(bucket, continuation.take())
            .await
            .map_err(|e| DeployError::store(Phase::Inspect, e))?;
        pages += 1;
        object_keys.extend(page.keys);

        match page.next_token {
            Some(token) => continuation = Some(token),
            None => break,
        }
    }

    info!(bucket, objects = object_keys.len(), pages, "listed objects in bucket");
    Ok(BucketState {
        exists: true,
        object_keys,
    })
}
