//! Remote purge: delete everything the inventory found.
//!
//! Deployments are full-replace: every prior object is removed before the new
//! set is written. A run that fails after the purge leaves the bucket empty or
//! partially populated until it is re-run.

use sitestack_core::DeploymentTarget;
use tracing::{debug, info};

use crate::error::{DeployError, DeployResult};
use crate::inventory::BucketState;
use crate::reconciler::Phase;
use crate::store::SiteStore;

/// Maximum number of keys accepted by one batch-delete request.
pub const MAX_DELETE_BATCH: usize = 1000;

/// Delete every key in `state` from the target bucket.
///
/// Does nothing when the bucket does not exist or is already empty. Otherwise
/// issues one batch-delete request per [`MAX_DELETE_BATCH`] keys, which is a
/// single request for any bucket of up to 1000 objects.
///
/// Returns the number of keys deleted.
pub async fn purge(
    store: &dyn SiteStore,
    target: &DeploymentTarget,
    state: &BucketState,
) -> DeployResult<usize> {
    let bucket = target.bucket().as_str();

    if !state.exists || state.object_keys.is_empty() {
        debug!(bucket, "nothing to purge");
        return Ok(0);
    }

    info!(bucket, objects = state.object_keys.len(), "deleting all objects from bucket");
    for batch in state.object_keys.chunks(MAX_DELETE_BATCH) {
        store
            .delete_objects(bucket, batch)
            .await
            .map_err(|e| DeployError::store(Phase::Purge, e))?;
        debug!(bucket, deleted = batch.len(), "batch delete completed");
    }

    Ok(state.object_keys.len())
}
