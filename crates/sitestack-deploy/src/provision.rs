//! Bucket provisioning: existence, website hosting, and public read access.
//!
//! Creation is conditional on the inventory. The website configuration and the
//! policy are re-applied on every run and overwrite whatever was there, so the
//! bucket always converges to exactly the pair defined here.

use serde::{Deserialize, Serialize};
use sitestack_core::{BucketName, DeploymentTarget};
use tracing::info;

use crate::error::{DeployError, DeployResult, StoreError};
use crate::inventory::BucketState;
use crate::reconciler::Phase;
use crate::store::SiteStore;

/// Entry point served for directory requests and for every error.
pub const SPA_ENTRY_DOCUMENT: &str = "index.html";

/// Website hosting configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebsiteConfig {
    /// Suffix appended to directory requests.
    pub index_document: String,
    /// Object returned for any error, including missing keys.
    pub error_document: String,
}

impl WebsiteConfig {
    /// Single-page-app routing: every path that is not an object falls back to
    /// the entry document, which does client-side routing.
    #[must_use]
    pub fn single_page_app() -> Self {
        Self {
            index_document: SPA_ENTRY_DOCUMENT.to_owned(),
            error_document: SPA_ENTRY_DOCUMENT.to_owned(),
        }
    }
}

impl Default for WebsiteConfig {
    fn default() -> Self {
        Self::single_page_app()
    }
}

/// Bucket policy document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BucketPolicy {
    /// Policy language version.
    pub version: String,
    /// Policy identifier.
    pub id: String,
    /// Statements.
    pub statement: Vec<PolicyStatement>,
}

/// One policy statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    /// Statement identifier.
    pub sid: String,
    /// `Allow` or `Deny`.
    pub effect: String,
    /// Who the statement applies to.
    pub principal: PolicyPrincipal,
    /// Granted action.
    pub action: String,
    /// Resource ARN pattern.
    pub resource: String,
}

/// Policy principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyPrincipal {
    /// AWS principal; `*` for everyone.
    #[serde(rename = "AWS")]
    pub aws: String,
}

impl BucketPolicy {
    /// Anonymous `s3:GetObject` on every object in `bucket`.
    #[must_use]
    pub fn public_read(bucket: &BucketName) -> Self {
        Self {
            version: "2008-10-17".to_owned(),
            id: "PublicWebsitePolicy".to_owned(),
            statement: vec![PolicyStatement {
                sid: "PublicReadGetObject".to_owned(),
                effect: "Allow".to_owned(),
                principal: PolicyPrincipal {
                    aws: "*".to_owned(),
                },
                action: "s3:GetObject".to_owned(),
                resource: bucket.objects_arn(),
            }],
        }
    }

    /// Serialize to the JSON document sent to the store.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Create the bucket unless the inventory found it.
///
/// Returns whether a bucket was created.
pub async fn ensure_bucket(
    store: &dyn SiteStore,
    target: &DeploymentTarget,
    state: &BucketState,
) -> DeployResult<bool> {
    if state.exists {
        return Ok(false);
    }

    let bucket = target.bucket().as_str();
    info!(bucket, region = %target.region(), "creating bucket");
    store
        .create_bucket(bucket, target.region().as_str())
        .await
        .map_err(|e| DeployError::store(Phase::CreateBucket, e))?;
    Ok(true)
}

/// Apply the single-page-app website configuration.
pub async fn configure_website(store: &dyn SiteStore, target: &DeploymentTarget) -> DeployResult<()> {
    let bucket = target.bucket().as_str();
    info!(bucket, "configuring website bucket");
    store
        .put_bucket_website(bucket, &WebsiteConfig::single_page_app())
        .await
        .map_err(|e| DeployError::store(Phase::ConfigureWebsite, e))
}

/// Allow public policies on the bucket and apply the public-read policy.
pub async fn configure_policy(store: &dyn SiteStore, target: &DeploymentTarget) -> DeployResult<()> {
    let bucket = target.bucket().as_str();
    info!(bucket, "configuring policy for bucket");

    let policy = BucketPolicy::public_read(target.bucket())
        .to_json()
        .map_err(|e| {
            DeployError::store(
                Phase::ConfigurePolicy,
                StoreError::InvalidRequest {
                    operation: "PutBucketPolicy",
                    message: e.to_string(),
                },
            )
        })?;

    store
        .allow_public_policy(bucket)
        .await
        .map_err(|e| DeployError::store(Phase::ConfigurePolicy, e))?;
    store
        .put_bucket_policy(bucket, &policy)
        .await
        .map_err(|e| DeployError::store(Phase::ConfigurePolicy, e))
}
