//! Deployment configuration.
//!
//! Provides [`DeployConfig`], loaded from environment variables and optionally
//! completed by a [`SiteManifest`]. Environment values always win over the
//! manifest; defaults apply last.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::{SiteStackError, SiteStackResult};
use crate::manifest::SiteManifest;
use crate::types::{AwsRegion, BucketName, DeploymentTarget, Stage};

/// Build output directory used when neither the environment nor the manifest names one.
pub const DEFAULT_DIST_FOLDER: &str = ".spa";

/// Upload worker-pool bound used when none is configured.
pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 16;

/// Raw deployment configuration.
///
/// Optional fields are left unset when the environment does not provide them
/// so that [`DeployConfig::resolve`] can fall back to the site manifest.
///
/// # Examples
///
/// ```
/// use sitestack_core::DeployConfig;
///
/// let config = DeployConfig::builder()
///     .bucket(Some("my-site".into()))
///     .build();
/// let resolved = config.resolve(None).unwrap();
/// assert_eq!(resolved.target.bucket().as_str(), "my-site");
/// assert_eq!(resolved.target.stage().as_str(), "dev");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct DeployConfig {
    /// Local directory holding the built site.
    #[builder(default)]
    pub dist_folder: Option<PathBuf>,

    /// Target bucket name.
    #[builder(default)]
    pub bucket: Option<String>,

    /// Deployment stage.
    #[builder(default = String::from(Stage::DEFAULT))]
    pub stage: String,

    /// Bucket region.
    #[builder(default)]
    pub region: Option<String>,

    /// Whether to gzip content before upload.
    #[builder(default)]
    pub gzip: Option<bool>,

    /// Maximum number of uploads in flight.
    #[builder(default = DEFAULT_UPLOAD_CONCURRENCY)]
    pub upload_concurrency: usize,

    /// Custom S3-compatible endpoint.
    #[builder(default)]
    pub endpoint_url: Option<String>,

    /// Path to a site manifest.
    #[builder(default)]
    pub manifest: Option<PathBuf>,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Fully resolved settings for one reconciliation run.
#[derive(Debug, Clone)]
pub struct ResolvedDeploy {
    /// Where to deploy.
    pub target: DeploymentTarget,
    /// What to deploy.
    pub dist_folder: PathBuf,
    /// Whether to gzip content before upload.
    pub gzip: bool,
    /// Maximum number of uploads in flight (at least 1).
    pub upload_concurrency: usize,
}

impl DeployConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `SITE_DIST_FOLDER` | `.spa` |
    /// | `SITE_BUCKET` | *(manifest)* |
    /// | `SITE_STAGE` | `dev` |
    /// | `SITE_REGION` / `AWS_REGION` | `us-east-1` |
    /// | `SITE_GZIP` | `false` |
    /// | `SITE_UPLOAD_CONCURRENCY` | `16` |
    /// | `S3_ENDPOINT_URL` | *(unset)* |
    /// | `SITE_MANIFEST` | *(unset)* |
    /// | `LOG_LEVEL` | `info` |
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(v) = lookup("SITE_DIST_FOLDER") {
            config.dist_folder = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("SITE_BUCKET") {
            config.bucket = Some(v);
        }
        if let Some(v) = lookup("SITE_STAGE") {
            config.stage = v;
        }
        config.region = ["SITE_REGION", "AWS_REGION"]
            .into_iter()
            .find_map(|name| lookup(name).filter(|v| !v.is_empty()));
        if let Some(v) = lookup("SITE_GZIP") {
            config.gzip = Some(parse_bool(&v));
        }
        if let Some(v) = lookup("SITE_UPLOAD_CONCURRENCY") {
            match v.parse::<usize>() {
                Ok(n) => config.upload_concurrency = n,
                Err(_) => tracing::warn!(value = %v, "ignoring invalid SITE_UPLOAD_CONCURRENCY"),
            }
        }
        if let Some(v) = lookup("S3_ENDPOINT_URL") {
            config.endpoint_url = Some(v);
        }
        if let Some(v) = lookup("SITE_MANIFEST") {
            config.manifest = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            config.log_level = v;
        }

        config
    }

    /// Load the configured site manifest, if any.
    pub fn load_manifest(&self) -> SiteStackResult<Option<SiteManifest>> {
        self.manifest
            .as_deref()
            .map(SiteManifest::load)
            .transpose()
    }

    /// Combine this configuration with an optional manifest into the settings
    /// for one run.
    ///
    /// # Errors
    /// - [`SiteStackError::MissingBucket`] if no bucket is named for the stage.
    /// - [`SiteStackError::InvalidBucketName`] if the resolved name is invalid.
    /// - [`SiteStackError::Config`] if the stage is empty.
    pub fn resolve(&self, manifest: Option<&SiteManifest>) -> SiteStackResult<ResolvedDeploy> {
        if self.stage.is_empty() {
            return Err(SiteStackError::Config("stage must not be empty".to_owned()));
        }
        let stage = Stage::new(self.stage.clone());

        let bucket = self
            .bucket
            .as_deref()
            .filter(|b| !b.is_empty())
            .or_else(|| manifest.and_then(|m| m.bucket_for(&stage)))
            .ok_or_else(|| SiteStackError::MissingBucket {
                stage: stage.to_string(),
            })?;
        let bucket = BucketName::new(bucket)?;

        let region = self
            .region
            .clone()
            .filter(|r| !r.is_empty())
            .or_else(|| manifest.and_then(|m| m.region.clone()))
            .filter(|r| !r.is_empty())
            .map(AwsRegion::new)
            .unwrap_or_default();

        let dist_folder = self
            .dist_folder
            .clone()
            .or_else(|| manifest.and_then(|m| m.dist_folder.clone()))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DIST_FOLDER));

        let gzip = self
            .gzip
            .or_else(|| manifest.and_then(|m| m.gzip))
            .unwrap_or(false);

        Ok(ResolvedDeploy {
            target: DeploymentTarget::new(bucket, region, stage),
            dist_folder,
            gzip,
            upload_concurrency: self.upload_concurrency.max(1),
        })
    }
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
