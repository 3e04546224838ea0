//! Site manifests.
//!
//! A manifest is a small JSON file checked into the site's repository that
//! names the bucket to deploy to, either once for every stage or per stage:
//!
//! ```json
//! { "bucket": { "dev": "my-site-dev", "prod": "my-site" }, "gzip": true }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{SiteStackError, SiteStackResult};
use crate::types::Stage;

/// Bucket setting: one name for all stages, or a map from stage to name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BucketSetting {
    /// Same bucket for every stage.
    Single(String),
    /// Bucket per stage name.
    PerStage(BTreeMap<String, String>),
}

impl BucketSetting {
    /// Resolve the bucket name for `stage`.
    ///
    /// Empty names resolve to `None`.
    #[must_use]
    pub fn resolve(&self, stage: &Stage) -> Option<&str> {
        let name = match self {
            Self::Single(name) => Some(name.as_str()),
            Self::PerStage(by_stage) => by_stage.get(stage.as_str()).map(String::as_str),
        };
        name.filter(|n| !n.is_empty())
    }
}

/// Deployment settings read from a site manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteManifest {
    /// Bucket to deploy to.
    #[serde(default)]
    pub bucket: Option<BucketSetting>,
    /// Local build output directory.
    #[serde(default)]
    pub dist_folder: Option<PathBuf>,
    /// Region of the bucket.
    #[serde(default)]
    pub region: Option<String>,
    /// Whether to gzip uploaded content.
    #[serde(default)]
    pub gzip: Option<bool>,
}

impl SiteManifest {
    /// Load a manifest from a JSON file.
    pub fn load(path: &Path) -> SiteStackResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| SiteStackError::ManifestIo {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest = Self::parse(&raw).map_err(|source| SiteStackError::ManifestParse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded site manifest");
        Ok(manifest)
    }

    /// Parse a manifest from a JSON string.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Bucket name for `stage`, if the manifest names one.
    #[must_use]
    pub fn bucket_for(&self, stage: &Stage) -> Option<&str> {
        self.bucket.as_ref().and_then(|b| b.resolve(stage))
    }
}
