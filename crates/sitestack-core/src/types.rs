//! Deployment target types shared by the reconciler and its callers.

use std::fmt;

use crate::error::SiteStackError;
use crate::validation::validate_bucket_name;

/// A bucket name that has passed S3 naming validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
pub struct BucketName(String);

impl BucketName {
    /// Create a validated bucket name.
    ///
    /// # Errors
    /// Returns [`SiteStackError::InvalidBucketName`] if the name breaks S3 naming rules.
    pub fn new(name: impl Into<String>) -> Result<Self, SiteStackError> {
        let name = name.into();
        validate_bucket_name(&name)?;
        Ok(Self(name))
    }

    /// Get the bucket name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// ARN resource matching every object in the bucket (`arn:aws:s3:::name/*`).
    #[must_use]
    pub fn objects_arn(&self) -> String {
        format!("arn:aws:s3:::{}/*", self.0)
    }
}

impl fmt::Display for BucketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// AWS Region identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct AwsRegion(String);

impl AwsRegion {
    /// Region used when nothing else is configured.
    pub const DEFAULT: &str = "us-east-1";

    /// Create a new region.
    #[must_use]
    pub fn new(region: impl Into<String>) -> Self {
        Self(region.into())
    }

    /// Get the region as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the provider's default region, where bucket creation
    /// must not carry a location constraint.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.0 == Self::DEFAULT
    }
}

impl Default for AwsRegion {
    fn default() -> Self {
        Self(Self::DEFAULT.to_owned())
    }
}

impl fmt::Display for AwsRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deployment stage (`dev`, `prod`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Stage(String);

impl Stage {
    /// Stage used when nothing else is configured.
    pub const DEFAULT: &str = "dev";

    /// Create a new stage.
    #[must_use]
    pub fn new(stage: impl Into<String>) -> Self {
        Self(stage.into())
    }

    /// Get the stage as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Stage {
    fn default() -> Self {
        Self(Self::DEFAULT.to_owned())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a site is deployed to.
///
/// Immutable for the duration of one reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DeploymentTarget {
    bucket: BucketName,
    region: AwsRegion,
    stage: Stage,
}

impl DeploymentTarget {
    /// Create a new deployment target.
    #[must_use]
    pub fn new(bucket: BucketName, region: AwsRegion, stage: Stage) -> Self {
        Self {
            bucket,
            region,
            stage,
        }
    }

    /// Target bucket.
    #[must_use]
    pub fn bucket(&self) -> &BucketName {
        &self.bucket
    }

    /// Target region.
    #[must_use]
    pub fn region(&self) -> &AwsRegion {
        &self.region
    }

    /// Deployment stage.
    #[must_use]
    pub fn stage(&self) -> &Stage {
        &self.stage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_create_valid_bucket_name() {
        let name = BucketName::new("my-site").unwrap();
        assert_eq!(name.as_str(), "my-site");
        assert_eq!(name.to_string(), "my-site");
    }

    #[test]
    fn test_should_reject_invalid_bucket_name() {
        assert!(BucketName::new("").is_err());
        assert!(BucketName::new("Bad_Name").is_err());
    }

    #[test]
    fn test_should_build_objects_arn() {
        let name = BucketName::new("my-site").unwrap();
        assert_eq!(name.objects_arn(), "arn:aws:s3:::my-site/*");
    }

    #[test]
    fn test_should_use_default_region_and_stage() {
        assert_eq!(AwsRegion::default().as_str(), "us-east-1");
        assert!(AwsRegion::default().is_default());
        assert!(!AwsRegion::new("eu-west-1").is_default());
        assert_eq!(Stage::default().as_str(), "dev");
    }

    #[test]
    fn test_should_expose_target_parts() {
        let target = DeploymentTarget::new(
            BucketName::new("my-site").unwrap(),
            AwsRegion::new("eu-west-1"),
            Stage::new("prod"),
        );
        assert_eq!(target.bucket().as_str(), "my-site");
        assert_eq!(target.region().as_str(), "eu-west-1");
        assert_eq!(target.stage().as_str(), "prod");
    }
}
