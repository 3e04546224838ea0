//! Core types, configuration, and site manifests for SiteStack.
//!
//! This crate holds everything a deployment needs to know before it talks to
//! the object store: the validated [`DeploymentTarget`], the environment-driven
//! [`DeployConfig`], and the optional [`SiteManifest`] that maps stages to
//! buckets. All failures here are [`SiteStackError`]s raised before any remote
//! call.

pub mod config;
mod error;
pub mod manifest;
mod types;
pub mod validation;

pub use config::{DeployConfig, ResolvedDeploy};
pub use error::{SiteStackError, SiteStackResult};
pub use manifest::{BucketSetting, SiteManifest};
pub use types::{AwsRegion, BucketName, DeploymentTarget, Stage};
