//! [`SiteStore`] backed by `aws-sdk-s3`.
//!
//! Works against Amazon S3 and any S3-compatible endpoint. Credentials come
//! from the default provider chain; a custom endpoint switches the client to
//! path-style addressing.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CreateBucketConfiguration, Delete, ErrorDocument, IndexDocument,
    ObjectIdentifier, PublicAccessBlockConfiguration, WebsiteConfiguration,
};
use sitestack_core::AwsRegion;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::provision::WebsiteConfig;
use crate::store::{ObjectPage, SiteStore};
use crate::upload::UploadDescriptor;

/// Remote bucket store speaking the S3 API.
#[derive(Debug, Clone)]
pub struct AwsSiteStore {
    client: Client,
}

impl AwsSiteStore {
    /// Wrap an existing client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client for `region` from the default AWS configuration.
    ///
    /// With `endpoint_url` set, requests go to that endpoint using path-style
    /// addressing (`endpoint/bucket/key`).
    pub async fn connect(region: &AwsRegion, endpoint_url: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.as_str().to_owned()));
        if let Some(endpoint) = endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        let client = if endpoint_url.is_some() {
            let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
                .force_path_style(true)
                .build();
            Client::from_conf(s3_config)
        } else {
            Client::new(&sdk_config)
        };

        debug!(region = %region, endpoint = ?endpoint_url, "created S3 client");
        Self { client }
    }

    /// Underlying SDK client.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }
}

fn request_error(operation: &'static str, err: impl std::error::Error) -> StoreError {
    StoreError::Request {
        operation,
        message: DisplayErrorContext(err).to_string(),
    }
}

fn invalid_request(operation: &'static str, err: impl std::error::Error) -> StoreError {
    StoreError::InvalidRequest {
        operation,
        message: err.to_string(),
    }
}

#[async_trait]
impl SiteStore for AwsSiteStore {
    async fn list_buckets(&self) -> StoreResult<Vec<String>> {
        let mut names = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let resp = self
                .client
                .list_buckets()
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| request_error("ListBuckets", e))?;

            names.extend(
                resp.buckets()
                    .iter()
                    .filter_map(|b| b.name().map(str::to_owned)),
            );

            match resp.continuation_token() {
                Some(token) if !token.is_empty() => continuation = Some(token.to_owned()),
                _ => break,
            }
        }
        Ok(names)
    }

    async fn list_objects(
        &self,
        bucket: &str,
        continuation: Option<String>,
    ) -> StoreResult<ObjectPage> {
        let resp = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .set_continuation_token(continuation)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|s| s.is_no_such_bucket()) {
                    StoreError::NoSuchBucket {
                        bucket: bucket.to_owned(),
                    }
                } else {
                    request_error("ListObjectsV2", e)
                }
            })?;

        let keys = resp
            .contents()
            .iter()
            .filter_map(|o| o.key().map(str::to_owned))
            .collect();
        let next_token = if resp.is_truncated().unwrap_or(false) {
            resp.next_continuation_token().map(str::to_owned)
        } else {
            None
        };

        Ok(ObjectPage { keys, next_token })
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> StoreResult<()> {
        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| invalid_request("DeleteObjects", e))?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| invalid_request("DeleteObjects", e))?;

        let resp = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| request_error("DeleteObjects", e))?;

        let failed: Vec<String> = resp
            .errors()
            .iter()
            .map(|e| {
                format!(
                    "{}: {}",
                    e.key().unwrap_or("<unknown>"),
                    e.code().or(e.message()).unwrap_or("unknown error")
                )
            })
            .collect();
        if !failed.is_empty() {
            return Err(StoreError::PartialDelete { failed });
        }
        Ok(())
    }

    async fn create_bucket(&self, bucket: &str, region: &str) -> StoreResult<()> {
        let mut request = self.client.create_bucket().bucket(bucket);
        if region != AwsRegion::DEFAULT {
            let config = CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(region))
                .build();
            request = request.create_bucket_configuration(config);
        }

        request
            .send()
            .await
            .map_err(|e| request_error("CreateBucket", e))?;
        Ok(())
    }

    async fn put_bucket_website(&self, bucket: &str, config: &WebsiteConfig) -> StoreResult<()> {
        let index = IndexDocument::builder()
            .suffix(&config.index_document)
            .build()
            .map_err(|e| invalid_request("PutBucketWebsite", e))?;
        let error = ErrorDocument::builder()
            .key(&config.error_document)
            .build()
            .map_err(|e| invalid_request("PutBucketWebsite", e))?;
        let website = WebsiteConfiguration::builder()
            .index_document(index)
            .error_document(error)
            .build();

        self.client
            .put_bucket_website()
            .bucket(bucket)
            .website_configuration(website)
            .send()
            .await
            .map_err(|e| request_error("PutBucketWebsite", e))?;
        Ok(())
    }

    async fn allow_public_policy(&self, bucket: &str) -> StoreResult<()> {
        let config = PublicAccessBlockConfiguration::builder()
            .block_public_acls(false)
            .ignore_public_acls(false)
            .block_public_policy(false)
            .restrict_public_buckets(false)
            .build();

        self.client
            .put_public_access_block()
            .bucket(bucket)
            .public_access_block_configuration(config)
            .send()
            .await
            .map_err(|e| request_error("PutPublicAccessBlock", e))?;
        Ok(())
    }

    async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> StoreResult<()> {
        self.client
            .put_bucket_policy()
            .bucket(bucket)
            .policy(policy)
            .send()
            .await
            .map_err(|e| request_error("PutBucketPolicy", e))?;
        Ok(())
    }

    async fn put_object(&self, bucket: &str, object: UploadDescriptor) -> StoreResult<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(object.key)
            .body(ByteStream::from(object.body))
            .content_type(object.content_type)
            .set_content_encoding(object.content_encoding)
            .send()
            .await
            .map_err(|e| request_error("PutObject", e))?;
        Ok(())
    }
}
