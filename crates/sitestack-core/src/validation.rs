//! Bucket name validation.
//!
//! Follows the
//! [Amazon S3 bucket naming rules](https://docs.aws.amazon.com/AmazonS3/latest/userguide/bucketnamingrules.html)
//! so that a bad name is reported as a configuration error instead of a
//! failed remote call halfway through a deployment.

use std::net::Ipv4Addr;

use crate::error::SiteStackError;

/// Minimum bucket name length.
const MIN_BUCKET_NAME_LEN: usize = 3;

/// Maximum bucket name length.
const MAX_BUCKET_NAME_LEN: usize = 63;

/// Validate an S3 bucket name.
///
/// Rules:
/// - 3-63 characters long
/// - Only lowercase letters, numbers, hyphens, and dots
/// - Must start and end with a letter or number
/// - No consecutive dots (`..`)
/// - Not formatted as an IPv4 address (e.g. `192.168.0.1`)
/// - Must not start with `xn--` or `sthree-`
/// - Must not end with `-s3alias`
///
/// # Examples
///
/// ```
/// use sitestack_core::validation::validate_bucket_name;
///
/// assert!(validate_bucket_name("my-site.example.com").is_ok());
/// assert!(validate_bucket_name("My_Site").is_err());
/// ```
pub fn validate_bucket_name(name: &str) -> Result<(), SiteStackError> {
    let reject = |reason: &str| {
        Err(SiteStackError::InvalidBucketName {
            name: name.to_owned(),
            reason: reason.to_owned(),
        })
    };

    let len = name.len();
    if !(MIN_BUCKET_NAME_LEN..=MAX_BUCKET_NAME_LEN).contains(&len) {
        return reject(&format!(
            "must be between {MIN_BUCKET_NAME_LEN} and {MAX_BUCKET_NAME_LEN} characters long"
        ));
    }

    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.')
    {
        return reject("must only contain lowercase letters, numbers, hyphens, and dots");
    }

    let alnum = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    let bytes = name.as_bytes();
    if !alnum(bytes[0]) || !alnum(bytes[len - 1]) {
        return reject("must start and end with a letter or number");
    }

    if name.contains("..") {
        return reject("must not contain consecutive dots");
    }

    if name.parse::<Ipv4Addr>().is_ok() {
        return reject("must not be formatted as an IP address");
    }

    if name.starts_with("xn--") || name.starts_with("sthree-") {
        return reject("must not start with a reserved prefix");
    }

    if name.ends_with("-s3alias") {
        return reject("must not end with '-s3alias'");
    }

    Ok(())
}
