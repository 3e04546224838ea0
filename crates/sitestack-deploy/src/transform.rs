//! Content transform applied to file bytes before upload.

use std::io::Write;

use bytes::Bytes;
use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::warn;

/// `Content-Encoding` value for gzip-compressed bodies.
pub const GZIP_ENCODING: &str = "gzip";

/// Body after the transform, with the encoding that was actually applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    /// Bytes to upload.
    pub body: Bytes,
    /// `Some("gzip")` when the body is compressed.
    pub content_encoding: Option<&'static str>,
}

/// Optionally gzip `body`.
///
/// When compression is enabled but fails, the original bytes are returned
/// untouched with no encoding and a warning is logged; the returned
/// `content_encoding` is the only signal of what happened.
#[must_use]
pub fn maybe_compress(body: Bytes, enabled: bool) -> Transformed {
    if !enabled {
        return Transformed {
            body,
            content_encoding: None,
        };
    }

    compress_with(body, gzip)
}

/// Encode `body` with `encode`, keeping the original bytes if it fails.
fn compress_with(
    body: Bytes,
    encode: impl FnOnce(&[u8]) -> std::io::Result<Vec<u8>>,
) -> Transformed {
    match encode(&body) {
        Ok(compressed) => Transformed {
            body: Bytes::from(compressed),
            content_encoding: Some(GZIP_ENCODING),
        },
        Err(e) => {
            warn!(error = %e, "compression failed, uploading uncompressed");
            Transformed {
                body,
                content_encoding: None,
            }
        }
    }
}

/// Gzip `input` at the default compression level.
pub fn gzip(input: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(input.len() / 2), Compression::default());
    encoder.write_all(input)?;
    encoder.finish()
}
