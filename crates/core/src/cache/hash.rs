//! Content digests for rendered sitemap output.

use sha2::{Digest, Sha256};

/// Compute a strong etag for rendered content.
pub fn content_etag(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
