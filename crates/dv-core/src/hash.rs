use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 digest of `input`.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// SHA256 hash of a version's markdown content.
///
/// Missing content hashes as the empty string, matching how comparisons
/// treat it.
pub fn compute_content_hash(content: Option<&str>) -> String {
    sha256_hex(content.unwrap_or(""))
}
