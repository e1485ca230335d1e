//! Content hashing for exact duplicate detection.

use sha2::{Digest, Sha256};

/// Normalizing SHA-256 content hasher.
///
/// Content is normalized before hashing so minor formatting differences
/// (case, whitespace) still collide:
///
/// ```rust
/// use engram::services::dedup::ContentHasher;
///
/// let a = ContentHasher::hash("Use PostgreSQL for primary storage");
/// let b = ContentHasher::hash("  use  postgresql  for  primary  storage  ");
/// assert_eq!(a, b);
/// assert_eq!(a.len(), 64);
/// ```
pub struct ContentHasher;

impl ContentHasher {
    /// Computes the SHA-256 hash of normalized content, hex-encoded.
    #[must_use]
    pub fn hash(content: &str) -> String {
        let normalized = Self::normalize(content);
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Normalizes content: trim, lowercase, collapse whitespace runs.
    #[must_use]
    pub fn normalize(content: &str) -> String {
        content
            .trim()
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_64_hex_chars() {
        let hash = ContentHasher::hash("some content");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_normalization_collapses_formatting() {
        assert_eq!(
            ContentHasher::hash("Use PostgreSQL"),
            ContentHasher::hash("  use   POSTGRESQL  ")
        );
        assert_eq!(
            ContentHasher::hash("line one\nline two"),
            ContentHasher::hash("line one line two")
        );
    }

    #[test]
    fn test_different_content_different_hash() {
        assert_ne!(
            ContentHasher::hash("Use PostgreSQL"),
            ContentHasher::hash("Use MySQL")
        );
    }

    #[test]
    fn test_unicode_preserved() {
        let normalized = ContentHasher::normalize("Notes about 数据库 Tuning");
        assert!(normalized.contains("数据库"));
        assert!(normalized.contains("tuning"));
    }
}
