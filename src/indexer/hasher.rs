//! Content hashing and change detection.

use blake3::Hasher;

use crate::storage::StoredFile;

/// Compute the blake3 hex digest of `content`.
#[must_use]
pub fn hash_content(content: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(content);
    hasher.finalize().to_hex().to_string()
}

/// Bytes inspected when sniffing for binary content.
pub const BINARY_SNIFF_LEN: usize = 8192;

/// Whether `content` looks binary (a NUL byte in its first 8 KiB).
#[must_use]
pub fn looks_binary(content: &[u8]) -> bool {
    content.iter().take(BINARY_SNIFF_LEN).any(|&b| b == 0)
}

/// What to do with a file given its persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeDecision {
    /// No record yet: insert and index.
    New,
    /// Same hash: no storage write, no sink submission.
    Unchanged { file_id: i64 },
    /// Different hash: update the record and resubmit chunks.
    Changed { file_id: i64 },
}

/// Compare a freshly computed hash against the stored record.
#[must_use]
pub fn detect_change(existing: Option<&StoredFile>, hash: &str) -> ChangeDecision {
    match existing {
        None => ChangeDecision::New,
        Some(stored) if stored.hash == hash => ChangeDecision::Unchanged { file_id: stored.id },
        Some(stored) => ChangeDecision::Changed { file_id: stored.id },
    }
}
