use ransomeye_types::bundle::{Manifest, ManifestEntry};

use crate::canonical::canonical_bytes_of;
use crate::error::IntegrityError;
use crate::hashing::sha256_hex;

/// `merkle_root(entries)`: SHA-256 over the sorted concatenation of entry
/// hashes. Sorting by `path` makes the root independent of the order
/// entries were accumulated in during the streaming write.
pub fn merkle_root(entries: &[ManifestEntry]) -> String {
    let mut sorted: Vec<&ManifestEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));
    let mut concatenated = Vec::new();
    for entry in sorted {
        concatenated.extend_from_slice(entry.sha256.as_bytes());
    }
    sha256_hex(&concatenated)
}

/// `manifest_build(entries) -> canonical bytes`. The manifest's
/// `merkle_root` is filled in here so callers never have to compute it
/// twice; this is the only place a `Manifest` should be turned to bytes.
pub fn manifest_canonical_bytes(manifest: &Manifest) -> Result<Vec<u8>, IntegrityError> {
    canonical_bytes_of(manifest)
}

/// Recomputes the merkle root from `manifest.entries` and compares it
/// against the recorded value, before any entry is re-read from disk.
pub fn verify_merkle_root(manifest: &Manifest) -> Result<(), IntegrityError> {
    let recomputed = merkle_root(&manifest.entries);
    if recomputed != manifest.merkle_root {
        return Err(IntegrityError::MerkleMismatch {
            expected: manifest.merkle_root.clone(),
            actual: recomputed,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, hash: &str) -> ManifestEntry {
        ManifestEntry {
            path: path.to_string(),
            size: 1,
            sha256: hash.to_string(),
            chunk_index: None,
        }
    }

    #[test]
    fn merkle_root_is_order_independent() {
        let a = vec![entry("b.ndjson", "11"), entry("a.ndjson", "22")];
        let b = vec![entry("a.ndjson", "22"), entry("b.ndjson", "11")];
        assert_eq!(merkle_root(&a), merkle_root(&b));
    }
}
