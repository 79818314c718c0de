//! Fails closed before any state is written. Signature, then merkle
//! root, then every entry's own hash — in that order, each one aborting
//! the whole rehydration on failure.

use std::io::Read;
use std::path::{Path, PathBuf};

use ransomeye_integrity::{sha256_hex, verify_merkle_root, VerifyingIdentity};
use ransomeye_types::bundle::Manifest;
use tracing::warn;

use crate::error::RehydrateError;

pub struct VerifiedBundle {
    pub manifest: Manifest,
    pub manifest_sha256: String,
    pub root_dir: tempfile::TempDir,
}

/// Decompresses `archive_bytes` into a fresh scratch directory, then runs
/// the full verification chain against the manifest it contains. Returns
/// the open scratch directory (kept alive via `TempDir`) so the caller can
/// stream entry contents straight into reconciliation without re-reading
/// the archive.
pub fn verify_bundle(archive_bytes: &[u8], verifier: &VerifyingIdentity) -> Result<VerifiedBundle, RehydrateError> {
    let root_dir = tempfile::tempdir()?;
    unpack_archive(archive_bytes, root_dir.path())?;

    let manifest_bytes = std::fs::read(root_dir.path().join("manifest.json"))?;
    let manifest_sig = std::fs::read(root_dir.path().join("manifest.sig"))?;

    verifier.verify(&manifest_bytes, &manifest_sig).map_err(|_| RehydrateError::Signature)?;
    let manifest: Manifest = serde_json::from_slice(&manifest_bytes)?;
    let manifest_sha256 = sha256_hex(&manifest_bytes);

    verify_merkle_root(&manifest)?;

    for entry in &manifest.entries {
        let entry_path = root_dir.path().join(&entry.path);
        let bytes = std::fs::read(&entry_path).map_err(|_| RehydrateError::MissingEntry(entry.path.clone()))?;
        if bytes.len() as u64 != entry.size {
            return Err(RehydrateError::EntryMismatch { path: entry.path.clone() });
        }
        if sha256_hex(&bytes) != entry.sha256 {
            return Err(RehydrateError::EntryMismatch { path: entry.path.clone() });
        }
    }

    Ok(VerifiedBundle {
        manifest,
        manifest_sha256,
        root_dir,
    })
}

/// Tries zstd first, falls back to gzip, mirroring the bundler's
/// compress-with-fallback so either artifact kind rehydrates.
fn decompress_tar(archive_bytes: &[u8]) -> Result<Vec<u8>, RehydrateError> {
    match zstd::decode_all(archive_bytes) {
        Ok(tar_bytes) => Ok(tar_bytes),
        Err(e) => {
            warn!(error = %e, "archive is not zstd, trying gzip");
            let mut decoder = flate2::read::GzDecoder::new(archive_bytes);
            let mut tar_bytes = Vec::new();
            decoder.read_to_end(&mut tar_bytes).map_err(|_| RehydrateError::UnknownCompression)?;
            Ok(tar_bytes)
        }
    }
}

fn unpack_archive(archive_bytes: &[u8], dest: &Path) -> Result<(), RehydrateError> {
    let tar_bytes = decompress_tar(archive_bytes)?;
    let mut archive = tar::Archive::new(tar_bytes.as_slice());
    archive.unpack(dest)?;
    Ok(())
}

/// Reads one logical artifact stream back out by concatenating its chunks
/// in ascending `chunk_index` order, the inverse of `ChunkedWriter`.
pub fn read_logical_stream(root_dir: &Path, manifest: &Manifest, logical_name: &str) -> Result<Vec<u8>, RehydrateError> {
    let mut chunk_paths: Vec<(u32, PathBuf)> = manifest
        .entries
        .iter()
        .filter(|e| e.path.starts_with(&format!("chunks/{}/", logical_name)))
        .filter_map(|e| e.chunk_index.map(|idx| (idx, root_dir.join(&e.path))))
        .collect();
    chunk_paths.sort_by_key(|(idx, _)| *idx);

    let mut buf = Vec::new();
    for (_, path) in chunk_paths {
        buf.extend_from_slice(&std::fs::read(path)?);
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decompress_tar_round_trips_through_zstd() {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_size(5);
        header.set_cksum();
        builder.append_data(&mut header, "a.txt", &b"hello"[..]).unwrap();
        let tar_bytes = builder.into_inner().unwrap();
        let compressed = zstd::encode_all(tar_bytes.as_slice(), 3).unwrap();

        let dest = tempfile::tempdir().unwrap();
        unpack_archive(&compressed, dest.path()).unwrap();
        assert_eq!(std::fs::read(dest.path().join("a.txt")).unwrap(), b"hello");
    }
}
