//! Streaming, single-pass chunked writer. Every byte is written exactly
//! once; two incremental hashers (whole-file, current chunk) are updated
//! as bytes land, so no artifact is ever read twice to produce a digest.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use ransomeye_integrity::RunningHash;
use ransomeye_types::bundle::ManifestEntry;

use crate::error::BundleError;

const BLOCK_SIZE: usize = 64 * 1024;

pub struct ChunkedWriter {
    scratch_dir: PathBuf,
    chunks_dir: PathBuf,
    chunk_size: u64,
    chunk_index: u32,
    current_chunk_file: File,
    current_chunk_path: PathBuf,
    current_chunk_written: u64,
    current_chunk_hash: RunningHash,
    pub entries: Vec<ManifestEntry>,
}

impl ChunkedWriter {
    /// `name` namespaces this writer's chunk directory (`chunks/<name>/`) so
    /// several logical artifacts can each roll their own chunk sequence
    /// without their bytes interleaving in the same files.
    pub fn new(scratch_dir: &Path, name: &str, chunk_size: u64) -> Result<Self, BundleError> {
        let chunks_dir = scratch_dir.join("chunks").join(name);
        std::fs::create_dir_all(&chunks_dir)?;
        let (file, path) = Self::open_chunk(&chunks_dir, 0)?;
        Ok(ChunkedWriter {
            scratch_dir: scratch_dir.to_path_buf(),
            chunks_dir,
            chunk_size,
            chunk_index: 0,
            current_chunk_file: file,
            current_chunk_path: path,
            current_chunk_written: 0,
            current_chunk_hash: RunningHash::new(),
            entries: Vec::new(),
        })
    }

    fn open_chunk(chunks_dir: &Path, index: u32) -> Result<(File, PathBuf), BundleError> {
        let path = chunks_dir.join(format!("{:04}.chunk.partial", index));
        let file = File::create(&path)?;
        Ok((file, path))
    }

    /// Writes `bytes` for a single logical artifact named `logical_path`,
    /// in fixed-size blocks, rolling to a new chunk whenever the current
    /// one would exceed `chunk_size`. Each call corresponds to one
    /// artifact written once and closed — callers never re-open a chunk
    /// that has already been rolled.
    pub fn write_artifact(&mut self, bytes: &[u8]) -> Result<(), BundleError> {
        for block in bytes.chunks(BLOCK_SIZE) {
            if self.current_chunk_written + block.len() as u64 > self.chunk_size && self.current_chunk_written > 0 {
                self.roll_chunk()?;
            }
            self.current_chunk_file.write_all(block)?;
            self.current_chunk_hash.update(block);
            self.current_chunk_written += block.len() as u64;
        }
        Ok(())
    }

    fn roll_chunk(&mut self) -> Result<(), BundleError> {
        self.current_chunk_file.sync_all()?;
        let hash = std::mem::replace(&mut self.current_chunk_hash, RunningHash::new()).finalize_hex();
        let final_path = self.chunks_dir.join(format!("{:04}-{}.chunk", self.chunk_index, &hash[..16]));
        std::fs::rename(&self.current_chunk_path, &final_path)?;

        self.entries.push(ManifestEntry {
            path: final_path.strip_prefix(&self.scratch_dir).unwrap().to_string_lossy().to_string(),
            size: self.current_chunk_written,
            sha256: hash,
            chunk_index: Some(self.chunk_index),
        });

        self.chunk_index += 1;
        let (file, path) = Self::open_chunk(&self.chunks_dir, self.chunk_index)?;
        self.current_chunk_file = file;
        self.current_chunk_path = path;
        self.current_chunk_written = 0;
        Ok(())
    }

    /// Closes the writer, flushing any partial final chunk. Returns the
    /// accumulated manifest entries for every chunk written.
    pub fn finish(mut self) -> Result<Vec<ManifestEntry>, BundleError> {
        if self.current_chunk_written > 0 {
            self.roll_chunk()?;
        } else {
            // No bytes were ever written to the open chunk file; discard it.
            drop(self.current_chunk_file);
            let _ = std::fs::remove_file(&self.current_chunk_path);
        }
        Ok(self.entries)
    }
}

/// Writes a single ndjson-style output file (`alerts.ndjson`, etc.) while
/// computing its SHA-256 during the write, returning a manifest entry.
pub fn write_whole_file(path: &Path, relative_path: &str, bytes: &[u8]) -> Result<ManifestEntry, BundleError> {
    let mut hash = RunningHash::new();
    let mut file = File::create(path)?;
    for block in bytes.chunks(BLOCK_SIZE) {
        file.write_all(block)?;
        hash.update(block);
    }
    file.sync_all()?;
    Ok(ManifestEntry {
        path: relative_path.to_string(),
        size: bytes.len() as u64,
        sha256: hash.finalize_hex(),
        chunk_index: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn rolls_to_a_new_chunk_past_the_size_bound() {
        let dir = tempdir().unwrap();
        let mut writer = ChunkedWriter::new(dir.path(), "edges", 10).unwrap();
        writer.write_artifact(&[1u8; 6]).unwrap();
        writer.write_artifact(&[2u8; 6]).unwrap();
        let entries = writer.finish().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].chunk_index, Some(0));
        assert_eq!(entries[1].chunk_index, Some(1));
    }

    #[test]
    fn single_small_artifact_produces_one_chunk() {
        let dir = tempdir().unwrap();
        let mut writer = ChunkedWriter::new(dir.path(), "edges", 1024).unwrap();
        writer.write_artifact(b"hello world").unwrap();
        let entries = writer.finish().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].size, 11);
    }
}
