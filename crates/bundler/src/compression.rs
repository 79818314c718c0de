//! Try zstandard, fall back to gzip if unavailable, and record whichever
//! was actually used in the manifest so the rehydrator knows which decoder
//! to run. The algorithm is decided up front, before the manifest that
//! names it is built and signed, so the signed manifest always matches
//! the bytes actually written to disk.

use std::io::Write;
use std::path::Path;

use ransomeye_types::bundle::Compression;
use tracing::warn;

use crate::error::BundleError;

/// Probes zstd availability independent of any particular payload, so the
/// decision can be made before there is a tree to compress.
pub fn decide_compression(level: i32) -> Compression {
    match zstd::encode_all(&[][..], level) {
        Ok(_) => Compression::Zstd,
        Err(e) => {
            warn!(error = %e, "zstd compression unavailable, falling back to gzip");
            Compression::Gzip
        }
    }
}

pub fn compress_tree(scratch_dir: &Path, level: i32, algo: Compression) -> Result<Vec<u8>, BundleError> {
    let tar_bytes = tar_directory(scratch_dir)?;

    match algo {
        Compression::Zstd => Ok(zstd::encode_all(tar_bytes.as_slice(), level)?),
        Compression::Gzip => {
            let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(&tar_bytes)?;
            Ok(encoder.finish()?)
        }
    }
}

fn tar_directory(scratch_dir: &Path) -> Result<Vec<u8>, BundleError> {
    let mut builder = tar::Builder::new(Vec::new());
    builder.append_dir_all(".", scratch_dir)?;
    Ok(builder.into_inner()?)
}
