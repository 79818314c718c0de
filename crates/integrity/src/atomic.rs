use std::fs::File;
use std::io::Write;
use std::path::Path;

use rand::Rng;

use crate::error::IntegrityError;

/// `write_atomic(path, bytes)`: write to `path + ".tmp-" + random`, fsync,
/// then rename over `path`. The original is left untouched if the rename
/// fails — the temp file is the only thing that can be left behind.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), IntegrityError> {
    let parent = path.parent().ok_or_else(|| IntegrityError::Format("path has no parent directory".to_string()))?;
    let suffix: u64 = rand::thread_rng().gen();
    let file_name = path
        .file_name()
        .ok_or_else(|| IntegrityError::Format("path has no file name".to_string()))?
        .to_string_lossy();
    let tmp_path = parent.join(format!("{}.tmp-{:016x}", file_name, suffix));

    let mut file = File::create(&tmp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);

    match std::fs::rename(&tmp_path, path) {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = std::fs::remove_file(&tmp_path);
            Err(IntegrityError::Io(e))
        }
    }
}

/// Atomic rename between two paths within the same filesystem, used by
/// the agent buffer and the bundle builder's scratch-to-store move.
pub fn rename_atomic(from: &Path, to: &Path) -> Result<(), IntegrityError> {
    std::fs::rename(from, to).map_err(IntegrityError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_atomic_creates_target_and_leaves_no_tmp_on_success() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("manifest.json");
        write_atomic(&target, b"{}").unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"{}");

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn write_atomic_overwrites_existing_file() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("manifest.json");
        write_atomic(&target, b"first").unwrap();
        write_atomic(&target, b"second").unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"second");
    }
}
