use sha2::{Digest, Sha256};

/// `hash(bytes) -> 32 bytes`.
pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(sha256(bytes))
}

/// Incremental hasher used by the bundle builder so a file's hash is
/// computed during the single write pass, never by a second read.
#[derive(Default)]
pub struct RunningHash(Sha256);

impl RunningHash {
    pub fn new() -> Self {
        RunningHash(Sha256::new())
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }

    pub fn finalize_hex(self) -> String {
        hex::encode(self.0.finalize())
    }
}
