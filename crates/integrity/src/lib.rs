pub mod atomic;
pub mod canonical;
pub mod error;
pub mod hashing;
pub mod manifest;
pub mod signing;

pub use atomic::{rename_atomic, write_atomic};
pub use canonical::{canonical_bytes, canonical_bytes_of};
pub use error::IntegrityError;
pub use hashing::{sha256, sha256_hex, RunningHash};
pub use manifest::{manifest_canonical_bytes, merkle_root, verify_merkle_root};
pub use signing::{SigningIdentity, VerifyingIdentity};
