//! Signed-update bundle verification followed by atomic apply with
//! rollback.

mod apply;
mod error;
mod verify;

pub use apply::{apply_update, ApplyConfig, ServiceController};
pub use error::UpdaterError;
pub use verify::{verify_update, VerifiedUpdate};
