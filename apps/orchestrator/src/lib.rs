pub mod config;
pub mod error;
pub mod handlers;
pub mod job_payloads;
pub mod kernel;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod workers;

pub mod prelude {
    pub use crate::config::OrchestratorConfig;
    pub use crate::kernel::Kernel;
    pub use crate::state::{AppState, SystemMode};
}
