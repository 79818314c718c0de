pub mod engine;
pub mod error;
pub mod extract;
pub mod policy;
pub mod repository;

pub use engine::{AdmissionOutcome, AlertEngine, PolicyHandle};
pub use error::AlertEngineError;
pub use policy::{PolicyRule, PolicySet, RulePredicate};
pub use repository::AlertRepository;
