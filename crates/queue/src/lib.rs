pub mod error;
pub mod queries;
pub mod repository;

pub use error::QueueError;
pub use repository::JobRepository;
