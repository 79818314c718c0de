use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database connection failed: {0}")]
    Connection(String),

    #[error("query rejected: {0}")]
    Query(#[from] libsql::Error),

    #[error("transaction could not be committed")]
    Transaction,

    #[error("row mapping failed: {0}")]
    Mapping(String),
}
