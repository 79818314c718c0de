pub mod audit;
pub mod error;
pub mod schema;

pub use audit::AuditRepository;
pub use error::StorageError;
pub use libsql::{params, Connection, Transaction};

use std::sync::Arc;

use libsql::{Builder, Database};
use tracing::{info, instrument};

/// Owns the underlying `libsql::Database` and hands out connections.
/// Remote clusters are addressed by `libsql://`/`https://` URLs with a
/// token; everything else (a local file path or `:memory:`) is opened
/// directly.
#[derive(Clone)]
pub struct Db {
    database: Arc<Database>,
    /// Keeps an in-memory database alive for the process lifetime; SQLite
    /// drops an in-memory database's contents once its last connection
    /// closes, so this anchor connection is never allowed to close.
    _memory_anchor: Option<Arc<Connection>>,
}

impl Db {
    #[instrument(skip(access_token))]
    pub async fn connect(url: &str, access_token: Option<String>) -> Result<Self, StorageError> {
        if url.is_empty() {
            return Err(StorageError::Connection("database url is empty".to_string()));
        }

        let is_remote = url.starts_with("libsql://") || url.starts_with("https://");
        let is_memory = url.contains(":memory:");

        let database = if is_remote {
            let token = access_token.ok_or_else(|| StorageError::Connection("remote database requires an access token".to_string()))?;
            Builder::new_remote(url.to_string(), token).build().await
        } else {
            Builder::new_local(url).build().await
        }
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let database = Arc::new(database);
        let anchor = if is_memory {
            let conn = database.connect().map_err(|e| StorageError::Connection(e.to_string()))?;
            schema::apply_schema(&conn).await?;
            Some(Arc::new(conn))
        } else {
            let conn = database.connect().map_err(|e| StorageError::Connection(e.to_string()))?;
            schema::apply_schema(&conn).await?;
            None
        };

        info!(%url, "database connected and schema applied");
        Ok(Db {
            database,
            _memory_anchor: anchor,
        })
    }

    pub fn connection(&self) -> Result<Connection, StorageError> {
        self.database.connect().map_err(|e| StorageError::Connection(e.to_string()))
    }
}
