//! Database connection management

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::path::Path;
use std::time::Duration;

use crate::database::config::{DatabaseConfig, DatabaseType};
use crate::error::FrameworkError;

/// Clonable handle to the connection pool
///
/// `DatabaseConnection` is itself a pooled handle, so clones share the pool.
#[derive(Clone, Debug)]
pub struct DbConnection {
    inner: DatabaseConnection,
    kind: DatabaseType,
}

impl DbConnection {
    /// Open a pool from config
    ///
    /// File-backed SQLite databases are created on first connect.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, FrameworkError> {
        let kind = config.database_type();
        let url = match config.url.strip_prefix("sqlite://") {
            Some(path) if !path.starts_with(":memory:") => {
                let path = path.trim_start_matches("./");
                if let Some(parent) = Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)
                            .map_err(|e| FrameworkError::database(e.to_string()))?;
                    }
                }
                format!("sqlite:{}?mode=rwc", path)
            }
            _ => config.url.clone(),
        };

        let mut opt = ConnectOptions::new(url);
        opt.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .sqlx_logging(config.logging);

        let inner = Database::connect(opt).await?;
        tracing::debug!(backend = ?kind, "database connected");

        Ok(Self { inner, kind })
    }

    /// Get a reference to the underlying SeaORM connection
    pub fn inner(&self) -> &DatabaseConnection {
        &self.inner
    }

    pub fn kind(&self) -> DatabaseType {
        self.kind
    }

    /// Close the pool
    pub async fn close(self) -> Result<(), FrameworkError> {
        self.inner.close().await?;
        Ok(())
    }
}

impl AsRef<DatabaseConnection> for DbConnection {
    fn as_ref(&self) -> &DatabaseConnection {
        &self.inner
    }
}

impl std::ops::Deref for DbConnection {
    type Target = DatabaseConnection;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
