//! Isolated databases for tests

use sea_orm_migration::MigratorTrait;

use crate::database::config::DatabaseConfig;
use crate::database::connection::DbConnection;
use crate::error::FrameworkError;

/// A fresh in-memory SQLite database with migrations applied
///
/// The pool is pinned to a single connection so every query sees the same
/// in-memory database.
///
/// ```rust,ignore
/// let db = TestDatabase::fresh::<Migrator>().await?;
/// let store = SeaOrmToolStore::new(db.conn().clone());
/// ```
pub struct TestDatabase {
    conn: DbConnection,
}

impl TestDatabase {
    pub async fn fresh<M: MigratorTrait>() -> Result<Self, FrameworkError> {
        let config = DatabaseConfig::builder()
            .url("sqlite::memory:")
            .max_connections(1)
            .build();
        let conn = DbConnection::connect(&config).await?;
        M::up(conn.inner(), None).await?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &DbConnection {
        &self.conn
    }
}

impl std::ops::Deref for TestDatabase {
    type Target = DbConnection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}
