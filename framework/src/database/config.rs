//! Database configuration

use crate::config::env::env;

/// Database backend, derived from the connection URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseType {
    Postgres,
    Sqlite,
}

impl DatabaseType {
    pub fn from_url(url: &str) -> Self {
        if url.starts_with("sqlite:") {
            Self::Sqlite
        } else {
            Self::Postgres
        }
    }
}

/// Connection pool settings
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Seconds
    pub connect_timeout: u64,
    /// Log every statement through sqlx
    pub logging: bool,
}

impl DatabaseConfig {
    /// Build config from `DATABASE_URL` and the `DB_*` variables
    pub fn from_env() -> Self {
        Self {
            url: env("DATABASE_URL", "sqlite://./storage/openalternative.db".to_string()),
            max_connections: env("DB_MAX_CONNECTIONS", 10),
            min_connections: env("DB_MIN_CONNECTIONS", 1),
            connect_timeout: env("DB_CONNECT_TIMEOUT", 30),
            logging: env("DB_LOGGING", false),
        }
    }

    pub fn builder() -> DatabaseConfigBuilder {
        DatabaseConfigBuilder::default()
    }

    pub fn database_type(&self) -> DatabaseType {
        DatabaseType::from_url(&self.url)
    }
}

/// Builder for [`DatabaseConfig`], mostly used by tests
#[derive(Default)]
pub struct DatabaseConfigBuilder {
    url: Option<String>,
    max_connections: Option<u32>,
    logging: Option<bool>,
}

impl DatabaseConfigBuilder {
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = Some(max);
        self
    }

    pub fn logging(mut self, enabled: bool) -> Self {
        self.logging = Some(enabled);
        self
    }

    pub fn build(self) -> DatabaseConfig {
        let max_connections = self.max_connections.unwrap_or(10);
        DatabaseConfig {
            url: self.url.unwrap_or_else(|| "sqlite::memory:".to_string()),
            max_connections,
            min_connections: 1.min(max_connections),
            connect_timeout: 30,
            logging: self.logging.unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_type_from_url() {
        assert_eq!(DatabaseType::from_url("sqlite::memory:"), DatabaseType::Sqlite);
        assert_eq!(
            DatabaseType::from_url("postgres://localhost/openalt"),
            DatabaseType::Postgres
        );
    }
}
