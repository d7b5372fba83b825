//! Configuration module
//!
//! - `.env` file loading with environment-based precedence
//! - Type-safe configuration structs registered once at startup
//! - `Config::get::<T>()` access from anywhere in the process
//!
//! # Example
//!
//! ```rust,no_run
//! use openalt_kit::{Config, ServerConfig};
//!
//! Config::init(std::path::Path::new("."));
//! let server = Config::get::<ServerConfig>().unwrap_or_default();
//! assert!(server.port > 0);
//! ```

pub mod env;
pub mod providers;
pub mod repository;

pub use env::{env, env_list, env_optional, load_dotenv, Environment};
pub use providers::{AppConfig, ServerConfig};

use crate::database::DatabaseConfig;
use crate::workflow::WorkflowConfig;
use std::path::Path;

/// Config facade
pub struct Config;

impl Config {
    /// Load `.env` files and register the framework's own configs
    ///
    /// Call once at startup, before any `Config::get`.
    pub fn init(project_root: &Path) -> Environment {
        let env = env::load_dotenv(project_root);

        repository::register(AppConfig::from_env());
        repository::register(ServerConfig::from_env());
        repository::register(DatabaseConfig::from_env());
        repository::register(WorkflowConfig::from_env());

        env
    }

    /// Get a typed config struct from the repository
    pub fn get<T: std::any::Any + Send + Sync + Clone + 'static>() -> Option<T> {
        repository::get::<T>()
    }

    /// Register an application config struct
    ///
    /// ```rust,no_run
    /// use openalt_kit::Config;
    ///
    /// #[derive(Clone)]
    /// struct SiteConfig {
    ///     name: String,
    /// }
    ///
    /// Config::register(SiteConfig { name: "OpenAlternative".into() });
    /// ```
    pub fn register<T: std::any::Any + Send + Sync + 'static>(config: T) {
        repository::register(config);
    }

    /// Check if a config type is registered
    pub fn has<T: std::any::Any + 'static>() -> bool {
        repository::has::<T>()
    }

    /// The current environment
    pub fn environment() -> Environment {
        Config::get::<AppConfig>()
            .map(|c| c.environment)
            .unwrap_or_else(Environment::detect)
    }

    pub fn is_production() -> bool {
        Self::environment().is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct SampleConfig {
        value: u32,
    }

    #[test]
    fn test_register_and_get() {
        Config::register(SampleConfig { value: 7 });
        assert!(Config::has::<SampleConfig>());
        assert_eq!(Config::get::<SampleConfig>(), Some(SampleConfig { value: 7 }));

        Config::register(SampleConfig { value: 8 });
        assert_eq!(Config::get::<SampleConfig>().map(|c| c.value), Some(8));
    }
}
