use std::path::Path;

/// Deployment environment, read from `APP_ENV`
#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Local,
    Development,
    Staging,
    Production,
    Testing,
    Custom(String),
}

impl Environment {
    /// Detect environment from APP_ENV or default to Local
    pub fn detect() -> Self {
        Self::parse(std::env::var("APP_ENV").ok().as_deref())
    }

    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("production") => Self::Production,
            Some("staging") => Self::Staging,
            Some("development") => Self::Development,
            Some("testing") => Self::Testing,
            Some("local") | None => Self::Local,
            Some(other) => Self::Custom(other.to_string()),
        }
    }

    /// Name used as the `.env.{name}` file suffix
    pub fn as_str(&self) -> &str {
        match self {
            Self::Local => "local",
            Self::Production => "production",
            Self::Staging => "staging",
            Self::Development => "development",
            Self::Testing => "testing",
            Self::Custom(name) => name.as_str(),
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Self::Local | Self::Development)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Load environment variables from .env files
///
/// Precedence, highest first:
/// 1. Actual process environment variables
/// 2. `.env.{environment}.local`
/// 3. `.env.{environment}`
/// 4. `.env.local`
/// 5. `.env`
///
/// dotenvy never overwrites a variable that is already set, so files are
/// loaded from most to least specific.
pub fn load_dotenv(project_root: &Path) -> Environment {
    let env = Environment::detect();
    let suffix = env.as_str().to_string();

    let candidates = [
        format!(".env.{}.local", suffix),
        format!(".env.{}", suffix),
        ".env.local".to_string(),
        ".env".to_string(),
    ];

    for file in candidates {
        let _ = dotenvy::from_path(project_root.join(file));
    }

    env
}

/// Get an environment variable with a default value
///
/// # Example
/// ```
/// use openalt_kit::config::env;
///
/// let port: u16 = env("SERVER_PORT", 8080);
/// ```
pub fn env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_optional(key).unwrap_or(default)
}

/// Get an optional environment variable; empty values count as unset
///
/// # Example
/// ```
/// use openalt_kit::config::env_optional;
///
/// let token: Option<String> = env_optional("GITHUB_TOKEN");
/// ```
pub fn env_optional<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .and_then(|v| v.parse().ok())
}

/// Get a comma separated list, skipping blank entries
pub fn env_list(key: &str) -> Vec<String> {
    std::env::var(key)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse(None), Environment::Local);
        assert_eq!(Environment::parse(Some("production")), Environment::Production);
        assert_eq!(
            Environment::parse(Some("preview")),
            Environment::Custom("preview".to_string())
        );
        assert!(Environment::parse(Some("development")).is_development());
    }

    #[test]
    fn test_env_list_skips_blanks() {
        std::env::set_var("KIT_TEST_ENV_LIST", "a, b,,c ");
        assert_eq!(env_list("KIT_TEST_ENV_LIST"), vec!["a", "b", "c"]);
        std::env::remove_var("KIT_TEST_ENV_LIST");
    }

    #[test]
    fn test_env_optional_treats_empty_as_unset() {
        std::env::set_var("KIT_TEST_EMPTY", "  ");
        assert_eq!(env_optional::<String>("KIT_TEST_EMPTY"), None);
        std::env::remove_var("KIT_TEST_EMPTY");
    }
}
