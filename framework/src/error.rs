//! Framework-wide error types
//!
//! Provides a unified error type shared by the workflow engine, the
//! scheduler and application code. Besides the HTTP status mapping used by
//! the ingestion server, every variant carries a retry classification that
//! the workflow engine consults when an attempt fails.

use std::collections::HashMap;
use thiserror::Error;

/// Validation errors keyed by field
///
/// Contains a map of field names to error messages, supporting multiple
/// errors per field.
///
/// # Response Format
///
/// ```json
/// {
///     "message": "The given data was invalid.",
///     "errors": {
///         "website_url": ["The website url must be a valid URL."]
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrors {
    /// Map of field names to their validation error messages
    pub errors: HashMap<String, Vec<String>>,
}

impl ValidationErrors {
    /// Create a new empty ValidationErrors
    pub fn new() -> Self {
        Self {
            errors: HashMap::new(),
        }
    }

    /// Add an error for a specific field
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Check if there are any errors
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Check whether a field has at least one error
    pub fn has(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    /// Convert from validator crate's ValidationErrors
    pub fn from_validator(errors: validator::ValidationErrors) -> Self {
        let mut result = Self::new();
        for (field, field_errors) in errors.field_errors() {
            for error in field_errors {
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Validation failed for field '{}'", field));
                result.add(field.to_string(), message);
            }
        }
        result
    }

    /// Convert to JSON Value for response
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "message": "The given data was invalid.",
            "errors": self.errors
        })
    }
}

impl Default for ValidationErrors {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Validation failed: {:?}", self.errors)
    }
}

impl std::error::Error for ValidationErrors {}

/// Framework-wide error type
///
/// `FrameworkError` implements `From` for the error types of the crates the
/// framework builds on, allowing seamless use of the `?` operator:
///
/// ```rust,ignore
/// use openalt_kit::FrameworkError;
/// use sea_orm::EntityTrait;
///
/// pub async fn load(db: &DatabaseConnection, id: i64) -> Result<Option<tools::Model>, FrameworkError> {
///     Ok(tools::Entity::find_by_id(id).one(db).await?)  // DbErr converts automatically!
/// }
/// ```
///
/// # Retry classification
///
/// - retriable: `Database`, `Internal`, `Upstream`
/// - fatal: `ModelNotFound`, `ValidationError`, `Validation`, `NonRetriable`,
///   `NotConfigured`
#[derive(Debug, Clone, Error)]
pub enum FrameworkError {
    /// An optional collaborator was used without being configured
    #[error("Service '{service}' is not configured")]
    NotConfigured {
        /// Name of the missing service
        service: String,
    },

    /// Validation error
    #[error("Validation error for '{field}': {message}")]
    ValidationError {
        /// The field that failed validation
        field: String,
        /// The validation error message
        message: String,
    },

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Generic internal error
    #[error("Internal server error: {message}")]
    Internal {
        /// The error message
        message: String,
    },

    /// An external call failed in a way that may succeed later
    /// (timeout, rate limit, 5xx)
    #[error("Upstream error from {service}: {message}")]
    Upstream {
        /// The external service that failed
        service: String,
        /// The error message
        message: String,
    },

    /// A failure that must never be retried (e.g. rejected social post)
    #[error("Non-retriable error: {message}")]
    NonRetriable {
        /// The error message
        message: String,
    },

    /// Form validation errors (422 Unprocessable Entity)
    #[error("Validation failed")]
    Validation(ValidationErrors),

    /// Model not found (404 Not Found)
    #[error("{model_name} not found")]
    ModelNotFound {
        /// The name of the model that was not found
        model_name: String,
    },
}

impl FrameworkError {
    /// Create a NotConfigured error
    pub fn not_configured(service: impl Into<String>) -> Self {
        Self::NotConfigured {
            service: service.into(),
        }
    }

    /// Create a ValidationError
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a DatabaseError
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    /// Create an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create an Upstream error for a named external service
    pub fn upstream(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create a NonRetriable error
    pub fn non_retriable(message: impl Into<String>) -> Self {
        Self::NonRetriable {
            message: message.into(),
        }
    }

    /// Create a Validation error from ValidationErrors struct
    pub fn validation_errors(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }

    /// Create a ModelNotFound error (404)
    pub fn model_not_found(name: impl Into<String>) -> Self {
        Self::ModelNotFound {
            model_name: name.into(),
        }
    }

    /// Whether re-running the failed work may succeed
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Internal { .. } | Self::Upstream { .. }
        )
    }

    /// Whether the failure should abort the enclosing execution for good
    pub fn is_fatal(&self) -> bool {
        !self.is_retriable()
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotConfigured { .. } => 503,
            Self::ValidationError { .. } => 422,
            Self::Database(_) => 500,
            Self::Internal { .. } => 500,
            Self::Upstream { .. } => 502,
            Self::NonRetriable { .. } => 422,
            Self::Validation(_) => 422,
            Self::ModelNotFound { .. } => 404,
        }
    }

    /// JSON body used by the ingestion server
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Validation(errors) => errors.to_json(),
            other => serde_json::json!({ "message": other.to_string() }),
        }
    }
}

// Implement From<DbErr> for automatic error conversion with ?
impl From<sea_orm::DbErr> for FrameworkError {
    fn from(e: sea_orm::DbErr) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<serde_json::Error> for FrameworkError {
    fn from(e: serde_json::Error) -> Self {
        Self::internal(format!("JSON error: {}", e))
    }
}

impl From<reqwest::Error> for FrameworkError {
    fn from(e: reqwest::Error) -> Self {
        let service = e
            .url()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| "http".to_string());
        Self::upstream(service, e.to_string())
    }
}

impl From<redis::RedisError> for FrameworkError {
    fn from(e: redis::RedisError) -> Self {
        Self::upstream("redis", e.to_string())
    }
}

impl From<validator::ValidationErrors> for FrameworkError {
    fn from(e: validator::ValidationErrors) -> Self {
        Self::Validation(ValidationErrors::from_validator(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(FrameworkError::upstream("github", "timeout").is_retriable());
        assert!(FrameworkError::database("locked").is_retriable());
        assert!(FrameworkError::internal("boom").is_retriable());

        assert!(FrameworkError::non_retriable("rejected").is_fatal());
        assert!(FrameworkError::model_not_found("Tool").is_fatal());
        assert!(FrameworkError::not_configured("mailer").is_fatal());
    }

    #[test]
    fn test_validation_errors_json() {
        let mut errors = ValidationErrors::new();
        errors.add("slug", "The slug is required.");
        errors.add("slug", "The slug must be lowercase.");

        assert!(errors.has("slug"));
        let json = FrameworkError::validation_errors(errors).to_json();
        assert_eq!(json["errors"]["slug"].as_array().map(|a| a.len()), Some(2));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(FrameworkError::model_not_found("Tool").status_code(), 404);
        assert_eq!(FrameworkError::upstream("x", "y").status_code(), 502);
        assert_eq!(
            FrameworkError::validation("name", "required").status_code(),
            422
        );
    }
}
