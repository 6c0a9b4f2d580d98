//! Application layer for RecipeHub
//!
//! Domain services built on the persistence layer. Every operation opens its
//! own unit of work, so a service value can be shared freely across requests.
//!
//! ## Modules
//!
//! - `services` - Recipe, category, tag, favorite, review and user services
//! - `bootstrap` - Wiring services from an [`AppConfig`](recipe_hub_common::AppConfig)

pub mod bootstrap;
pub mod services;

pub use bootstrap::{bootstrap, connect};
pub use services::{
    CategoryService, FavoriteService, RecipeFilter, RecipeService, RecipeSort, ReviewService,
    ServiceConfig, Services, TagService, UserFilter, UserOrder, UserService,
};

use recipe_hub_domain::ValidationError;
use recipe_hub_infrastructure::Error as StorageError;
use thiserror::Error;

/// Application-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplicationError {
    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Permission denied
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Validation errors
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Resource conflict (e.g., duplicate)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The caller gave up on the request
    #[error("Operation cancelled")]
    Cancelled,

    /// The store failed; nothing from this operation was written
    #[error("Storage error: {message}")]
    Storage { message: String, retryable: bool },
}

impl ApplicationError {
    /// Get HTTP status code for this error
    pub fn http_status(&self) -> u16 {
        match self {
            ApplicationError::NotFound(_) => 404,
            ApplicationError::Forbidden(_) => 403,
            ApplicationError::InvalidInput(_) => 400,
            ApplicationError::ValidationFailed(_) => 422,
            ApplicationError::Conflict(_) => 409,
            ApplicationError::Cancelled => 499,
            ApplicationError::Storage { .. } => 503,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApplicationError::Storage { retryable: true, .. })
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            ApplicationError::NotFound(_) => "NOT_FOUND",
            ApplicationError::Forbidden(_) => "FORBIDDEN",
            ApplicationError::InvalidInput(_) => "INVALID_INPUT",
            ApplicationError::ValidationFailed(_) => "VALIDATION_FAILED",
            ApplicationError::Conflict(_) => "CONFLICT",
            ApplicationError::Cancelled => "CANCELLED",
            ApplicationError::Storage { .. } => "STORAGE_ERROR",
        }
    }

    pub(crate) fn not_found(what: &str, key: impl std::fmt::Display) -> Self {
        ApplicationError::NotFound(format!("{what} {key}"))
    }
}

impl From<StorageError> for ApplicationError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UniqueViolation { table, key, value } => {
                ApplicationError::Conflict(format!("{table}.{key} '{value}' is already taken"))
            }
            StorageError::Constraint(message) => ApplicationError::Conflict(message),
            StorageError::NotFound(message) => ApplicationError::NotFound(message),
            StorageError::Cancelled => ApplicationError::Cancelled,
            other => ApplicationError::Storage {
                retryable: other.is_retryable(),
                message: other.to_string(),
            },
        }
    }
}

impl From<ValidationError> for ApplicationError {
    fn from(err: ValidationError) -> Self {
        ApplicationError::ValidationFailed(err.messages().join("; "))
    }
}

impl From<validator::ValidationErrors> for ApplicationError {
    fn from(err: validator::ValidationErrors) -> Self {
        ValidationError::from(err).into()
    }
}

pub type ApplicationResult<T> = Result<T, ApplicationError>;
