//! Common utilities shared across RecipeHub crates.
//!
//! - Configuration management
//! - Telemetry setup
//! - Pagination normalization and page results
//! - Slug generation
//! - Clock abstraction

pub mod config;
pub mod datetime;
pub mod pagination;
pub mod slug;
pub mod telemetry;

pub use config::{AppConfig, DatabaseSettings, SlugConfig, TelemetryConfig};
pub use datetime::{Clock, SystemClock};
pub use pagination::{PageWindow, PaginatedResult, PaginationConfig, PaginationRequest, SortDirection};
pub use slug::slugify;

/// Common result type using anyhow::Error
pub type Result<T> = std::result::Result<T, anyhow::Error>;
