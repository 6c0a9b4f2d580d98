//! Configuration management for the application.
//!
//! Settings are layered from `config/default.toml`, `config/{APP_ENV}.toml` and
//! `APP_`-prefixed environment variables, later sources winning.
//!
//! ## Example Configuration
//!
//! ```toml
//! [database]
//! url = "postgres://localhost:5432/recipe_hub"
//! max_connections = 20
//!
//! [pagination]
//! default_page_size = 10
//! max_page_size = 100
//!
//! [slug]
//! max_conflict_retries = 5
//! fallback = "recipe"
//!
//! [telemetry]
//! json_logging = true
//! log_level = "info"
//! ```

use crate::pagination::PaginationConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub slug: SlugConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Database connection URL. Empty selects the in-memory store.
    #[serde(default)]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    #[serde(default = "default_db_timeout")]
    pub timeout_seconds: u64,

    /// Apply pending migrations on startup
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

/// Slug generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlugConfig {
    /// How many times a save is retried after losing a slug race
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,

    /// Base slug used when a title slugifies to nothing
    #[serde(default = "default_slug_fallback")]
    pub fallback: String,
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Enable JSON logging format
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions
fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_db_timeout() -> u64 {
    30
}

fn default_run_migrations() -> bool {
    true
}

fn default_max_conflict_retries() -> u32 {
    5
}

fn default_slug_fallback() -> String {
    "recipe".to_string()
}

fn default_service_name() -> String {
    "recipe-hub".to_string()
}

fn default_json_logging() -> bool {
    false
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            timeout_seconds: default_db_timeout(),
            run_migrations: default_run_migrations(),
        }
    }
}

impl DatabaseSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

impl Default for SlugConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: default_max_conflict_retries(),
            fallback: default_slug_fallback(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            json_logging: default_json_logging(),
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Load configuration from configuration files and environment variables.
    ///
    /// Sources, later ones overriding earlier ones:
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/{environment}.toml (if exists, where environment is from APP_ENV)
    /// 4. Environment variables prefixed with APP_, e.g. `APP_PAGINATION__MAX_PAGE_SIZE=50`
    ///
    /// ```no_run
    /// use recipe_hub_common::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load configuration");
    /// println!("Pages hold up to {} items", config.pagination.max_page_size);
    /// ```
    pub fn load() -> Result<Self> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.database.is_configured() {
            if self.database.max_connections == 0 {
                anyhow::bail!("Database pool size must be greater than 0");
            }
            if self.database.min_connections > self.database.max_connections {
                anyhow::bail!("Database min_connections cannot exceed max_connections");
            }
            if self.database.timeout_seconds == 0 {
                anyhow::bail!("Database timeout must be greater than 0");
            }
        }

        self.pagination
            .validate()
            .map_err(|message| anyhow::anyhow!(message))?;

        if self.slug.max_conflict_retries == 0 {
            anyhow::bail!("Slug conflict retries must be greater than 0");
        }
        if crate::slug::validate_slug(&self.slug.fallback).is_err() {
            anyhow::bail!("Slug fallback '{}' is not a valid slug", self.slug.fallback);
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.telemetry.log_level.as_str()) {
            anyhow::bail!(
                "Invalid log level '{}'. Must be one of: {}",
                self.telemetry.log_level,
                valid_log_levels.join(", ")
            );
        }

        Ok(())
    }

    /// Create a development configuration with sensible defaults
    pub fn development() -> Self {
        Self {
            database: DatabaseSettings {
                url: "postgres://localhost:5432/recipe_hub_dev".to_string(),
                max_connections: 5,
                ..DatabaseSettings::default()
            },
            telemetry: TelemetryConfig {
                log_level: "debug".to_string(),
                ..TelemetryConfig::default()
            },
            ..Self::default()
        }
    }
}
