//! Infrastructure layer for RecipeHub
//!
//! Persistence for every entity type, built from:
//! - [`store`]: document stores holding entity rows (in-memory and PostgreSQL)
//! - [`repository`]: the generic, soft-delete aware repository
//! - [`unit_of_work`]: staged changes committed atomically
//! - [`lifecycle`]: the timestamp and soft-delete pass run on every save
//! - [`include`]: eager loading of related entities
//! - [`slug`]: collision-free recipe slugs
//!
//! ## Usage
//!
//! ```rust,ignore
//! use recipe_hub_infrastructure::{Persistence, PgDocumentStore, DatabaseConfig, DatabasePool};
//!
//! let pool = DatabasePool::new(&DatabaseConfig::from_env()?).await?;
//! let store = PgDocumentStore::new(pool.pool().clone());
//! store.migrate().await?;
//!
//! let persistence = Persistence::new(Arc::new(store), Arc::new(SystemClock), PaginationConfig::default());
//! let mut uow = persistence.begin(cancel.child_token());
//! let recipes = uow.repository::<Recipe>().get_all().await?;
//! ```

pub mod database;
pub mod include;
pub mod lifecycle;
pub mod repository;
pub mod slug;
pub mod store;
pub mod unit_of_work;

use recipe_hub_common::{Clock, PaginationConfig};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub use database::{DatabaseConfig, DatabasePool, TransactionExt};
pub use include::{Hydrate, RelatedReader};
pub use lifecycle::{LifecycleEnforcer, LifecycleReport};
pub use repository::Repository;
pub use slug::{ResolvedSlug, SlugResolver};
pub use store::{
    DocumentStore, MemoryStore, PgDocumentStore, RowStream, RowWrite, StoredRow, Visibility,
    WriteBatch, WriteKind,
};
pub use unit_of_work::{ChangeTracker, EntryState, UnitOfWork};

pub type Result<T> = std::result::Result<T, Error>;

/// Infrastructure-level errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database errors from sqlx
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A unique key is already held by another non-deleted row
    #[error("Unique constraint violated: {table}.{key} = '{value}'")]
    UniqueViolation {
        table: String,
        key: String,
        value: String,
    },

    /// Any other integrity constraint reported by the store
    #[error("Constraint violated: {0}")]
    Constraint(String),

    /// Resource not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// The caller's cancellation token fired
    #[error("Operation cancelled")]
    Cancelled,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Connection errors
    #[error("Connection error: {0}")]
    Connection(String),
}

impl Error {
    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Database(e) => !matches!(e, sqlx::Error::Database(_) | sqlx::Error::RowNotFound),
            Error::Connection(_) => true,
            _ => false,
        }
    }

    /// True for a unique violation on exactly this table and key
    pub fn is_unique_violation(&self, table: &str, key: &str) -> bool {
        matches!(self, Error::UniqueViolation { table: t, key: k, .. } if t == table && k == key)
    }
}

/// Entry point to persistence: one shared store, one clock, page bounds.
///
/// Cheap to clone. Each request calls [`Persistence::begin`] to get its own
/// unit of work.
#[derive(Debug, Clone)]
pub struct Persistence {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    pagination: PaginationConfig,
}

impl Persistence {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        pagination: PaginationConfig,
    ) -> Self {
        Self {
            store,
            clock,
            pagination,
        }
    }

    /// In-memory persistence, mainly for tests and local runs
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self::new(Arc::new(MemoryStore::new()), clock, PaginationConfig::default())
    }

    /// Start a unit of work bound to `cancel`
    pub fn begin(&self, cancel: CancellationToken) -> UnitOfWork {
        UnitOfWork::new(
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            self.pagination,
            cancel,
        )
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn pagination(&self) -> &PaginationConfig {
        &self.pagination
    }
}
