//! Document stores.
//!
//! Every entity is persisted as one row: its id, the lifecycle columns and the
//! serialized entity. A store only knows rows and tables; typing, filtering and
//! change tracking happen in the repository and the unit of work.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgDocumentStore;

use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use recipe_hub_domain::{Entity, EntityId, UniqueKey};
use std::fmt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// One persisted entity.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub document: serde_json::Value,
}

impl StoredRow {
    pub fn encode<T: Entity>(entity: &T) -> Result<Self> {
        let lifecycle = entity.lifecycle();
        Ok(Self {
            id: entity.id().to_uuid(),
            created_at: lifecycle.created_at(),
            updated_at: lifecycle.updated_at(),
            is_deleted: lifecycle.is_deleted(),
            deleted_at: lifecycle.deleted_at(),
            document: serde_json::to_value(entity)?,
        })
    }

    pub fn decode<T: Entity>(self) -> Result<T> {
        Ok(serde_json::from_value(self.document)?)
    }
}

/// Which rows a scan returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Rows not soft-deleted
    Active,
    /// Every row, deleted ones included
    All,
}

impl Visibility {
    pub fn admits(&self, row: &StoredRow) -> bool {
        match self {
            Visibility::Active => !row.is_deleted,
            Visibility::All => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Insert,
    Update,
}

/// A row to write, with the unique keys it should hold once written.
#[derive(Debug, Clone)]
pub struct RowWrite {
    pub table: &'static str,
    pub kind: WriteKind,
    pub row: StoredRow,
    pub unique_keys: Vec<UniqueKey>,
}

/// Writes applied together or not at all, in order.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    writes: Vec<RowWrite>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, write: RowWrite) {
        self.writes.push(write);
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RowWrite> {
        self.writes.iter()
    }

    pub fn writes(self) -> impl Iterator<Item = RowWrite> {
        self.writes.into_iter()
    }
}

pub type RowStream<'a> = BoxStream<'a, Result<StoredRow>>;

/// Storage backend for entity rows.
#[async_trait]
pub trait DocumentStore: Send + Sync + fmt::Debug {
    /// Stream the rows of `table` ordered by `(created_at, id)`
    fn scan(&self, table: &'static str, visibility: Visibility) -> RowStream<'_>;

    /// Point lookup regardless of deletion state
    async fn fetch(&self, table: &'static str, id: Uuid) -> Result<Option<StoredRow>>;

    /// Apply every write atomically.
    ///
    /// Fails with `UniqueViolation` when a non-deleted row would share a unique
    /// key with another non-deleted row of the same table. Returns `Cancelled`
    /// only when nothing was written.
    async fn commit(&self, batch: WriteBatch, cancel: &CancellationToken) -> Result<u64>;
}
