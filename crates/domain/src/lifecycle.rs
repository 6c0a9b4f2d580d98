//! Lifecycle contract shared by every persisted entity.
//!
//! Each entity carries a [`Lifecycle`] holding its audit timestamps and soft-delete
//! state. Nothing is ever physically removed: deleting an entity flips
//! `is_deleted` and records `deleted_at`, and all read paths filter such rows out.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt::{Debug, Display};
use std::hash::Hash;
use uuid::Uuid;

/// Identifier of a persisted entity.
pub trait EntityId:
    Copy + Eq + Ord + Hash + Debug + Display + From<Uuid> + Into<Uuid> + Send + Sync + 'static
{
    /// The raw UUID behind this id
    fn to_uuid(self) -> Uuid {
        self.into()
    }
}

/// Audit and soft-delete state.
///
/// `deleted_at` is set if and only if `is_deleted` is true. The fields are private
/// so the pair can only change through [`Lifecycle::mark_deleted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifecycle {
    created_at: DateTime<Utc>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    is_deleted: bool,
    #[serde(default)]
    deleted_at: Option<DateTime<Utc>>,
}

impl Lifecycle {
    /// Lifecycle of an entity created at `now`
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            updated_at: None,
            is_deleted: false,
            deleted_at: None,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    /// True while the entity has not been soft-deleted
    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }

    /// Flag the entity as deleted.
    ///
    /// Idempotent: the first call wins and later calls keep the original
    /// `deleted_at`. Returns `true` when the state actually changed.
    pub fn mark_deleted(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_deleted {
            return false;
        }
        self.is_deleted = true;
        self.deleted_at = Some(now);
        true
    }

    /// Record a modification at `now`. `updated_at` never moves backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        match self.updated_at {
            Some(previous) if previous >= now => {}
            _ => self.updated_at = Some(now),
        }
    }

    /// Whether the deleted flag and timestamp agree
    pub fn is_consistent(&self) -> bool {
        self.is_deleted == self.deleted_at.is_some()
    }
}

/// A named relation that can be eagerly loaded alongside an entity.
pub trait RelationKind: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    /// Stable name, used in logs
    fn name(&self) -> &'static str;
}

/// Relation set of entities that have nothing to include.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoRelation {}

impl RelationKind for NoRelation {
    fn name(&self) -> &'static str {
        match *self {}
    }
}

/// A value that must be unique among the non-deleted rows of an entity's table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UniqueKey {
    pub name: &'static str,
    pub value: String,
}

impl UniqueKey {
    pub fn new(name: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

/// A persisted entity.
pub trait Entity: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Logical table the entity is stored in
    const TABLE: &'static str;

    type Id: EntityId;

    /// Relations that can be requested when reading this entity
    type Relation: RelationKind;

    fn id(&self) -> Self::Id;

    fn lifecycle(&self) -> &Lifecycle;

    fn lifecycle_mut(&mut self) -> &mut Lifecycle;

    /// Keys the store keeps unique among non-deleted rows
    fn unique_keys(&self) -> Vec<UniqueKey> {
        Vec::new()
    }

    fn is_deleted(&self) -> bool {
        self.lifecycle().is_deleted()
    }
}

/// Entities addressable by a URL slug.
pub trait Sluggable: Entity {
    fn slug(&self) -> &str;
}
