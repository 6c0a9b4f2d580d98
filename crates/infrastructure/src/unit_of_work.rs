//! Unit of work: staged changes across entity types, committed in one batch.

use crate::lifecycle::{LifecycleEnforcer, LifecycleReport};
use crate::repository::Repository;
use crate::store::{DocumentStore, RowWrite, StoredRow, WriteBatch, WriteKind};
use crate::{Error, Result};
use indexmap::map::Entry as MapEntry;
use indexmap::IndexMap;
use recipe_hub_common::{Clock, PaginationConfig};
use recipe_hub_domain::{Entity, EntityId, Lifecycle};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// What a save should do with a staged entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Added,
    Modified,
    Deleted,
}

/// Type-erased view of a staged entity.
pub trait TrackedEntity: Send + Sync + fmt::Debug {
    fn table(&self) -> &'static str;
    fn audit(&self) -> &Lifecycle;
    fn audit_mut(&mut self) -> &mut Lifecycle;
    fn to_write(&self, kind: WriteKind) -> Result<RowWrite>;
    fn as_any(&self) -> &dyn Any;
}

impl<T: Entity> TrackedEntity for T {
    fn table(&self) -> &'static str {
        T::TABLE
    }

    fn audit(&self) -> &Lifecycle {
        self.lifecycle()
    }

    fn audit_mut(&mut self) -> &mut Lifecycle {
        self.lifecycle_mut()
    }

    fn to_write(&self, kind: WriteKind) -> Result<RowWrite> {
        Ok(RowWrite {
            table: T::TABLE,
            kind,
            row: StoredRow::encode(self)?,
            unique_keys: self.unique_keys(),
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct StagedEntry {
    state: EntryState,
    /// Whether the row already exists in the store
    persisted: bool,
    entity: Box<dyn TrackedEntity>,
}

impl StagedEntry {
    pub fn state(&self) -> EntryState {
        self.state
    }

    pub fn set_state(&mut self, state: EntryState) {
        self.state = state;
    }

    pub fn entity(&self) -> &dyn TrackedEntity {
        self.entity.as_ref()
    }

    pub fn entity_mut(&mut self) -> &mut dyn TrackedEntity {
        self.entity.as_mut()
    }
}

/// Pending changes keyed by `(table, id)`, kept in staging order.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    entries: IndexMap<(&'static str, Uuid), StagedEntry>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stage a new entity
    pub fn add<T: Entity>(&mut self, entity: T) {
        self.stage(entity, EntryState::Added);
    }

    /// Stage an existing entity for update. An entity still pending insertion
    /// stays Added and just takes the new value.
    pub fn update<T: Entity>(&mut self, entity: T) {
        self.stage(entity, EntryState::Modified);
    }

    /// Stage an entity for (soft) deletion. Removing an entity that was only
    /// staged for insertion drops it instead.
    pub fn remove<T: Entity>(&mut self, entity: T) {
        let key = (T::TABLE, entity.id().to_uuid());
        let unsaved = self.entries.get(&key).is_some_and(|entry| !entry.persisted);
        if unsaved {
            self.entries.shift_remove(&key);
        } else {
            self.stage(entity, EntryState::Deleted);
        }
    }

    fn stage<T: Entity>(&mut self, entity: T, state: EntryState) {
        let key = (T::TABLE, entity.id().to_uuid());
        let entity: Box<dyn TrackedEntity> = Box::new(entity);

        match self.entries.entry(key) {
            MapEntry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if entry.persisted {
                    entry.state = state;
                }
                entry.entity = entity;
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(StagedEntry {
                    state,
                    persisted: state != EntryState::Added,
                    entity,
                });
            }
        }
    }

    /// The staged value of an entity, if any
    pub fn get<T: Entity>(&self, id: T::Id) -> Option<&T> {
        self.entries
            .get(&(T::TABLE, id.to_uuid()))
            .and_then(|entry| entry.entity.as_any().downcast_ref::<T>())
    }

    pub fn state_of<T: Entity>(&self, id: T::Id) -> Option<EntryState> {
        self.entries
            .get(&(T::TABLE, id.to_uuid()))
            .map(|entry| entry.state)
    }

    pub fn entries_mut(&mut self) -> impl Iterator<Item = &mut StagedEntry> {
        self.entries.values_mut()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn to_batch(&self) -> Result<WriteBatch> {
        let mut batch = WriteBatch::new();
        for entry in self.entries.values() {
            let kind = match entry.state {
                EntryState::Added => WriteKind::Insert,
                EntryState::Modified => WriteKind::Update,
                EntryState::Deleted => {
                    return Err(Error::Constraint(format!(
                        "{} entry reached the store without the lifecycle pass",
                        entry.entity.table()
                    )))
                }
            };
            batch.push(entry.entity.to_write(kind)?);
        }
        Ok(batch)
    }
}

/// Request-scoped set of pending changes over one store.
///
/// Reads go straight to the store; `add`, `update`, `remove` and soft deletes
/// are staged here and become visible to others only after [`UnitOfWork::save`].
pub struct UnitOfWork {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    pagination: PaginationConfig,
    cancel: CancellationToken,
    tracker: ChangeTracker,
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("staged", &self.tracker.len())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl UnitOfWork {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        pagination: PaginationConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            clock,
            pagination,
            cancel,
            tracker: ChangeTracker::new(),
        }
    }

    /// Repository for `T` bound to this unit of work
    pub fn repository<T: Entity>(&mut self) -> Repository<'_, T> {
        Repository::new(
            self.store.as_ref(),
            self.clock.as_ref(),
            self.pagination,
            &self.cancel,
            &mut self.tracker,
        )
    }

    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    pub fn has_changes(&self) -> bool {
        !self.tracker.is_empty()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Drop every staged change
    pub fn discard(&mut self) {
        if self.has_changes() {
            warn!(staged = self.tracker.len(), "discarding staged changes");
        }
        self.tracker.clear();
    }

    /// Run the lifecycle pass over everything staged and commit it atomically.
    ///
    /// On success the staged set is cleared. On failure nothing was written and
    /// the staged set is kept, so the caller can retry or [`discard`](Self::discard).
    #[instrument(skip(self), fields(staged = self.tracker.len()))]
    pub async fn save(&mut self) -> Result<u64> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if self.tracker.is_empty() {
            return Ok(0);
        }

        let now = self.clock.now();
        let report: LifecycleReport = LifecycleEnforcer::apply(&mut self.tracker, now);
        let batch = self.tracker.to_batch()?;

        match self.store.commit(batch, &self.cancel).await {
            Ok(written) => {
                self.tracker.clear();
                info!(
                    written,
                    soft_deleted = report.soft_deleted,
                    touched = report.touched,
                    "unit of work saved"
                );
                Ok(written)
            }
            Err(e) => {
                warn!(error = %e, "unit of work save failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use recipe_hub_domain::{Tag, TagId};

    fn tag(name: &str) -> Tag {
        Tag::new(TagId::new(), name, Utc::now())
    }

    #[test]
    fn test_update_of_added_entity_stays_added() {
        let mut tracker = ChangeTracker::new();
        let mut t = tag("doce");
        tracker.add(t.clone());
        t.name = "salgado".into();
        tracker.update(t.clone());

        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.state_of::<Tag>(t.id), Some(EntryState::Added));
        assert_eq!(tracker.get::<Tag>(t.id).unwrap().name, "salgado");
    }

    #[test]
    fn test_removing_an_unsaved_entity_unstages_it() {
        let mut tracker = ChangeTracker::new();
        let t = tag("doce");
        tracker.add(t.clone());
        tracker.remove(t);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_remove_after_update_becomes_deleted() {
        let mut tracker = ChangeTracker::new();
        let t = tag("doce");
        tracker.update(t.clone());
        tracker.remove(t.clone());
        assert_eq!(tracker.state_of::<Tag>(t.id), Some(EntryState::Deleted));
    }

    #[test]
    fn test_deleted_entries_never_reach_the_batch() {
        let mut tracker = ChangeTracker::new();
        tracker.remove(tag("doce"));
        assert!(matches!(tracker.to_batch(), Err(Error::Constraint(_))));
    }
}
