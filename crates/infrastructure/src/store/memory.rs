//! In-memory document store.

use super::{DocumentStore, RowStream, RowWrite, StoredRow, Visibility, WriteBatch, WriteKind};
use crate::{Error, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::RwLock;
use recipe_hub_domain::UniqueKey;
use std::collections::{HashMap, HashSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use uuid::Uuid;

type KeySlot = (&'static str, &'static str, String);
type RowKey = (&'static str, Uuid);

#[derive(Debug, Default)]
struct MemoryState {
    tables: HashMap<&'static str, HashMap<Uuid, StoredRow>>,
    /// Unique keys held by non-deleted rows
    keys: HashMap<KeySlot, Uuid>,
    owned: HashMap<RowKey, Vec<UniqueKey>>,
}

impl MemoryState {
    fn contains(&self, table: &str, id: &Uuid) -> bool {
        self.tables.get(table).is_some_and(|rows| rows.contains_key(id))
    }

    /// Check a whole batch against the current state without touching it.
    ///
    /// Keys held by rows the batch rewrites count as released, so the outcome
    /// does not depend on write order within the batch.
    fn check(&self, batch: &WriteBatch) -> Result<()> {
        let mut inserted: HashSet<RowKey> = HashSet::new();
        let mut last: HashMap<RowKey, &RowWrite> = HashMap::new();

        for write in batch.iter() {
            let row_key = (write.table, write.row.id);
            let known = self.contains(write.table, &write.row.id) || inserted.contains(&row_key);
            match write.kind {
                WriteKind::Insert if known => {
                    return Err(Error::Constraint(format!(
                        "duplicate id {} in {}",
                        write.row.id, write.table
                    )));
                }
                WriteKind::Insert => {
                    inserted.insert(row_key);
                }
                WriteKind::Update if !known => {
                    return Err(Error::NotFound(format!("{}/{}", write.table, write.row.id)));
                }
                WriteKind::Update => {}
            }
            last.insert(row_key, write);
        }

        let mut claimed: HashMap<KeySlot, Uuid> = HashMap::new();
        for write in batch.iter() {
            let id = write.row.id;
            let is_final = last
                .get(&(write.table, id))
                .is_some_and(|w| std::ptr::eq(*w, write));
            if !is_final || write.row.is_deleted {
                continue;
            }
            for key in &write.unique_keys {
                let slot = (write.table, key.name, key.value.clone());
                let held_elsewhere = self
                    .keys
                    .get(&slot)
                    .is_some_and(|holder| *holder != id && !last.contains_key(&(write.table, *holder)));
                let claimed_twice = claimed.get(&slot).is_some_and(|holder| *holder != id);
                if held_elsewhere || claimed_twice {
                    return Err(Error::UniqueViolation {
                        table: write.table.to_string(),
                        key: key.name.to_string(),
                        value: key.value.clone(),
                    });
                }
                claimed.insert(slot, id);
            }
        }
        Ok(())
    }

    /// Apply a batch that passed [`MemoryState::check`].
    fn apply(&mut self, batch: WriteBatch) {
        for write in batch.writes() {
            let id = write.row.id;
            if let Some(previous) = self.owned.remove(&(write.table, id)) {
                for key in previous {
                    let slot = (write.table, key.name, key.value);
                    if self.keys.get(&slot) == Some(&id) {
                        self.keys.remove(&slot);
                    }
                }
            }

            if !write.row.is_deleted {
                for key in &write.unique_keys {
                    self.keys.insert((write.table, key.name, key.value.clone()), id);
                }
                self.owned.insert((write.table, id), write.unique_keys);
            }

            self.tables.entry(write.table).or_default().insert(id, write.row);
        }
    }
}

/// Process-local store. A commit checks the whole batch under the write lock
/// and only then applies it, so a failing batch changes nothing.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows in `table`, deleted ones included
    pub fn row_count(&self, table: &str) -> usize {
        self.state.read().tables.get(table).map_or(0, HashMap::len)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn scan(&self, table: &'static str, visibility: Visibility) -> RowStream<'_> {
        let mut rows: Vec<StoredRow> = self
            .state
            .read()
            .tables
            .get(table)
            .map(|rows| {
                rows.values()
                    .filter(|row| visibility.admits(row))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));

        stream::iter(rows.into_iter().map(Ok)).boxed()
    }

    async fn fetch(&self, table: &'static str, id: Uuid) -> Result<Option<StoredRow>> {
        Ok(self
            .state
            .read()
            .tables
            .get(table)
            .and_then(|rows| rows.get(&id))
            .cloned())
    }

    #[instrument(skip(self, batch, cancel), fields(writes = batch.len()))]
    async fn commit(&self, batch: WriteBatch, cancel: &CancellationToken) -> Result<u64> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let written = batch.len() as u64;
        let mut state = self.state.write();
        state.check(&batch)?;
        state.apply(batch);

        debug!(written, "memory batch committed");
        Ok(written)
    }
}
