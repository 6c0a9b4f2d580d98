//! Generic, soft-delete aware repository.
//!
//! Every read composes `Predicate::not_deleted()` with the caller's predicate
//! before evaluating it, so soft-deleted rows never come back through this API.
//! Writes are only staged; they reach the store when the owning unit of work
//! is saved.

use crate::include::{Hydrate, RelatedReader};
use crate::store::{DocumentStore, Visibility};
use crate::unit_of_work::ChangeTracker;
use crate::{Error, Result};
use futures::{future, Stream, TryStreamExt};
use recipe_hub_common::{Clock, PaginatedResult, PaginationConfig, PaginationRequest};
use recipe_hub_domain::{combine, Comparator, Entity, EntityId, Predicate};
use std::future::Future;
use std::marker::PhantomData;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Run `work` unless `cancel` fires first.
pub(crate) async fn guard<F, R>(cancel: &CancellationToken, work: F) -> Result<R>
where
    F: Future<Output = Result<R>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = work => result,
    }
}

/// Decoded rows of `T` that are not deleted and satisfy `filter`, in store order.
pub(crate) fn active_rows<'s, T: Entity>(
    store: &'s dyn DocumentStore,
    filter: Predicate<T>,
) -> impl Stream<Item = Result<T>> + Send + 's {
    store
        .scan(T::TABLE, Visibility::Active)
        .and_then(|row| future::ready(row.decode::<T>()))
        .try_filter(move |entity| future::ready(filter.evaluate(entity)))
}

/// Point lookup that treats soft-deleted rows as absent.
pub(crate) async fn fetch_active<T: Entity>(
    store: &dyn DocumentStore,
    id: T::Id,
) -> Result<Option<T>> {
    let visible = Predicate::<T>::not_deleted();
    match store.fetch(T::TABLE, id.to_uuid()).await? {
        Some(row) => {
            let entity = row.decode::<T>()?;
            Ok(visible.evaluate(&entity).then_some(entity))
        }
        None => Ok(None),
    }
}

/// Typed access to one entity table within a unit of work.
pub struct Repository<'u, T: Entity> {
    store: &'u dyn DocumentStore,
    clock: &'u dyn Clock,
    pagination: PaginationConfig,
    cancel: &'u CancellationToken,
    tracker: &'u mut ChangeTracker,
    _entity: PhantomData<fn() -> T>,
}

impl<'u, T: Entity> Repository<'u, T> {
    pub(crate) fn new(
        store: &'u dyn DocumentStore,
        clock: &'u dyn Clock,
        pagination: PaginationConfig,
        cancel: &'u CancellationToken,
        tracker: &'u mut ChangeTracker,
    ) -> Self {
        Self {
            store,
            clock,
            pagination,
            cancel,
            tracker,
            _entity: PhantomData,
        }
    }

    fn visible(predicate: Option<Predicate<T>>) -> Predicate<T> {
        combine(Predicate::not_deleted(), predicate)
    }

    #[instrument(skip(self), fields(table = T::TABLE))]
    pub async fn get_by_id(&self, id: T::Id) -> Result<Option<T>> {
        guard(self.cancel, fetch_active::<T>(self.store, id)).await
    }

    pub async fn get_all(&self) -> Result<Vec<T>> {
        self.find(Predicate::always()).await
    }

    #[instrument(skip(self, predicate), fields(table = T::TABLE))]
    pub async fn find(&self, predicate: Predicate<T>) -> Result<Vec<T>> {
        let rows = active_rows(self.store, Self::visible(Some(predicate)));
        let found: Vec<T> = guard(self.cancel, rows.try_collect()).await?;
        debug!(count = found.len(), "find completed");
        Ok(found)
    }

    /// First match in `(created_at, id)` order
    pub async fn first_matching(&self, predicate: Predicate<T>) -> Result<Option<T>> {
        let rows = active_rows(self.store, Self::visible(Some(predicate)));
        guard(self.cancel, async move {
            futures::pin_mut!(rows);
            rows.try_next().await
        })
        .await
    }

    pub async fn exists(&self, predicate: Predicate<T>) -> Result<bool> {
        Ok(self.first_matching(predicate).await?.is_some())
    }

    pub async fn exists_id(&self, id: T::Id) -> Result<bool> {
        Ok(self.get_by_id(id).await?.is_some())
    }

    pub async fn any(&self) -> Result<bool> {
        self.exists(Predicate::always()).await
    }

    pub async fn count(&self) -> Result<u64> {
        self.count_matching(Predicate::always()).await
    }

    /// Count visible rows accepted by `predicate`.
    ///
    /// Predicates are closures, so every row of the table is decoded and
    /// tested; nothing is pushed down to the store. Rows are streamed and
    /// dropped as they are counted, so memory stays flat.
    pub async fn count_matching(&self, predicate: Predicate<T>) -> Result<u64> {
        let rows = active_rows(self.store, Self::visible(Some(predicate)));
        guard(
            self.cancel,
            rows.try_fold(0u64, |count, _| future::ready(Ok(count + 1))),
        )
        .await
    }

    pub async fn page(&self, request: &PaginationRequest) -> Result<PaginatedResult<T>> {
        self.collect_page(request, None, None).await
    }

    pub async fn page_matching(
        &self,
        request: &PaginationRequest,
        predicate: Predicate<T>,
    ) -> Result<PaginatedResult<T>> {
        self.collect_page(request, Some(predicate), None).await
    }

    pub async fn page_sorted(
        &self,
        request: &PaginationRequest,
        predicate: Option<Predicate<T>>,
        order: &Comparator<T>,
    ) -> Result<PaginatedResult<T>> {
        self.collect_page(request, predicate, Some(order)).await
    }

    /// Count and slice in one pass over the matching rows. With an explicit
    /// order the matches are materialized and sorted first; the sort is stable,
    /// so ties keep `(created_at, id)` order.
    #[instrument(skip(self, predicate, order), fields(table = T::TABLE))]
    async fn collect_page(
        &self,
        request: &PaginationRequest,
        predicate: Option<Predicate<T>>,
        order: Option<&Comparator<T>>,
    ) -> Result<PaginatedResult<T>> {
        let window = request.normalize(&self.pagination);
        let skip = window.skip();
        let take = window.take() as usize;
        let rows = active_rows(self.store, Self::visible(predicate));

        let (items, total) = match order {
            None => {
                guard(
                    self.cancel,
                    rows.try_fold(
                        (Vec::with_capacity(take), 0u64),
                        move |(mut items, seen), entity| {
                            if seen >= skip && items.len() < take {
                                items.push(entity);
                            }
                            future::ready(Ok((items, seen + 1)))
                        },
                    ),
                )
                .await?
            }
            Some(order) => {
                let mut all: Vec<T> = guard(self.cancel, rows.try_collect()).await?;
                let total = all.len() as u64;
                all.sort_by(|a, b| order.compare(a, b));
                let skip = usize::try_from(skip).unwrap_or(usize::MAX);
                let items: Vec<T> = all.into_iter().skip(skip).take(take).collect();
                (items, total)
            }
        };

        debug!(
            total,
            page = window.page_number(),
            size = window.page_size(),
            "page collected"
        );
        Ok(PaginatedResult::new(items, total, window))
    }

    pub fn add(&mut self, entity: T) {
        self.tracker.add(entity);
    }

    pub fn add_range<I: IntoIterator<Item = T>>(&mut self, entities: I) {
        for entity in entities {
            self.tracker.add(entity);
        }
    }

    pub fn update(&mut self, entity: T) {
        self.tracker.update(entity);
    }

    pub fn update_range<I: IntoIterator<Item = T>>(&mut self, entities: I) {
        for entity in entities {
            self.tracker.update(entity);
        }
    }

    /// Stage a delete. The save turns it into a soft delete.
    pub fn remove(&mut self, entity: T) {
        self.tracker.remove(entity);
    }

    pub fn remove_range<I: IntoIterator<Item = T>>(&mut self, entities: I) {
        for entity in entities {
            self.tracker.remove(entity);
        }
    }

    /// Mark `entity` deleted now and stage the change.
    ///
    /// Returns `false` if it was already deleted, in which case the original
    /// `deleted_at` is kept.
    pub fn soft_delete(&mut self, entity: &mut T) -> bool {
        let changed = entity.lifecycle_mut().mark_deleted(self.clock.now());
        self.tracker.update(entity.clone());
        changed
    }

    /// Soft-delete by id. `false` when no visible entity has that id.
    pub async fn soft_delete_by_id(&mut self, id: T::Id) -> Result<bool> {
        match self.get_by_id(id).await? {
            Some(mut entity) => {
                self.soft_delete(&mut entity);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl<'u, T: Hydrate> Repository<'u, T> {
    /// Load each requested relation into `items`
    pub async fn include(&self, items: &mut [T], includes: &[T::Relation]) -> Result<()> {
        if items.is_empty() || includes.is_empty() {
            return Ok(());
        }
        let reader = RelatedReader::new(self.store, self.cancel);
        let mut loaded: Vec<T::Relation> = Vec::with_capacity(includes.len());
        for relation in includes {
            if loaded.contains(relation) {
                continue;
            }
            T::hydrate(items, *relation, &reader).await?;
            loaded.push(*relation);
        }
        Ok(())
    }

    pub async fn get_by_id_with(&self, id: T::Id, includes: &[T::Relation]) -> Result<Option<T>> {
        let Some(entity) = self.get_by_id(id).await? else {
            return Ok(None);
        };
        let mut items = vec![entity];
        self.include(&mut items, includes).await?;
        Ok(items.pop())
    }

    pub async fn get_all_with(&self, includes: &[T::Relation]) -> Result<Vec<T>> {
        self.find_with(Predicate::always(), includes).await
    }

    pub async fn find_with(&self, predicate: Predicate<T>, includes: &[T::Relation]) -> Result<Vec<T>> {
        let mut found = self.find(predicate).await?;
        self.include(&mut found, includes).await?;
        Ok(found)
    }

    pub async fn first_matching_with(
        &self,
        predicate: Predicate<T>,
        includes: &[T::Relation],
    ) -> Result<Option<T>> {
        let Some(entity) = self.first_matching(predicate).await? else {
            return Ok(None);
        };
        let mut items = vec![entity];
        self.include(&mut items, includes).await?;
        Ok(items.pop())
    }

    /// Page with optional filter and order; relations are loaded for the page only
    pub async fn page_with(
        &self,
        request: &PaginationRequest,
        predicate: Option<Predicate<T>>,
        order: Option<&Comparator<T>>,
        includes: &[T::Relation],
    ) -> Result<PaginatedResult<T>> {
        let mut page = self.collect_page(request, predicate, order).await?;
        self.include(&mut page.items, includes).await?;
        Ok(page)
    }
}
