//! Eager loading of related entities.
//!
//! Each entity type names its loadable relations in its `Relation` enum and
//! implements [`Hydrate`] to fill the matching `#[serde(skip)]` fields. Related
//! rows go through the same not-deleted filtering as any other read, so a
//! soft-deleted author or tag is simply missing from the result.

use crate::repository::{active_rows, fetch_active, guard};
use crate::store::DocumentStore;
use crate::Result;
use async_trait::async_trait;
use futures::TryStreamExt;
use recipe_hub_domain::{
    combine, Category, CategoryId, CategoryRelation, Entity, Favorite, FavoriteRelation, Predicate,
    Recipe, RecipeId, RecipeRelation, Review, ReviewRelation, Tag, TagId, TagRelation, User,
    UserId, UserRelation,
};
use std::collections::{BTreeSet, HashMap, HashSet};
use tokio_util::sync::CancellationToken;

/// Read access used while loading relations.
pub struct RelatedReader<'a> {
    store: &'a dyn DocumentStore,
    cancel: &'a CancellationToken,
}

impl<'a> RelatedReader<'a> {
    pub fn new(store: &'a dyn DocumentStore, cancel: &'a CancellationToken) -> Self {
        Self { store, cancel }
    }

    /// Visible entities with the given ids; missing or deleted ones are left out
    pub async fn by_ids<U: Entity>(&self, ids: Vec<U::Id>) -> Result<HashMap<U::Id, U>> {
        let wanted: BTreeSet<U::Id> = ids.into_iter().collect();
        let mut found = HashMap::with_capacity(wanted.len());
        for id in wanted {
            if let Some(entity) = guard(self.cancel, fetch_active::<U>(self.store, id)).await? {
                found.insert(id, entity);
            }
        }
        Ok(found)
    }

    /// Visible entities matching `predicate`, in `(created_at, id)` order
    pub async fn matching<U: Entity>(&self, predicate: Predicate<U>) -> Result<Vec<U>> {
        let filter = combine(Predicate::not_deleted(), Some(predicate));
        guard(self.cancel, active_rows(self.store, filter).try_collect()).await
    }
}

/// Fills relation fields of already loaded entities.
#[async_trait]
pub trait Hydrate: Entity {
    async fn hydrate(
        items: &mut [Self],
        relation: Self::Relation,
        reader: &RelatedReader<'_>,
    ) -> Result<()>;
}

fn group_by<K, V, F>(values: Vec<V>, key: F) -> HashMap<K, Vec<V>>
where
    K: std::hash::Hash + Eq,
    F: Fn(&V) -> K,
{
    let mut grouped: HashMap<K, Vec<V>> = HashMap::new();
    for value in values {
        grouped.entry(key(&value)).or_default().push(value);
    }
    grouped
}

#[async_trait]
impl Hydrate for Recipe {
    async fn hydrate(
        items: &mut [Recipe],
        relation: RecipeRelation,
        reader: &RelatedReader<'_>,
    ) -> Result<()> {
        match relation {
            RecipeRelation::Author => {
                let ids = items.iter().map(|r| r.user_id).collect();
                let users = reader.by_ids::<User>(ids).await?;
                for recipe in items.iter_mut() {
                    recipe.author = users.get(&recipe.user_id).cloned();
                }
            }
            RecipeRelation::Category => {
                let ids = items.iter().filter_map(|r| r.category_id).collect();
                let categories = reader.by_ids::<Category>(ids).await?;
                for recipe in items.iter_mut() {
                    recipe.category = recipe
                        .category_id
                        .and_then(|id| categories.get(&id).cloned());
                }
            }
            RecipeRelation::Tags => {
                let ids = items
                    .iter()
                    .flat_map(|r| r.tag_ids.iter().copied())
                    .collect();
                let tags = reader.by_ids::<Tag>(ids).await?;
                for recipe in items.iter_mut() {
                    recipe.tags = recipe
                        .tag_ids
                        .iter()
                        .filter_map(|id| tags.get(id).cloned())
                        .collect();
                }
            }
            RecipeRelation::Reviews => {
                let ids: HashSet<RecipeId> = items.iter().map(|r| r.id).collect();
                let reviews = reader
                    .matching(Predicate::new(move |r: &Review| ids.contains(&r.recipe_id)))
                    .await?;
                let mut grouped = group_by(reviews, |r| r.recipe_id);
                for recipe in items.iter_mut() {
                    recipe.reviews = grouped.remove(&recipe.id).unwrap_or_default();
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Hydrate for Category {
    async fn hydrate(
        items: &mut [Category],
        relation: CategoryRelation,
        reader: &RelatedReader<'_>,
    ) -> Result<()> {
        match relation {
            CategoryRelation::Recipes => {
                let ids: HashSet<CategoryId> = items.iter().map(|c| c.id).collect();
                let recipes = reader
                    .matching(Predicate::new(move |r: &Recipe| {
                        r.category_id.is_some_and(|id| ids.contains(&id))
                    }))
                    .await?;
                let mut grouped: HashMap<Option<CategoryId>, Vec<Recipe>> =
                    group_by(recipes, |r| r.category_id);
                for category in items.iter_mut() {
                    category.recipes = grouped.remove(&Some(category.id)).unwrap_or_default();
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Hydrate for Tag {
    async fn hydrate(items: &mut [Tag], relation: TagRelation, reader: &RelatedReader<'_>) -> Result<()> {
        match relation {
            TagRelation::Recipes => {
                let ids: HashSet<TagId> = items.iter().map(|t| t.id).collect();
                let recipes = reader
                    .matching(Predicate::new(move |r: &Recipe| {
                        r.tag_ids.iter().any(|id| ids.contains(id))
                    }))
                    .await?;
                for tag in items.iter_mut() {
                    tag.recipes = recipes.iter().filter(|r| r.has_tag(tag.id)).cloned().collect();
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Hydrate for User {
    async fn hydrate(items: &mut [User], relation: UserRelation, reader: &RelatedReader<'_>) -> Result<()> {
        let ids: HashSet<UserId> = items.iter().map(|u| u.id).collect();
        match relation {
            UserRelation::Recipes => {
                let recipes = reader
                    .matching(Predicate::new(move |r: &Recipe| ids.contains(&r.user_id)))
                    .await?;
                let mut grouped = group_by(recipes, |r| r.user_id);
                for user in items.iter_mut() {
                    user.recipes = grouped.remove(&user.id).unwrap_or_default();
                }
            }
            UserRelation::Reviews => {
                let reviews = reader
                    .matching(Predicate::new(move |r: &Review| ids.contains(&r.user_id)))
                    .await?;
                let mut grouped = group_by(reviews, |r| r.user_id);
                for user in items.iter_mut() {
                    user.reviews = grouped.remove(&user.id).unwrap_or_default();
                }
            }
            UserRelation::Favorites => {
                let favorites = reader
                    .matching(Predicate::new(move |f: &Favorite| ids.contains(&f.user_id)))
                    .await?;
                let mut grouped = group_by(favorites, |f| f.user_id);
                for user in items.iter_mut() {
                    user.favorites = grouped.remove(&user.id).unwrap_or_default();
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Hydrate for Review {
    async fn hydrate(
        items: &mut [Review],
        relation: ReviewRelation,
        reader: &RelatedReader<'_>,
    ) -> Result<()> {
        match relation {
            ReviewRelation::Author => {
                let ids = items.iter().map(|r| r.user_id).collect();
                let users = reader.by_ids::<User>(ids).await?;
                for review in items.iter_mut() {
                    review.author = users.get(&review.user_id).cloned();
                }
            }
            ReviewRelation::Recipe => {
                let ids = items.iter().map(|r| r.recipe_id).collect();
                let recipes = reader.by_ids::<Recipe>(ids).await?;
                for review in items.iter_mut() {
                    review.recipe = recipes.get(&review.recipe_id).cloned().map(Box::new);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Hydrate for Favorite {
    async fn hydrate(
        items: &mut [Favorite],
        relation: FavoriteRelation,
        reader: &RelatedReader<'_>,
    ) -> Result<()> {
        match relation {
            FavoriteRelation::Recipe => {
                let ids = items.iter().map(|f| f.recipe_id).collect();
                let mut recipes: Vec<Recipe> = reader
                    .by_ids::<Recipe>(ids)
                    .await?
                    .into_values()
                    .collect();
                Recipe::hydrate(&mut recipes, RecipeRelation::Author, reader).await?;
                Recipe::hydrate(&mut recipes, RecipeRelation::Category, reader).await?;

                let recipes: HashMap<RecipeId, Recipe> =
                    recipes.into_iter().map(|r| (r.id, r)).collect();
                for favorite in items.iter_mut() {
                    favorite.recipe = recipes.get(&favorite.recipe_id).cloned();
                }
            }
        }
        Ok(())
    }
}
