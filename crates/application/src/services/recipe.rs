//! Recipe Service
//!
//! Filtered and sorted listings, and create/update with slug assignment and
//! tag resolution by name.

use super::search_term;
use crate::{ApplicationError, ApplicationResult};
use chrono::{DateTime, Utc};
use recipe_hub_common::{Clock, PaginatedResult, PaginationRequest, SlugConfig, SortDirection};
use recipe_hub_domain::{
    Category, CategoryId, Comparator, Difficulty, Entity, Predicate, PredicateBuilder, Recipe,
    RecipeDraft, RecipeId, RecipeRelation, Tag, TagId, User, UserId,
};
use recipe_hub_infrastructure::{
    Error as StorageError, Persistence, ResolvedSlug, SlugResolver, UnitOfWork,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

const LIST_INCLUDES: &[RecipeRelation] = &[RecipeRelation::Author, RecipeRelation::Category];
const DETAIL_INCLUDES: &[RecipeRelation] = &[
    RecipeRelation::Author,
    RecipeRelation::Category,
    RecipeRelation::Tags,
    RecipeRelation::Reviews,
];

/// Sort key for recipe listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipeSort {
    #[default]
    CreatedAt,
    Title,
    PrepTime,
    Servings,
}

impl FromStr for RecipeSort {
    type Err = ApplicationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "createdat" | "created_at" => Ok(RecipeSort::CreatedAt),
            "title" => Ok(RecipeSort::Title),
            "preptime" | "prep_time" => Ok(RecipeSort::PrepTime),
            "servings" => Ok(RecipeSort::Servings),
            other => Err(ApplicationError::InvalidInput(format!(
                "unknown recipe sort '{other}'"
            ))),
        }
    }
}

/// Listing criteria. Every set field narrows the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipeFilter {
    /// Case-insensitive match on title or description
    pub search: Option<String>,
    pub category_id: Option<CategoryId>,
    pub user_id: Option<UserId>,
    pub is_published: Option<bool>,
    pub difficulty: Option<Difficulty>,
    /// Recipes without a prep time never match
    pub max_prep_time: Option<u32>,
    pub min_servings: Option<u32>,
    pub max_servings: Option<u32>,
    /// Tag names; a recipe matches when it carries any of them
    pub tags: Vec<String>,
    pub sort_by: RecipeSort,
    pub direction: SortDirection,
    #[serde(flatten)]
    pub page: PaginationRequest,
}

impl Default for RecipeFilter {
    /// Everything, newest first
    fn default() -> Self {
        Self {
            search: None,
            category_id: None,
            user_id: None,
            is_published: None,
            difficulty: None,
            max_prep_time: None,
            min_servings: None,
            max_servings: None,
            tags: Vec::new(),
            sort_by: RecipeSort::CreatedAt,
            direction: SortDirection::Desc,
            page: PaginationRequest::default(),
        }
    }
}

impl RecipeFilter {
    pub fn paged(page: PaginationRequest) -> Self {
        Self {
            page,
            ..Self::default()
        }
    }

    /// The filter as a predicate. `tag_ids` are the ids of the requested tag
    /// names that exist; `None` means no tag restriction.
    pub fn predicate(&self, tag_ids: Option<HashSet<TagId>>) -> Predicate<Recipe> {
        PredicateBuilder::<Recipe>::new()
            .when_some(search_term(self.search.as_deref()), |term| {
                Predicate::new(move |r: &Recipe| {
                    r.title.to_lowercase().contains(&term)
                        || r
                            .description
                            .as_deref()
                            .is_some_and(|d| d.to_lowercase().contains(&term))
                })
            })
            .when_some(self.category_id, |id| {
                Predicate::new(move |r: &Recipe| r.category_id == Some(id))
            })
            .when_some(self.user_id, |id| Predicate::new(move |r: &Recipe| r.user_id == id))
            .when_some(self.is_published, |published| {
                Predicate::new(move |r: &Recipe| r.is_published == published)
            })
            .when_some(self.difficulty, |difficulty| {
                Predicate::new(move |r: &Recipe| r.difficulty == Some(difficulty))
            })
            .when_some(self.max_prep_time, |max| {
                Predicate::new(move |r: &Recipe| r.prep_time.is_some_and(|t| t <= max))
            })
            .when_some(self.min_servings, |min| {
                Predicate::new(move |r: &Recipe| r.servings.is_some_and(|s| s >= min))
            })
            .when_some(self.max_servings, |max| {
                Predicate::new(move |r: &Recipe| r.servings.is_some_and(|s| s <= max))
            })
            .when_some(tag_ids, |ids| {
                Predicate::new(move |r: &Recipe| r.tag_ids.iter().any(|id| ids.contains(id)))
            })
            .build()
    }

    pub fn comparator(&self) -> Comparator<Recipe> {
        let order = match self.sort_by {
            RecipeSort::CreatedAt => {
                Comparator::by_key(|r: &Recipe| (r.lifecycle.created_at(), r.id))
            }
            RecipeSort::Title => Comparator::by_key(|r: &Recipe| r.title.to_lowercase()),
            RecipeSort::PrepTime => Comparator::by_key(|r: &Recipe| r.prep_time),
            RecipeSort::Servings => Comparator::by_key(|r: &Recipe| r.servings),
        };
        order.direction(self.direction.is_descending())
    }
}

/// What a save loop writes: a fresh recipe or a revision of a stored one.
enum Target {
    New { id: RecipeId, user_id: UserId },
    Existing(Recipe),
}

#[derive(Debug, Clone)]
pub struct RecipeService {
    persistence: Persistence,
    slugs: SlugResolver,
    max_conflict_retries: u32,
}

impl RecipeService {
    pub fn new(persistence: Persistence, config: &SlugConfig) -> Self {
        Self {
            persistence,
            slugs: SlugResolver::new(config.fallback.clone()),
            max_conflict_retries: config.max_conflict_retries,
        }
    }

    /// Filtered, sorted page with author and category loaded
    #[instrument(skip(self, filter, cancel))]
    pub async fn list(
        &self,
        filter: &RecipeFilter,
        cancel: &CancellationToken,
    ) -> ApplicationResult<PaginatedResult<Recipe>> {
        let mut uow = self.persistence.begin(cancel.clone());

        let tag_ids = if filter.tags.is_empty() {
            None
        } else {
            let ids = existing_tag_ids(&mut uow, &filter.tags).await?;
            if ids.is_empty() {
                debug!(tags = ?filter.tags, "no stored tag matches the filter");
                let window = filter.page.normalize(self.persistence.pagination());
                return Ok(PaginatedResult::empty(window));
            }
            Some(ids)
        };

        let page = uow
            .repository::<Recipe>()
            .page_with(
                &filter.page,
                Some(filter.predicate(tag_ids)),
                Some(&filter.comparator()),
                LIST_INCLUDES,
            )
            .await?;
        Ok(page)
    }

    pub async fn search(
        &self,
        term: &str,
        page: PaginationRequest,
        cancel: &CancellationToken,
    ) -> ApplicationResult<PaginatedResult<Recipe>> {
        let filter = RecipeFilter {
            search: Some(term.to_string()),
            ..RecipeFilter::paged(page)
        };
        self.list(&filter, cancel).await
    }

    pub async fn by_category(
        &self,
        category_id: CategoryId,
        page: PaginationRequest,
        cancel: &CancellationToken,
    ) -> ApplicationResult<PaginatedResult<Recipe>> {
        let filter = RecipeFilter {
            category_id: Some(category_id),
            ..RecipeFilter::paged(page)
        };
        self.list(&filter, cancel).await
    }

    pub async fn by_user(
        &self,
        user_id: UserId,
        page: PaginationRequest,
        cancel: &CancellationToken,
    ) -> ApplicationResult<PaginatedResult<Recipe>> {
        let filter = RecipeFilter {
            user_id: Some(user_id),
            ..RecipeFilter::paged(page)
        };
        self.list(&filter, cancel).await
    }

    pub async fn published(
        &self,
        page: PaginationRequest,
        cancel: &CancellationToken,
    ) -> ApplicationResult<PaginatedResult<Recipe>> {
        let filter = RecipeFilter {
            is_published: Some(true),
            ..RecipeFilter::paged(page)
        };
        self.list(&filter, cancel).await
    }

    /// Recipe with author, category, tags and reviews
    #[instrument(skip(self, cancel))]
    pub async fn get_by_id(
        &self,
        id: RecipeId,
        cancel: &CancellationToken,
    ) -> ApplicationResult<Option<Recipe>> {
        let mut uow = self.persistence.begin(cancel.clone());
        Ok(uow
            .repository::<Recipe>()
            .get_by_id_with(id, DETAIL_INCLUDES)
            .await?)
    }

    #[instrument(skip(self, cancel))]
    pub async fn get_by_slug(
        &self,
        slug: &str,
        cancel: &CancellationToken,
    ) -> ApplicationResult<Option<Recipe>> {
        let slug = slug.to_string();
        let mut uow = self.persistence.begin(cancel.clone());
        Ok(uow
            .repository::<Recipe>()
            .first_matching_with(
                Predicate::new(move |r: &Recipe| r.slug == slug),
                DETAIL_INCLUDES,
            )
            .await?)
    }

    /// Create a recipe for `user_id`. Tags are matched by name, missing ones
    /// are created in the same save.
    #[instrument(skip(self, draft, cancel), fields(user_id = %user_id))]
    pub async fn create(
        &self,
        user_id: UserId,
        draft: RecipeDraft,
        cancel: &CancellationToken,
    ) -> ApplicationResult<Recipe> {
        draft.check()?;
        let mut uow = self.persistence.begin(cancel.clone());

        if !uow.repository::<User>().exists_id(user_id).await? {
            return Err(ApplicationError::not_found("user", user_id));
        }
        ensure_category(&mut uow, draft.category_id).await?;

        let target = Target::New {
            id: RecipeId::new(),
            user_id,
        };
        let recipe = self.save_recipe(&mut uow, target, draft).await?;
        info!(recipe_id = %recipe.id, slug = %recipe.slug, "recipe created");
        Ok(recipe)
    }

    /// Replace a recipe's content; the slug follows the new title.
    /// `None` when no visible recipe has that id.
    #[instrument(skip(self, draft, cancel))]
    pub async fn update(
        &self,
        id: RecipeId,
        draft: RecipeDraft,
        cancel: &CancellationToken,
    ) -> ApplicationResult<Option<Recipe>> {
        draft.check()?;
        let mut uow = self.persistence.begin(cancel.clone());

        let Some(current) = uow.repository::<Recipe>().get_by_id(id).await? else {
            return Ok(None);
        };
        ensure_category(&mut uow, draft.category_id).await?;

        let recipe = self
            .save_recipe(&mut uow, Target::Existing(current), draft)
            .await?;
        info!(recipe_id = %recipe.id, slug = %recipe.slug, "recipe updated");
        Ok(Some(recipe))
    }

    #[instrument(skip(self, cancel))]
    pub async fn set_published(
        &self,
        id: RecipeId,
        published: bool,
        cancel: &CancellationToken,
    ) -> ApplicationResult<bool> {
        let mut uow = self.persistence.begin(cancel.clone());
        let mut repo = uow.repository::<Recipe>();
        let Some(mut recipe) = repo.get_by_id(id).await? else {
            return Ok(false);
        };
        recipe.is_published = published;
        repo.update(recipe);
        uow.save().await?;
        Ok(true)
    }

    /// Soft delete. `false` when no visible recipe has that id.
    #[instrument(skip(self, cancel))]
    pub async fn delete(&self, id: RecipeId, cancel: &CancellationToken) -> ApplicationResult<bool> {
        let mut uow = self.persistence.begin(cancel.clone());
        let deleted = uow.repository::<Recipe>().soft_delete_by_id(id).await?;
        if deleted {
            uow.save().await?;
            info!(recipe_id = %id, "recipe deleted");
        }
        Ok(deleted)
    }

    pub async fn count(&self, cancel: &CancellationToken) -> ApplicationResult<u64> {
        let mut uow = self.persistence.begin(cancel.clone());
        Ok(uow.repository::<Recipe>().count().await?)
    }

    pub async fn count_published(&self, cancel: &CancellationToken) -> ApplicationResult<u64> {
        let mut uow = self.persistence.begin(cancel.clone());
        Ok(uow
            .repository::<Recipe>()
            .count_matching(Predicate::new(|r: &Recipe| r.is_published))
            .await?)
    }

    pub async fn count_by_user(
        &self,
        user_id: UserId,
        cancel: &CancellationToken,
    ) -> ApplicationResult<u64> {
        let mut uow = self.persistence.begin(cancel.clone());
        Ok(uow
            .repository::<Recipe>()
            .count_matching(Predicate::new(move |r: &Recipe| r.user_id == user_id))
            .await?)
    }

    /// Resolve tags and slug, stage the recipe and save. A save that loses a
    /// race on the slug or on a new tag name is retried with fresh lookups,
    /// the slug probe resuming after the suffix that was taken.
    async fn save_recipe(
        &self,
        uow: &mut UnitOfWork,
        target: Target,
        draft: RecipeDraft,
    ) -> ApplicationResult<Recipe> {
        let exclude = match &target {
            Target::New { .. } => None,
            Target::Existing(recipe) => Some(recipe.id),
        };
        let mut previous: Option<ResolvedSlug> = None;
        let mut retries = 0u32;

        loop {
            let now = self.persistence.clock().now();
            let tag_ids = resolve_tag_ids(uow, &draft.tags, now).await?;

            let slug = {
                let repo = uow.repository::<Recipe>();
                match &previous {
                    Some(taken) => {
                        self.slugs
                            .resolve_after(&repo, &draft.title, exclude, taken)
                            .await?
                    }
                    None => self.slugs.resolve(&repo, &draft.title, exclude).await?,
                }
            };

            let recipe = match &target {
                Target::New { id, user_id } => {
                    Recipe::create(*id, *user_id, draft.clone(), slug.slug.clone(), tag_ids, now)
                }
                Target::Existing(current) => {
                    let mut recipe = current.clone();
                    recipe.revise(draft.clone(), slug.slug.clone(), tag_ids);
                    recipe
                }
            };

            {
                let mut repo = uow.repository::<Recipe>();
                match &target {
                    Target::New { .. } => repo.add(recipe.clone()),
                    Target::Existing(_) => repo.update(recipe.clone()),
                }
            }

            match uow.save().await {
                Ok(_) => return Ok(recipe),
                Err(err) if retries < self.max_conflict_retries && lost_race(&err) => {
                    retries += 1;
                    warn!(error = %err, retry = retries, "save lost a uniqueness race, retrying");
                    uow.discard();
                    if err.is_unique_violation(Recipe::TABLE, "slug") {
                        previous = Some(slug);
                    }
                }
                Err(err) => {
                    uow.discard();
                    return Err(err.into());
                }
            }
        }
    }
}

fn lost_race(err: &StorageError) -> bool {
    err.is_unique_violation(Recipe::TABLE, "slug") || err.is_unique_violation(Tag::TABLE, "name")
}

async fn ensure_category(
    uow: &mut UnitOfWork,
    category_id: Option<CategoryId>,
) -> ApplicationResult<()> {
    if let Some(id) = category_id {
        if !uow.repository::<Category>().exists_id(id).await? {
            return Err(ApplicationError::not_found("category", id));
        }
    }
    Ok(())
}

/// Ids of stored tags whose name matches one of `names`, ignoring case
async fn existing_tag_ids(
    uow: &mut UnitOfWork,
    names: &[String],
) -> Result<HashSet<TagId>, StorageError> {
    let wanted: HashSet<String> = names
        .iter()
        .map(|name| Tag::normalized_name(name))
        .filter(|name| !name.is_empty())
        .collect();
    let tags = uow
        .repository::<Tag>()
        .find(Predicate::new(move |t: &Tag| {
            wanted.contains(&Tag::normalized_name(&t.name))
        }))
        .await?;
    Ok(tags.into_iter().map(|t| t.id).collect())
}

/// Tag ids for `names` in request order, staging a new tag for each name not
/// stored yet. Blank and repeated names are dropped.
async fn resolve_tag_ids(
    uow: &mut UnitOfWork,
    names: &[String],
    now: DateTime<Utc>,
) -> Result<Vec<TagId>, StorageError> {
    let mut seen = HashSet::new();
    let requested: Vec<(String, &str)> = names
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .filter_map(|name| {
            let key = Tag::normalized_name(name);
            seen.insert(key.clone()).then_some((key, name))
        })
        .collect();
    if requested.is_empty() {
        return Ok(Vec::new());
    }

    let keys: HashSet<String> = requested.iter().map(|(key, _)| key.clone()).collect();
    let mut repo = uow.repository::<Tag>();
    let mut known: HashMap<String, TagId> = repo
        .find(Predicate::new(move |t: &Tag| {
            keys.contains(&Tag::normalized_name(&t.name))
        }))
        .await?
        .into_iter()
        .map(|t| (Tag::normalized_name(&t.name), t.id))
        .collect();

    let mut ids = Vec::with_capacity(requested.len());
    for (key, name) in requested {
        let id = match known.get(&key) {
            Some(id) => *id,
            None => {
                let tag = Tag::new(TagId::new(), name, now);
                let id = tag.id;
                debug!(tag = %tag.name, "staging new tag");
                repo.add(tag);
                known.insert(key, id);
                id
            }
        };
        ids.push(id);
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn recipe(title: &str, prep_time: Option<u32>, offset: i64) -> Recipe {
        let now = Utc.timestamp_opt(1_700_000_000 + offset, 0).unwrap();
        let draft = RecipeDraft {
            title: title.to_string(),
            prep_time,
            ..RecipeDraft::default()
        };
        Recipe::create(
            RecipeId::new(),
            UserId::new(),
            draft,
            title.to_lowercase(),
            Vec::new(),
            now,
        )
    }

    #[test]
    fn test_sort_parsing() {
        assert_eq!("prepTime".parse::<RecipeSort>().unwrap(), RecipeSort::PrepTime);
        assert_eq!("CREATEDAT".parse::<RecipeSort>().unwrap(), RecipeSort::CreatedAt);
        assert!("rating".parse::<RecipeSort>().is_err());
    }

    #[test]
    fn test_filter_predicate_combines_all_fields() {
        let quick = recipe("Salada Verde", Some(10), 0);
        let slow = recipe("Feijoada", Some(240), 1);
        let untimed = recipe("Salada de Frutas", None, 2);

        let filter = RecipeFilter {
            search: Some("salada".into()),
            max_prep_time: Some(30),
            ..RecipeFilter::default()
        };
        let predicate = filter.predicate(None);
        assert!(predicate.evaluate(&quick));
        assert!(!predicate.evaluate(&slow));
        assert!(!predicate.evaluate(&untimed));
    }

    #[test]
    fn test_tag_filter_matches_any() {
        let mut tagged = recipe("Bolo", None, 0);
        let tag = TagId::new();
        tagged.tag_ids = vec![TagId::new(), tag];
        let plain = recipe("Pão", None, 1);

        let predicate = RecipeFilter::default().predicate(Some(HashSet::from([tag])));
        assert!(predicate.evaluate(&tagged));
        assert!(!predicate.evaluate(&plain));
    }

    #[test]
    fn test_default_order_is_newest_first() {
        let older = recipe("A", None, 0);
        let newer = recipe("B", None, 10);
        let mut items = vec![older.clone(), newer.clone()];
        let order = RecipeFilter::default().comparator();
        items.sort_by(|a, b| order.compare(a, b));
        assert_eq!(items[0].id, newer.id);
    }

    #[test]
    fn test_title_order_ignores_case() {
        let filter = RecipeFilter {
            sort_by: RecipeSort::Title,
            direction: SortDirection::Asc,
            ..RecipeFilter::default()
        };
        let mut items = vec![recipe("bolo", None, 0), recipe("Arroz", None, 1)];
        let order = filter.comparator();
        items.sort_by(|a, b| order.compare(a, b));
        assert_eq!(items[0].title, "Arroz");
    }

    #[test]
    fn test_filter_from_query_parameters() {
        let filter: RecipeFilter = serde_json::from_value(serde_json::json!({
            "tags": ["doce"],
            "sort_by": "prep_time",
            "page_number": 2
        }))
        .unwrap();
        assert_eq!(filter.tags, ["doce"]);
        assert_eq!(filter.sort_by, RecipeSort::PrepTime);
        assert_eq!(filter.direction, SortDirection::Desc);
        assert_eq!(filter.page.page_number, Some(2));
        assert_eq!(filter.page.page_size, None);
    }
}
