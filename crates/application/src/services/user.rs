//! User Service

use super::search_term;
use crate::{ApplicationError, ApplicationResult};
use recipe_hub_common::{Clock, PaginatedResult, PaginationRequest, SortDirection};
use recipe_hub_domain::{
    Comparator, Predicate, PredicateBuilder, Recipe, User, UserDraft, UserId, UserRelation,
    UserRole,
};
use recipe_hub_infrastructure::{Persistence, Repository};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use validator::Validate;

const INCLUDES: &[UserRelation] = &[UserRelation::Recipes];
const DETAIL_INCLUDES: &[UserRelation] = &[
    UserRelation::Recipes,
    UserRelation::Favorites,
    UserRelation::Reviews,
];

/// Sort key for user listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserOrder {
    #[default]
    CreatedAt,
    FullName,
    Username,
    RecipeCount,
}

impl FromStr for UserOrder {
    type Err = ApplicationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "createdat" | "created_at" => Ok(UserOrder::CreatedAt),
            "fullname" | "full_name" => Ok(UserOrder::FullName),
            "username" => Ok(UserOrder::Username),
            "recipecount" | "recipe_count" => Ok(UserOrder::RecipeCount),
            other => Err(ApplicationError::InvalidInput(format!(
                "unknown user order '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserFilter {
    /// Case-insensitive match on username or full name
    pub search: Option<String>,
    pub role: Option<UserRole>,
    pub has_published_recipes: Option<bool>,
    pub order_by: UserOrder,
    pub direction: SortDirection,
    #[serde(flatten)]
    pub page: PaginationRequest,
}

impl Default for UserFilter {
    fn default() -> Self {
        Self {
            search: None,
            role: None,
            has_published_recipes: None,
            order_by: UserOrder::CreatedAt,
            direction: SortDirection::Desc,
            page: PaginationRequest::default(),
        }
    }
}

/// Visible recipes per author: (all, published)
type RecipeCounts = HashMap<UserId, (u64, u64)>;

impl UserFilter {
    fn needs_recipe_counts(&self) -> bool {
        self.has_published_recipes.is_some() || self.order_by == UserOrder::RecipeCount
    }

    fn predicate(&self, counts: &Arc<RecipeCounts>) -> Predicate<User> {
        PredicateBuilder::<User>::new()
            .when_some(search_term(self.search.as_deref()), |term| {
                let name_term = term.clone();
                Predicate::new(move |u: &User| u.username.to_lowercase().contains(&term)).or(
                    Predicate::new(move |u: &User| u.full_name.to_lowercase().contains(&name_term)),
                )
            })
            .when_some(self.role, |role| Predicate::new(move |u: &User| u.role == role))
            .when_some(self.has_published_recipes, |wanted| {
                let counts = Arc::clone(counts);
                Predicate::new(move |u: &User| {
                    let published = counts.get(&u.id).map_or(0, |(_, p)| *p);
                    (published > 0) == wanted
                })
            })
            .build()
    }

    fn comparator(&self, counts: &Arc<RecipeCounts>) -> Comparator<User> {
        let order = match self.order_by {
            UserOrder::CreatedAt => Comparator::by_key(|u: &User| (u.lifecycle.created_at(), u.id)),
            UserOrder::FullName => Comparator::by_key(|u: &User| u.full_name.to_lowercase()),
            UserOrder::Username => Comparator::by_key(|u: &User| u.username.to_lowercase()),
            UserOrder::RecipeCount => {
                let counts = Arc::clone(counts);
                Comparator::by_key(move |u: &User| counts.get(&u.id).map_or(0, |(all, _)| *all))
            }
        };
        order.direction(self.direction.is_descending())
    }
}

async fn recipe_counts(repo: &Repository<'_, Recipe>) -> ApplicationResult<RecipeCounts> {
    let mut counts = RecipeCounts::new();
    for recipe in repo.get_all().await? {
        let entry = counts.entry(recipe.user_id).or_default();
        entry.0 += 1;
        if recipe.is_published {
            entry.1 += 1;
        }
    }
    Ok(counts)
}

/// Fails with `Conflict` when another visible user has the same username,
/// ignoring case
async fn ensure_username_free(
    repo: &Repository<'_, User>,
    username: &str,
    exclude: Option<UserId>,
) -> ApplicationResult<()> {
    let key = username.trim().to_lowercase();
    let taken = repo
        .exists(Predicate::new(move |u: &User| {
            Some(u.id) != exclude && u.username.to_lowercase() == key
        }))
        .await?;
    if taken {
        return Err(ApplicationError::Conflict(format!(
            "username '{}' is already taken",
            username.trim()
        )));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct UserService {
    persistence: Persistence,
}

impl UserService {
    pub fn new(persistence: Persistence) -> Self {
        Self { persistence }
    }

    pub async fn list_all(&self, cancel: &CancellationToken) -> ApplicationResult<Vec<User>> {
        let mut uow = self.persistence.begin(cancel.clone());
        Ok(uow.repository::<User>().get_all_with(INCLUDES).await?)
    }

    pub async fn page(
        &self,
        page: PaginationRequest,
        cancel: &CancellationToken,
    ) -> ApplicationResult<PaginatedResult<User>> {
        let mut uow = self.persistence.begin(cancel.clone());
        Ok(uow
            .repository::<User>()
            .page_with(&page, None, None, INCLUDES)
            .await?)
    }

    /// Filtered, ordered page of users with their recipes
    #[instrument(skip(self, filter, cancel))]
    pub async fn filter(
        &self,
        filter: &UserFilter,
        cancel: &CancellationToken,
    ) -> ApplicationResult<PaginatedResult<User>> {
        let mut uow = self.persistence.begin(cancel.clone());
        let counts = if filter.needs_recipe_counts() {
            recipe_counts(&uow.repository::<Recipe>()).await?
        } else {
            RecipeCounts::new()
        };
        let counts = Arc::new(counts);

        Ok(uow
            .repository::<User>()
            .page_with(
                &filter.page,
                Some(filter.predicate(&counts)),
                Some(&filter.comparator(&counts)),
                INCLUDES,
            )
            .await?)
    }

    /// A user with recipes, favorites and reviews
    pub async fn get_by_id(
        &self,
        id: UserId,
        cancel: &CancellationToken,
    ) -> ApplicationResult<Option<User>> {
        let mut uow = self.persistence.begin(cancel.clone());
        Ok(uow
            .repository::<User>()
            .get_by_id_with(id, DETAIL_INCLUDES)
            .await?)
    }

    /// Exact username match, ignoring case
    pub async fn get_by_username(
        &self,
        username: &str,
        cancel: &CancellationToken,
    ) -> ApplicationResult<Option<User>> {
        let key = username.trim().to_lowercase();
        if key.is_empty() {
            return Ok(None);
        }
        let mut uow = self.persistence.begin(cancel.clone());
        Ok(uow
            .repository::<User>()
            .first_matching_with(
                Predicate::new(move |u: &User| u.username.to_lowercase() == key),
                INCLUDES,
            )
            .await?)
    }

    #[instrument(skip(self, draft, cancel), fields(username = %draft.username))]
    pub async fn create(
        &self,
        draft: UserDraft,
        role: UserRole,
        cancel: &CancellationToken,
    ) -> ApplicationResult<User> {
        draft.validate()?;
        let mut uow = self.persistence.begin(cancel.clone());
        let mut repo = uow.repository::<User>();
        ensure_username_free(&repo, &draft.username, None).await?;

        let user = User::create(UserId::new(), draft, role, self.persistence.clock().now());
        repo.add(user.clone());
        uow.save().await?;

        info!(user_id = %user.id, role = ?user.role, "user created");
        Ok(user)
    }

    /// Replace username, full name and avatar. `None` when no visible user
    /// has that id.
    #[instrument(skip(self, draft, cancel))]
    pub async fn update(
        &self,
        id: UserId,
        draft: UserDraft,
        cancel: &CancellationToken,
    ) -> ApplicationResult<Option<User>> {
        draft.validate()?;
        let mut uow = self.persistence.begin(cancel.clone());
        let mut repo = uow.repository::<User>();
        let Some(mut user) = repo.get_by_id(id).await? else {
            return Ok(None);
        };
        ensure_username_free(&repo, &draft.username, Some(id)).await?;

        user.revise(draft);
        repo.update(user.clone());
        uow.save().await?;
        Ok(Some(user))
    }

    #[instrument(skip(self, cancel))]
    pub async fn delete(&self, id: UserId, cancel: &CancellationToken) -> ApplicationResult<bool> {
        let mut uow = self.persistence.begin(cancel.clone());
        let deleted = uow.repository::<User>().soft_delete_by_id(id).await?;
        if deleted {
            uow.save().await?;
            info!(user_id = %id, "user deleted");
        }
        Ok(deleted)
    }

    pub async fn count(&self, cancel: &CancellationToken) -> ApplicationResult<u64> {
        let mut uow = self.persistence.begin(cancel.clone());
        Ok(uow.repository::<User>().count().await?)
    }
}
