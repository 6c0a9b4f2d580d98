//! Favorite Service

use crate::ApplicationResult;
use recipe_hub_common::{Clock, PaginatedResult, PaginationRequest};
use recipe_hub_domain::{
    Comparator, Entity, Favorite, FavoriteId, FavoriteRelation, Predicate, Recipe, RecipeId,
    UserId,
};
use recipe_hub_infrastructure::Persistence;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

fn pair(user_id: UserId, recipe_id: RecipeId) -> Predicate<Favorite> {
    Predicate::new(move |f: &Favorite| f.user_id == user_id && f.recipe_id == recipe_id)
}

#[derive(Debug, Clone)]
pub struct FavoriteService {
    persistence: Persistence,
}

impl FavoriteService {
    pub fn new(persistence: Persistence) -> Self {
        Self { persistence }
    }

    /// A user's favorites, newest first, each with its recipe loaded
    #[instrument(skip(self, cancel))]
    pub async fn user_favorites(
        &self,
        user_id: UserId,
        page: PaginationRequest,
        cancel: &CancellationToken,
    ) -> ApplicationResult<PaginatedResult<Favorite>> {
        let newest_first =
            Comparator::by_key(|f: &Favorite| (f.lifecycle.created_at(), f.id)).reversed();
        let mut uow = self.persistence.begin(cancel.clone());
        Ok(uow
            .repository::<Favorite>()
            .page_with(
                &page,
                Some(Predicate::new(move |f: &Favorite| f.user_id == user_id)),
                Some(&newest_first),
                &[FavoriteRelation::Recipe],
            )
            .await?)
    }

    pub async fn is_favorite(
        &self,
        user_id: UserId,
        recipe_id: RecipeId,
        cancel: &CancellationToken,
    ) -> ApplicationResult<bool> {
        let mut uow = self.persistence.begin(cancel.clone());
        Ok(uow
            .repository::<Favorite>()
            .exists(pair(user_id, recipe_id))
            .await?)
    }

    /// `false` when the recipe does not exist or is already a favorite
    #[instrument(skip(self, cancel))]
    pub async fn add(
        &self,
        user_id: UserId,
        recipe_id: RecipeId,
        cancel: &CancellationToken,
    ) -> ApplicationResult<bool> {
        let mut uow = self.persistence.begin(cancel.clone());
        if !uow.repository::<Recipe>().exists_id(recipe_id).await? {
            debug!("recipe not found");
            return Ok(false);
        }
        let mut repo = uow.repository::<Favorite>();
        if repo.exists(pair(user_id, recipe_id)).await? {
            return Ok(false);
        }

        repo.add(Favorite::new(
            FavoriteId::new(),
            user_id,
            recipe_id,
            self.persistence.clock().now(),
        ));
        match uow.save().await {
            Ok(_) => {
                info!("favorite added");
                Ok(true)
            }
            // a concurrent request added the same pair first
            Err(err) if err.is_unique_violation(Favorite::TABLE, "user_recipe") => {
                uow.discard();
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// `false` when the pair was not a favorite
    #[instrument(skip(self, cancel))]
    pub async fn remove(
        &self,
        user_id: UserId,
        recipe_id: RecipeId,
        cancel: &CancellationToken,
    ) -> ApplicationResult<bool> {
        let mut uow = self.persistence.begin(cancel.clone());
        let mut repo = uow.repository::<Favorite>();
        let Some(favorite) = repo.first_matching(pair(user_id, recipe_id)).await? else {
            return Ok(false);
        };
        repo.remove(favorite);
        uow.save().await?;
        info!("favorite removed");
        Ok(true)
    }

    pub async fn count_for_recipe(
        &self,
        recipe_id: RecipeId,
        cancel: &CancellationToken,
    ) -> ApplicationResult<u64> {
        let mut uow = self.persistence.begin(cancel.clone());
        Ok(uow
            .repository::<Favorite>()
            .count_matching(Predicate::new(move |f: &Favorite| f.recipe_id == recipe_id))
            .await?)
    }

    pub async fn count_for_user(
        &self,
        user_id: UserId,
        cancel: &CancellationToken,
    ) -> ApplicationResult<u64> {
        let mut uow = self.persistence.begin(cancel.clone());
        Ok(uow
            .repository::<Favorite>()
            .count_matching(Predicate::new(move |f: &Favorite| f.user_id == user_id))
            .await?)
    }
}
