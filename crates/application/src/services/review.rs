//! Review Service
//!
//! One review per user and recipe; only the author may change or delete it.

use crate::{ApplicationError, ApplicationResult};
use recipe_hub_common::{Clock, PaginatedResult, PaginationRequest};
use recipe_hub_domain::{
    Predicate, Recipe, RecipeId, Review, ReviewDraft, ReviewId, ReviewRelation, UserId,
};
use recipe_hub_infrastructure::Persistence;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use validator::Validate;

fn for_recipe(recipe_id: RecipeId) -> Predicate<Review> {
    Predicate::new(move |r: &Review| r.recipe_id == recipe_id)
}

#[derive(Debug, Clone)]
pub struct ReviewService {
    persistence: Persistence,
}

impl ReviewService {
    pub fn new(persistence: Persistence) -> Self {
        Self { persistence }
    }

    /// Reviews of a recipe with their authors
    pub async fn by_recipe(
        &self,
        recipe_id: RecipeId,
        page: PaginationRequest,
        cancel: &CancellationToken,
    ) -> ApplicationResult<PaginatedResult<Review>> {
        let mut uow = self.persistence.begin(cancel.clone());
        Ok(uow
            .repository::<Review>()
            .page_with(&page, Some(for_recipe(recipe_id)), None, &[ReviewRelation::Author])
            .await?)
    }

    /// Reviews written by a user, with author and recipe
    pub async fn by_user(
        &self,
        user_id: UserId,
        page: PaginationRequest,
        cancel: &CancellationToken,
    ) -> ApplicationResult<PaginatedResult<Review>> {
        let mut uow = self.persistence.begin(cancel.clone());
        Ok(uow
            .repository::<Review>()
            .page_with(
                &page,
                Some(Predicate::new(move |r: &Review| r.user_id == user_id)),
                None,
                &[ReviewRelation::Author, ReviewRelation::Recipe],
            )
            .await?)
    }

    pub async fn get_by_id(
        &self,
        id: ReviewId,
        cancel: &CancellationToken,
    ) -> ApplicationResult<Option<Review>> {
        let mut uow = self.persistence.begin(cancel.clone());
        Ok(uow
            .repository::<Review>()
            .get_by_id_with(id, &[ReviewRelation::Author])
            .await?)
    }

    pub async fn user_review_for_recipe(
        &self,
        user_id: UserId,
        recipe_id: RecipeId,
        cancel: &CancellationToken,
    ) -> ApplicationResult<Option<Review>> {
        let mut uow = self.persistence.begin(cancel.clone());
        Ok(uow
            .repository::<Review>()
            .first_matching_with(
                for_recipe(recipe_id).and(Predicate::new(move |r: &Review| r.user_id == user_id)),
                &[ReviewRelation::Author],
            )
            .await?)
    }

    #[instrument(skip(self, draft, cancel))]
    pub async fn create(
        &self,
        user_id: UserId,
        recipe_id: RecipeId,
        draft: ReviewDraft,
        cancel: &CancellationToken,
    ) -> ApplicationResult<Review> {
        draft.validate()?;
        let mut uow = self.persistence.begin(cancel.clone());

        if !uow.repository::<Recipe>().exists_id(recipe_id).await? {
            return Err(ApplicationError::not_found("recipe", recipe_id));
        }
        let mut repo = uow.repository::<Review>();
        let already = repo
            .exists(for_recipe(recipe_id).and(Predicate::new(move |r: &Review| r.user_id == user_id)))
            .await?;
        if already {
            return Err(ApplicationError::Conflict(
                "user has already reviewed this recipe".to_string(),
            ));
        }

        let review = Review::create(
            ReviewId::new(),
            user_id,
            recipe_id,
            draft,
            self.persistence.clock().now(),
        );
        repo.add(review.clone());
        uow.save().await?;

        info!(review_id = %review.id, rating = review.rating, "review created");
        Ok(review)
    }

    /// `None` when the review does not exist or belongs to someone else
    #[instrument(skip(self, draft, cancel))]
    pub async fn update(
        &self,
        id: ReviewId,
        user_id: UserId,
        draft: ReviewDraft,
        cancel: &CancellationToken,
    ) -> ApplicationResult<Option<Review>> {
        draft.validate()?;
        let mut uow = self.persistence.begin(cancel.clone());
        let mut repo = uow.repository::<Review>();
        let Some(mut review) = repo.get_by_id(id).await? else {
            return Ok(None);
        };
        if review.user_id != user_id {
            return Ok(None);
        }

        review.revise(draft);
        repo.update(review.clone());
        uow.save().await?;
        Ok(Some(review))
    }

    /// `false` when the review does not exist or belongs to someone else
    #[instrument(skip(self, cancel))]
    pub async fn delete(
        &self,
        id: ReviewId,
        user_id: UserId,
        cancel: &CancellationToken,
    ) -> ApplicationResult<bool> {
        let mut uow = self.persistence.begin(cancel.clone());
        let mut repo = uow.repository::<Review>();
        let Some(mut review) = repo.get_by_id(id).await? else {
            return Ok(false);
        };
        if review.user_id != user_id {
            return Ok(false);
        }

        repo.soft_delete(&mut review);
        uow.save().await?;
        info!(review_id = %id, "review deleted");
        Ok(true)
    }

    /// Mean rating of a recipe's visible reviews; 0 when it has none
    pub async fn average_rating(
        &self,
        recipe_id: RecipeId,
        cancel: &CancellationToken,
    ) -> ApplicationResult<f64> {
        let mut uow = self.persistence.begin(cancel.clone());
        let reviews = uow.repository::<Review>().find(for_recipe(recipe_id)).await?;
        if reviews.is_empty() {
            return Ok(0.0);
        }
        let total: u32 = reviews.iter().map(|r| u32::from(r.rating)).sum();
        Ok(f64::from(total) / reviews.len() as f64)
    }

    pub async fn count_for_recipe(
        &self,
        recipe_id: RecipeId,
        cancel: &CancellationToken,
    ) -> ApplicationResult<u64> {
        let mut uow = self.persistence.begin(cancel.clone());
        Ok(uow
            .repository::<Review>()
            .count_matching(for_recipe(recipe_id))
            .await?)
    }
}
