//! Category Service

use super::search_term;
use crate::{ApplicationError, ApplicationResult};
use recipe_hub_common::{Clock, PaginatedResult, PaginationRequest};
use recipe_hub_domain::{Category, CategoryDraft, CategoryId, CategoryRelation, Predicate};
use recipe_hub_infrastructure::Persistence;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use validator::Validate;

const INCLUDES: &[CategoryRelation] = &[CategoryRelation::Recipes];

#[derive(Debug, Clone)]
pub struct CategoryService {
    persistence: Persistence,
}

impl CategoryService {
    pub fn new(persistence: Persistence) -> Self {
        Self { persistence }
    }

    /// Every category with its recipes
    pub async fn list_all(&self, cancel: &CancellationToken) -> ApplicationResult<Vec<Category>> {
        let mut uow = self.persistence.begin(cancel.clone());
        Ok(uow.repository::<Category>().get_all_with(INCLUDES).await?)
    }

    pub async fn page(
        &self,
        page: PaginationRequest,
        cancel: &CancellationToken,
    ) -> ApplicationResult<PaginatedResult<Category>> {
        let mut uow = self.persistence.begin(cancel.clone());
        Ok(uow
            .repository::<Category>()
            .page_with(&page, None, None, INCLUDES)
            .await?)
    }

    pub async fn get_by_id(
        &self,
        id: CategoryId,
        cancel: &CancellationToken,
    ) -> ApplicationResult<Option<Category>> {
        let mut uow = self.persistence.begin(cancel.clone());
        Ok(uow
            .repository::<Category>()
            .get_by_id_with(id, INCLUDES)
            .await?)
    }

    /// First category whose name contains `name`, ignoring case
    #[instrument(skip(self, cancel))]
    pub async fn get_by_name(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> ApplicationResult<Option<Category>> {
        let Some(term) = search_term(Some(name)) else {
            return Ok(None);
        };
        let mut uow = self.persistence.begin(cancel.clone());
        Ok(uow
            .repository::<Category>()
            .first_matching_with(
                Predicate::new(move |c: &Category| c.name.to_lowercase().contains(&term)),
                INCLUDES,
            )
            .await?)
    }

    #[instrument(skip(self, draft, cancel), fields(name = %draft.name))]
    pub async fn create(
        &self,
        draft: CategoryDraft,
        cancel: &CancellationToken,
    ) -> ApplicationResult<Category> {
        draft.validate()?;
        if draft.name.trim().is_empty() {
            return Err(ApplicationError::InvalidInput(
                "category name must not be blank".to_string(),
            ));
        }

        let mut uow = self.persistence.begin(cancel.clone());
        let category = Category::create(CategoryId::new(), draft, self.persistence.clock().now());
        uow.repository::<Category>().add(category.clone());
        uow.save().await?;

        info!(category_id = %category.id, "category created");
        Ok(category)
    }

    /// `None` when no visible category has that id
    #[instrument(skip(self, draft, cancel))]
    pub async fn update(
        &self,
        id: CategoryId,
        draft: CategoryDraft,
        cancel: &CancellationToken,
    ) -> ApplicationResult<Option<Category>> {
        draft.validate()?;
        let mut uow = self.persistence.begin(cancel.clone());
        let mut repo = uow.repository::<Category>();
        let Some(mut category) = repo.get_by_id(id).await? else {
            return Ok(None);
        };
        category.revise(draft);
        repo.update(category.clone());
        uow.save().await?;
        Ok(Some(category))
    }

    /// Soft delete. Recipes in the category keep their reference.
    #[instrument(skip(self, cancel))]
    pub async fn delete(&self, id: CategoryId, cancel: &CancellationToken) -> ApplicationResult<bool> {
        let mut uow = self.persistence.begin(cancel.clone());
        let deleted = uow.repository::<Category>().soft_delete_by_id(id).await?;
        if deleted {
            uow.save().await?;
            info!(category_id = %id, "category deleted");
        }
        Ok(deleted)
    }

    pub async fn count(&self, cancel: &CancellationToken) -> ApplicationResult<u64> {
        let mut uow = self.persistence.begin(cancel.clone());
        Ok(uow.repository::<Category>().count().await?)
    }
}
