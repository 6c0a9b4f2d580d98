//! Tag Service

use super::search_term;
use crate::{ApplicationError, ApplicationResult};
use recipe_hub_common::{Clock, PaginatedResult, PaginationRequest};
use recipe_hub_domain::{Predicate, Tag, TagId, TagRelation};
use recipe_hub_infrastructure::{Persistence, Repository};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

const INCLUDES: &[TagRelation] = &[TagRelation::Recipes];
const MAX_NAME_LEN: usize = 50;

fn checked_name(name: &str) -> ApplicationResult<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApplicationError::InvalidInput(
            "tag name must not be blank".to_string(),
        ));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ApplicationError::InvalidInput(format!(
            "tag name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name)
}

/// Fails with `Conflict` when another visible tag already uses `name`
async fn ensure_name_free(
    repo: &Repository<'_, Tag>,
    name: &str,
    exclude: Option<TagId>,
) -> ApplicationResult<()> {
    let key = Tag::normalized_name(name);
    let taken = repo
        .exists(Predicate::new(move |t: &Tag| {
            Some(t.id) != exclude && Tag::normalized_name(&t.name) == key
        }))
        .await?;
    if taken {
        return Err(ApplicationError::Conflict(format!("tag '{name}' already exists")));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct TagService {
    persistence: Persistence,
}

impl TagService {
    pub fn new(persistence: Persistence) -> Self {
        Self { persistence }
    }

    pub async fn list_all(&self, cancel: &CancellationToken) -> ApplicationResult<Vec<Tag>> {
        let mut uow = self.persistence.begin(cancel.clone());
        Ok(uow.repository::<Tag>().get_all_with(INCLUDES).await?)
    }

    pub async fn page(
        &self,
        page: PaginationRequest,
        cancel: &CancellationToken,
    ) -> ApplicationResult<PaginatedResult<Tag>> {
        let mut uow = self.persistence.begin(cancel.clone());
        Ok(uow
            .repository::<Tag>()
            .page_with(&page, None, None, INCLUDES)
            .await?)
    }

    pub async fn get_by_id(
        &self,
        id: TagId,
        cancel: &CancellationToken,
    ) -> ApplicationResult<Option<Tag>> {
        let mut uow = self.persistence.begin(cancel.clone());
        Ok(uow.repository::<Tag>().get_by_id_with(id, INCLUDES).await?)
    }

    /// First tag whose name contains `name`, ignoring case
    #[instrument(skip(self, cancel))]
    pub async fn get_by_name(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> ApplicationResult<Option<Tag>> {
        let Some(term) = search_term(Some(name)) else {
            return Ok(None);
        };
        let mut uow = self.persistence.begin(cancel.clone());
        Ok(uow
            .repository::<Tag>()
            .first_matching_with(
                Predicate::new(move |t: &Tag| t.name.to_lowercase().contains(&term)),
                INCLUDES,
            )
            .await?)
    }

    #[instrument(skip(self, cancel))]
    pub async fn create(&self, name: &str, cancel: &CancellationToken) -> ApplicationResult<Tag> {
        let name = checked_name(name)?;
        let mut uow = self.persistence.begin(cancel.clone());
        let mut repo = uow.repository::<Tag>();
        ensure_name_free(&repo, name, None).await?;

        let tag = Tag::new(TagId::new(), name, self.persistence.clock().now());
        repo.add(tag.clone());
        uow.save().await?;

        info!(tag_id = %tag.id, name = %tag.name, "tag created");
        Ok(tag)
    }

    /// Rename a tag. `None` when no visible tag has that id.
    #[instrument(skip(self, cancel))]
    pub async fn update(
        &self,
        id: TagId,
        name: &str,
        cancel: &CancellationToken,
    ) -> ApplicationResult<Option<Tag>> {
        let name = checked_name(name)?;
        let mut uow = self.persistence.begin(cancel.clone());
        let mut repo = uow.repository::<Tag>();
        let Some(mut tag) = repo.get_by_id(id).await? else {
            return Ok(None);
        };
        ensure_name_free(&repo, name, Some(id)).await?;

        tag.name = name.to_string();
        repo.update(tag.clone());
        uow.save().await?;
        Ok(Some(tag))
    }

    /// Soft delete. Recipes keep the id but no longer load the tag.
    #[instrument(skip(self, cancel))]
    pub async fn delete(&self, id: TagId, cancel: &CancellationToken) -> ApplicationResult<bool> {
        let mut uow = self.persistence.begin(cancel.clone());
        let deleted = uow.repository::<Tag>().soft_delete_by_id(id).await?;
        if deleted {
            uow.save().await?;
            info!(tag_id = %id, "tag deleted");
        }
        Ok(deleted)
    }

    pub async fn count(&self, cancel: &CancellationToken) -> ApplicationResult<u64> {
        let mut uow = self.persistence.begin(cancel.clone());
        Ok(uow.repository::<Tag>().count().await?)
    }
}
