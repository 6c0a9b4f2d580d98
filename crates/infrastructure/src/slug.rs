//! Collision-free slugs for sluggable entities.
//!
//! The resolver probes the repository for a free candidate. A probe cannot see
//! uncommitted work of other requests, so the store's unique key on `slug` is
//! the final arbiter: callers retry with [`SlugResolver::resolve_after`] when a
//! save fails with a slug unique violation.

use crate::repository::Repository;
use crate::Result;
use recipe_hub_common::slug::{slugify, with_suffix};
use recipe_hub_domain::{Predicate, Sluggable};
use tracing::{debug, instrument};

/// A slug found free at probe time, and the suffix it carries (1 for none).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSlug {
    pub slug: String,
    pub suffix: u32,
}

#[derive(Debug, Clone)]
pub struct SlugResolver {
    fallback: String,
}

impl Default for SlugResolver {
    fn default() -> Self {
        Self::new("recipe")
    }
}

impl SlugResolver {
    /// `fallback` is the base used when a title slugifies to nothing
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            fallback: fallback.into(),
        }
    }

    /// Base slug for `title`
    pub fn base(&self, title: &str) -> String {
        let slug = slugify(title);
        if slug.is_empty() {
            self.fallback.clone()
        } else {
            slug
        }
    }

    /// First free slug for `title`: the base, then `base-2`, `base-3`, ...
    ///
    /// `exclude` is the entity being edited, whose current slug does not count
    /// as a collision.
    pub async fn resolve<T: Sluggable>(
        &self,
        repository: &Repository<'_, T>,
        title: &str,
        exclude: Option<T::Id>,
    ) -> Result<ResolvedSlug> {
        self.resolve_from(repository, title, exclude, 1).await
    }

    /// Resume after a lost race: probing starts right after `previous`.
    pub async fn resolve_after<T: Sluggable>(
        &self,
        repository: &Repository<'_, T>,
        title: &str,
        exclude: Option<T::Id>,
        previous: &ResolvedSlug,
    ) -> Result<ResolvedSlug> {
        self.resolve_from(repository, title, exclude, previous.suffix + 1)
            .await
    }

    #[instrument(skip(self, repository, exclude), fields(table = T::TABLE))]
    async fn resolve_from<T: Sluggable>(
        &self,
        repository: &Repository<'_, T>,
        title: &str,
        exclude: Option<T::Id>,
        first_suffix: u32,
    ) -> Result<ResolvedSlug> {
        let base = self.base(title);
        let mut suffix = first_suffix.max(1);

        loop {
            let candidate = with_suffix(&base, suffix);
            let probe = candidate.clone();
            let taken = repository
                .exists(Predicate::new(move |entity: &T| {
                    entity.slug() == probe && Some(entity.id()) != exclude
                }))
                .await?;

            if !taken {
                debug!(slug = %candidate, suffix, "slug resolved");
                return Ok(ResolvedSlug {
                    slug: candidate,
                    suffix,
                });
            }
            suffix += 1;
        }
    }
}
