//! Application Services
//!
//! One service per aggregate. Each operation begins its own unit of work
//! bound to the caller's cancellation token and saves it at most once per
//! attempt.

mod category;
mod favorite;
mod recipe;
mod review;
mod tag;
mod user;

pub use category::*;
pub use favorite::*;
pub use recipe::*;
pub use review::*;
pub use tag::*;
pub use user::*;

use recipe_hub_common::{AppConfig, SlugConfig};
use recipe_hub_infrastructure::Persistence;

/// Service configuration
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub slug: SlugConfig,
}

impl From<&AppConfig> for ServiceConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            slug: config.slug.clone(),
        }
    }
}

/// Every service over one persistence layer.
#[derive(Debug, Clone)]
pub struct Services {
    pub recipes: RecipeService,
    pub categories: CategoryService,
    pub tags: TagService,
    pub favorites: FavoriteService,
    pub reviews: ReviewService,
    pub users: UserService,
}

impl Services {
    pub fn new(persistence: Persistence, config: ServiceConfig) -> Self {
        Self {
            recipes: RecipeService::new(persistence.clone(), &config.slug),
            categories: CategoryService::new(persistence.clone()),
            tags: TagService::new(persistence.clone()),
            favorites: FavoriteService::new(persistence.clone()),
            reviews: ReviewService::new(persistence.clone()),
            users: UserService::new(persistence),
        }
    }
}

/// Lowercased, trimmed text for case-insensitive `contains` matching.
/// `None` when there is nothing to match on.
pub(crate) fn search_term(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}
