//! Recipes bookmarked by users.

use crate::identifiers::{FavoriteId, RecipeId, UserId};
use crate::lifecycle::{Entity, Lifecycle, RelationKind, UniqueKey};
use crate::recipe::Recipe;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FavoriteRelation {
    /// The bookmarked recipe together with its author and category
    Recipe,
}

impl RelationKind for FavoriteRelation {
    fn name(&self) -> &'static str {
        "recipe"
    }
}

/// A user's bookmark of a recipe. At most one active bookmark per pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Favorite {
    pub id: FavoriteId,
    pub user_id: UserId,
    pub recipe_id: RecipeId,
    pub lifecycle: Lifecycle,

    #[serde(skip)]
    pub recipe: Option<Recipe>,
}

impl Favorite {
    pub fn new(id: FavoriteId, user_id: UserId, recipe_id: RecipeId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id,
            recipe_id,
            lifecycle: Lifecycle::new(now),
            recipe: None,
        }
    }
}

impl Entity for Favorite {
    const TABLE: &'static str = "favorites";
    type Id = FavoriteId;
    type Relation = FavoriteRelation;

    fn id(&self) -> FavoriteId {
        self.id
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.lifecycle
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new(
            "user_recipe",
            format!("{}:{}", self.user_id, self.recipe_id),
        )]
    }
}
