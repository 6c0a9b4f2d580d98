//! Ratings and comments left on recipes.

use crate::identifiers::{RecipeId, ReviewId, UserId};
use crate::lifecycle::{Entity, Lifecycle, RelationKind, UniqueKey};
use crate::recipe::Recipe;
use crate::user::User;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReviewRelation {
    Author,
    Recipe,
}

impl RelationKind for ReviewRelation {
    fn name(&self) -> &'static str {
        match self {
            Self::Author => "author",
            Self::Recipe => "recipe",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub user_id: UserId,
    pub recipe_id: RecipeId,
    /// 1 to 5 stars
    pub rating: u8,
    pub comment: Option<String>,
    pub lifecycle: Lifecycle,

    #[serde(skip)]
    pub author: Option<User>,
    #[serde(skip)]
    pub recipe: Option<Box<Recipe>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ReviewDraft {
    #[validate(range(min = 1, max = 5, message = "rating must be between 1 and 5"))]
    pub rating: u8,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}

impl Review {
    pub fn create(
        id: ReviewId,
        user_id: UserId,
        recipe_id: RecipeId,
        draft: ReviewDraft,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            recipe_id,
            rating: draft.rating,
            comment: draft.comment,
            lifecycle: Lifecycle::new(now),
            author: None,
            recipe: None,
        }
    }

    pub fn revise(&mut self, draft: ReviewDraft) {
        self.rating = draft.rating;
        self.comment = draft.comment;
    }
}

impl Entity for Review {
    const TABLE: &'static str = "reviews";
    type Id = ReviewId;
    type Relation = ReviewRelation;

    fn id(&self) -> ReviewId {
        self.id
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.lifecycle
    }

    /// One active review per user and recipe
    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new(
            "user_recipe",
            format!("{}:{}", self.user_id, self.recipe_id),
        )]
    }
}
