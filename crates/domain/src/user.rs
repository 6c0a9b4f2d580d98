//! User accounts.

use crate::favorite::Favorite;
use crate::identifiers::{ImageId, UserId};
use crate::lifecycle::{Entity, Lifecycle, RelationKind, UniqueKey};
use crate::recipe::Recipe;
use crate::review::Review;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// User roles for access control
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    User = 0,
    Admin = 1,
}

impl UserRole {
    pub fn can_manage_catalog(&self) -> bool {
        *self >= Self::Admin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserRelation {
    Recipes,
    Reviews,
    Favorites,
}

impl RelationKind for UserRelation {
    fn name(&self) -> &'static str {
        match self {
            Self::Recipes => "recipes",
            Self::Reviews => "reviews",
            Self::Favorites => "favorites",
        }
    }
}

/// User account. Credentials live with the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub full_name: String,
    pub avatar_image_id: Option<ImageId>,
    pub role: UserRole,
    pub lifecycle: Lifecycle,

    #[serde(skip)]
    pub recipes: Vec<Recipe>,
    #[serde(skip)]
    pub reviews: Vec<Review>,
    #[serde(skip)]
    pub favorites: Vec<Favorite>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct UserDraft {
    #[validate(length(min = 3, max = 50, message = "username must be between 3 and 50 characters"))]
    pub username: String,
    #[validate(length(min = 1, max = 100))]
    pub full_name: String,
    pub avatar_image_id: Option<ImageId>,
}

impl User {
    pub fn create(id: UserId, draft: UserDraft, role: UserRole, now: DateTime<Utc>) -> Self {
        let mut user = Self {
            id,
            username: String::new(),
            full_name: String::new(),
            avatar_image_id: None,
            role,
            lifecycle: Lifecycle::new(now),
            recipes: Vec::new(),
            reviews: Vec::new(),
            favorites: Vec::new(),
        };
        user.revise(draft);
        user
    }

    pub fn revise(&mut self, draft: UserDraft) {
        self.username = draft.username.trim().to_string();
        self.full_name = draft.full_name.trim().to_string();
        self.avatar_image_id = draft.avatar_image_id;
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl Entity for User {
    const TABLE: &'static str = "users";
    type Id = UserId;
    type Relation = UserRelation;

    fn id(&self) -> UserId {
        self.id
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.lifecycle
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new("username", self.username.to_lowercase())]
    }
}
