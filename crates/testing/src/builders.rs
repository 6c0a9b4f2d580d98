//! Fluent builder pattern for constructing test data.
//!
//! Builders take the creation time explicitly (`build_at`) so tests that care
//! about ordering can feed them a [`ManualClock`](crate::mocks::ManualClock).

use chrono::{DateTime, Utc};
use recipe_hub_common::slugify;
use recipe_hub_domain::{
    Category, CategoryDraft, CategoryId, Difficulty, Ingredient, Instruction, Recipe, RecipeDraft,
    RecipeId, Review, ReviewDraft, ReviewId, Tag, TagId, User, UserDraft, UserId, UserRole,
};

/// Builder for creating User test instances
#[derive(Clone)]
pub struct UserBuilder {
    id: UserId,
    username: String,
    full_name: String,
    role: UserRole,
}

impl UserBuilder {
    pub fn new() -> Self {
        Self {
            id: UserId::new(),
            username: "testuser".to_string(),
            full_name: "Test User".to_string(),
            role: UserRole::User,
        }
    }

    pub fn with_id(mut self, id: UserId) -> Self {
        self.id = id;
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn with_full_name(mut self, name: impl Into<String>) -> Self {
        self.full_name = name.into();
        self
    }

    pub fn admin(mut self) -> Self {
        self.role = UserRole::Admin;
        self
    }

    pub fn build_at(self, now: DateTime<Utc>) -> User {
        User::create(
            self.id,
            UserDraft {
                username: self.username,
                full_name: self.full_name,
                avatar_image_id: None,
            },
            self.role,
            now,
        )
    }

    pub fn build(self) -> User {
        self.build_at(Utc::now())
    }
}

impl Default for UserBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating Recipe test instances
#[derive(Clone)]
pub struct RecipeBuilder {
    id: RecipeId,
    user_id: UserId,
    slug: Option<String>,
    tag_ids: Vec<TagId>,
    draft: RecipeDraft,
}

impl RecipeBuilder {
    pub fn new() -> Self {
        Self {
            id: RecipeId::new(),
            user_id: UserId::new(),
            slug: None,
            tag_ids: Vec::new(),
            draft: RecipeDraft {
                title: "Test Recipe".to_string(),
                is_published: true,
                ingredients: vec![Ingredient {
                    name: "farinha".to_string(),
                    quantity: Some(2.0),
                    unit: Some("xícara".to_string()),
                }],
                instructions: vec![Instruction {
                    step_number: 1,
                    content: "Misture tudo.".to_string(),
                }],
                ..RecipeDraft::default()
            },
        }
    }

    pub fn with_id(mut self, id: RecipeId) -> Self {
        self.id = id;
        self
    }

    /// Set the title; the slug follows it unless set with [`with_slug`](Self::with_slug)
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.draft.title = title.into();
        self
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.draft.description = Some(description.into());
        self
    }

    pub fn by(mut self, user_id: UserId) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn in_category(mut self, category_id: CategoryId) -> Self {
        self.draft.category_id = Some(category_id);
        self
    }

    pub fn with_tag(mut self, tag_id: TagId) -> Self {
        self.tag_ids.push(tag_id);
        self
    }

    pub fn with_prep_time(mut self, minutes: u32) -> Self {
        self.draft.prep_time = Some(minutes);
        self
    }

    pub fn with_servings(mut self, servings: u32) -> Self {
        self.draft.servings = Some(servings);
        self
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.draft.difficulty = Some(difficulty);
        self
    }

    pub fn unpublished(mut self) -> Self {
        self.draft.is_published = false;
        self
    }

    pub fn with_ingredient(mut self, name: impl Into<String>) -> Self {
        self.draft.ingredients.push(Ingredient {
            name: name.into(),
            quantity: None,
            unit: None,
        });
        self
    }

    /// The draft as a service would receive it
    pub fn draft(&self) -> RecipeDraft {
        self.draft.clone()
    }

    pub fn build_at(self, now: DateTime<Utc>) -> Recipe {
        let slug = self.slug.unwrap_or_else(|| slugify(&self.draft.title));
        Recipe::create(self.id, self.user_id, self.draft, slug, self.tag_ids, now)
    }

    pub fn build(self) -> Recipe {
        self.build_at(Utc::now())
    }
}

impl Default for RecipeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating Category test instances
#[derive(Clone)]
pub struct CategoryBuilder {
    id: CategoryId,
    name: String,
    description: Option<String>,
}

impl CategoryBuilder {
    pub fn new() -> Self {
        Self {
            id: CategoryId::new(),
            name: "Sobremesas".to_string(),
            description: None,
        }
    }

    pub fn with_id(mut self, id: CategoryId) -> Self {
        self.id = id;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn build_at(self, now: DateTime<Utc>) -> Category {
        Category::create(
            self.id,
            CategoryDraft {
                name: self.name,
                description: self.description,
            },
            now,
        )
    }

    pub fn build(self) -> Category {
        self.build_at(Utc::now())
    }
}

impl Default for CategoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating Tag test instances
#[derive(Clone)]
pub struct TagBuilder {
    id: TagId,
    name: String,
}

impl TagBuilder {
    pub fn new() -> Self {
        Self {
            id: TagId::new(),
            name: "vegano".to_string(),
        }
    }

    pub fn with_id(mut self, id: TagId) -> Self {
        self.id = id;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn build_at(self, now: DateTime<Utc>) -> Tag {
        Tag::new(self.id, self.name, now)
    }

    pub fn build(self) -> Tag {
        self.build_at(Utc::now())
    }
}

impl Default for TagBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating Review test instances
#[derive(Clone)]
pub struct ReviewBuilder {
    id: ReviewId,
    user_id: UserId,
    recipe_id: RecipeId,
    rating: u8,
    comment: Option<String>,
}

impl ReviewBuilder {
    pub fn new(recipe_id: RecipeId) -> Self {
        Self {
            id: ReviewId::new(),
            user_id: UserId::new(),
            recipe_id,
            rating: 5,
            comment: None,
        }
    }

    pub fn by(mut self, user_id: UserId) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_rating(mut self, rating: u8) -> Self {
        self.rating = rating;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn build_at(self, now: DateTime<Utc>) -> Review {
        Review::create(
            self.id,
            self.user_id,
            self.recipe_id,
            ReviewDraft {
                rating: self.rating,
                comment: self.comment,
            },
            now,
        )
    }

    pub fn build(self) -> Review {
        self.build_at(Utc::now())
    }
}
