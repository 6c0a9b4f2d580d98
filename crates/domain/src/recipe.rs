//! Recipes, their ingredients and preparation steps.

use crate::category::Category;
use crate::errors::ValidationError;
use crate::identifiers::{CategoryId, ImageId, RecipeId, TagId, UserId};
use crate::lifecycle::{Entity, Lifecycle, RelationKind, Sluggable, UniqueKey};
use crate::review::Review;
use crate::tag::Tag;
use crate::user::User;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

/// How hard a recipe is to prepare
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(ValidationError::invalid(
                "difficulty",
                format!("unknown difficulty '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub step_number: u32,
    pub content: String,
}

/// Relations that can be loaded together with a recipe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipeRelation {
    Author,
    Category,
    Tags,
    Reviews,
}

impl RelationKind for RecipeRelation {
    fn name(&self) -> &'static str {
        match self {
            Self::Author => "author",
            Self::Category => "category",
            Self::Tags => "tags",
            Self::Reviews => "reviews",
        }
    }
}

/// A published or draft recipe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub user_id: UserId,
    pub category_id: Option<CategoryId>,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    /// Preparation time in minutes
    pub prep_time: Option<u32>,
    pub servings: Option<u32>,
    pub difficulty: Option<Difficulty>,
    pub image_id: Option<ImageId>,
    pub is_published: bool,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub instructions: Vec<Instruction>,
    #[serde(default)]
    pub tag_ids: Vec<TagId>,
    pub lifecycle: Lifecycle,

    #[serde(skip)]
    pub author: Option<User>,
    #[serde(skip)]
    pub category: Option<Category>,
    #[serde(skip)]
    pub tags: Vec<Tag>,
    #[serde(skip)]
    pub reviews: Vec<Review>,
}

/// Caller-supplied content of a recipe, used for both creation and update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct RecipeDraft {
    #[validate(length(min = 1, max = 200, message = "title must be between 1 and 200 characters"))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    #[validate(range(min = 1, max = 10080, message = "prep time must be between 1 and 10080 minutes"))]
    pub prep_time: Option<u32>,
    #[validate(range(min = 1, max = 1000, message = "servings must be between 1 and 1000"))]
    pub servings: Option<u32>,
    pub difficulty: Option<Difficulty>,
    pub image_id: Option<ImageId>,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub instructions: Vec<Instruction>,
    /// Tag names; unknown names are created on save
    #[serde(default)]
    pub tags: Vec<String>,
}

impl RecipeDraft {
    /// Validates field constraints plus the nested ingredient and step lists
    pub fn check(&self) -> Result<(), ValidationError> {
        self.validate()?;
        if self.title.trim().is_empty() {
            return Err(ValidationError::invalid("title", "title must not be blank"));
        }
        if let Some(position) = self
            .ingredients
            .iter()
            .position(|ingredient| ingredient.name.trim().is_empty())
        {
            return Err(ValidationError::invalid(
                "ingredients",
                format!("ingredient #{} has no name", position + 1),
            ));
        }
        if self
            .ingredients
            .iter()
            .any(|ingredient| ingredient.quantity.is_some_and(|q| q < 0.0))
        {
            return Err(ValidationError::invalid(
                "ingredients",
                "ingredient quantities cannot be negative",
            ));
        }
        if self.instructions.iter().any(|step| step.content.trim().is_empty()) {
            return Err(ValidationError::invalid(
                "instructions",
                "instruction steps cannot be empty",
            ));
        }
        Ok(())
    }
}

impl Recipe {
    /// Build a new, not yet persisted recipe from a draft.
    pub fn create(
        id: RecipeId,
        user_id: UserId,
        draft: RecipeDraft,
        slug: String,
        tag_ids: Vec<TagId>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut recipe = Self {
            id,
            user_id,
            category_id: None,
            title: String::new(),
            slug,
            description: None,
            prep_time: None,
            servings: None,
            difficulty: None,
            image_id: None,
            is_published: false,
            ingredients: Vec::new(),
            instructions: Vec::new(),
            tag_ids,
            lifecycle: Lifecycle::new(now),
            author: None,
            category: None,
            tags: Vec::new(),
            reviews: Vec::new(),
        };
        recipe.apply_content(draft);
        recipe
    }

    /// Replace the recipe content. Timestamps are maintained by the unit of work.
    pub fn revise(&mut self, draft: RecipeDraft, slug: String, tag_ids: Vec<TagId>) {
        self.slug = slug;
        self.tag_ids = tag_ids;
        self.apply_content(draft);
    }

    fn apply_content(&mut self, draft: RecipeDraft) {
        self.title = draft.title.trim().to_string();
        self.description = draft.description;
        self.category_id = draft.category_id;
        self.prep_time = draft.prep_time;
        self.servings = draft.servings;
        self.difficulty = draft.difficulty;
        self.image_id = draft.image_id;
        self.is_published = draft.is_published;
        self.ingredients = draft.ingredients;
        self.instructions = renumber(draft.instructions);
    }

    pub fn has_tag(&self, tag_id: TagId) -> bool {
        self.tag_ids.contains(&tag_id)
    }

    pub fn average_rating(&self) -> Option<f64> {
        if self.reviews.is_empty() {
            return None;
        }
        let sum: u32 = self.reviews.iter().map(|r| u32::from(r.rating)).sum();
        Some(f64::from(sum) / self.reviews.len() as f64)
    }
}

/// Steps are stored in order and numbered from 1
fn renumber(mut steps: Vec<Instruction>) -> Vec<Instruction> {
    steps.sort_by_key(|step| step.step_number);
    for (index, step) in steps.iter_mut().enumerate() {
        step.step_number = index as u32 + 1;
    }
    steps
}

impl Entity for Recipe {
    const TABLE: &'static str = "recipes";
    type Id = RecipeId;
    type Relation = RecipeRelation;

    fn id(&self) -> RecipeId {
        self.id
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.lifecycle
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new("slug", self.slug.clone())]
    }
}

impl Sluggable for Recipe {
    fn slug(&self) -> &str {
        &self.slug
    }
}
