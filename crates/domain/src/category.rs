//! Recipe categories.

use crate::identifiers::CategoryId;
use crate::lifecycle::{Entity, Lifecycle, RelationKind};
use crate::recipe::Recipe;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoryRelation {
    Recipes,
}

impl RelationKind for CategoryRelation {
    fn name(&self) -> &'static str {
        "recipes"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub lifecycle: Lifecycle,

    #[serde(skip)]
    pub recipes: Vec<Recipe>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CategoryDraft {
    #[validate(length(min = 1, max = 100, message = "name must be between 1 and 100 characters"))]
    pub name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

impl Category {
    pub fn create(id: CategoryId, draft: CategoryDraft, now: DateTime<Utc>) -> Self {
        let mut category = Self {
            id,
            name: String::new(),
            description: None,
            lifecycle: Lifecycle::new(now),
            recipes: Vec::new(),
        };
        category.revise(draft);
        category
    }

    pub fn revise(&mut self, draft: CategoryDraft) {
        self.name = draft.name.trim().to_string();
        self.description = draft.description;
    }
}

impl Entity for Category {
    const TABLE: &'static str = "categories";
    type Id = CategoryId;
    type Relation = CategoryRelation;

    fn id(&self) -> CategoryId {
        self.id
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.lifecycle
    }
}
