//! Free-form recipe tags.

use crate::identifiers::TagId;
use crate::lifecycle::{Entity, Lifecycle, RelationKind, UniqueKey};
use crate::recipe::Recipe;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagRelation {
    Recipes,
}

impl RelationKind for TagRelation {
    fn name(&self) -> &'static str {
        "recipes"
    }
}

/// A tag. Names are unique ignoring case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub lifecycle: Lifecycle,

    #[serde(skip)]
    pub recipes: Vec<Recipe>,
}

impl Tag {
    pub fn new(id: TagId, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.into().trim().to_string(),
            lifecycle: Lifecycle::new(now),
            recipes: Vec::new(),
        }
    }

    /// Case-insensitive key used for lookups and uniqueness
    pub fn normalized_name(name: &str) -> String {
        name.trim().to_lowercase()
    }

    pub fn matches_name(&self, name: &str) -> bool {
        Self::normalized_name(&self.name) == Self::normalized_name(name)
    }
}

impl Entity for Tag {
    const TABLE: &'static str = "tags";
    type Id = TagId;
    type Relation = TagRelation;

    fn id(&self) -> TagId {
        self.id
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.lifecycle
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new("name", Self::normalized_name(&self.name))]
    }
}
