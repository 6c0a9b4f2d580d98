//! Strongly-typed identifier types for the RecipeHub domain.
//!
//! Every persisted entity gets its own identifier type so that a recipe id can
//! never be passed where a user id is expected. All ids use UUID v7, which keeps
//! freshly created rows roughly ordered by creation time.

use crate::lifecycle::EntityId;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use uuid::Uuid;

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new ID with a time-ordered UUID v7
            #[inline]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Create an ID from an existing UUID
            #[inline]
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get a reference to the underlying UUID
            #[inline]
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Convert to the underlying UUID
            #[inline]
            pub fn into_uuid(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl EntityId for $name {}
    };
}

define_id!(UserId, "Unique identifier for users");

define_id!(RecipeId, "Unique identifier for recipes");

define_id!(CategoryId, "Unique identifier for recipe categories");

define_id!(TagId, "Unique identifier for tags");

define_id!(ReviewId, "Unique identifier for recipe reviews");

define_id!(FavoriteId, "Unique identifier for favorite bookmarks");

define_id!(
    ImageId,
    "Identifier of an uploaded image; the binary itself lives outside this system"
);
