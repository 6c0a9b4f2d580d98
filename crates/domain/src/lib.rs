//! RecipeHub Domain Types
//!
//! Core domain model for the RecipeHub recipe-sharing platform: strongly typed
//! identifiers, the lifecycle contract every persisted entity follows, composable
//! predicates used by the repositories, and the entities themselves.
//!
//! ## Architecture
//!
//! - **identifiers**: UUID v7 based identifiers for all entities
//! - **lifecycle**: audit timestamps, soft-delete state and the [`Entity`] trait
//! - **predicate**: composable filters and sort comparators
//! - **recipe**, **category**, **tag**, **user**, **review**, **favorite**: entities
//! - **errors**: validation errors
//!
//! ## Usage
//!
//! ```rust
//! use recipe_hub_domain::{Predicate, Tag, TagId};
//! use chrono::Utc;
//!
//! let tag = Tag::new(TagId::new(), "Vegano", Utc::now());
//! let active = Predicate::<Tag>::not_deleted();
//! assert!(active.evaluate(&tag));
//! ```

#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)]

pub mod identifiers;
pub mod lifecycle;
pub mod predicate;
pub mod recipe;
pub mod category;
pub mod tag;
pub mod user;
pub mod review;
pub mod favorite;
pub mod errors;

pub use identifiers::*;
pub use lifecycle::{Entity, EntityId, Lifecycle, NoRelation, RelationKind, Sluggable, UniqueKey};
pub use predicate::{combine, Comparator, Predicate, PredicateBuilder};
pub use errors::{ValidationError, ValidationResult};

pub use recipe::{Difficulty, Ingredient, Instruction, Recipe, RecipeDraft, RecipeRelation};
pub use category::{Category, CategoryDraft, CategoryRelation};
pub use tag::{Tag, TagRelation};
pub use user::{User, UserDraft, UserRelation, UserRole};
pub use review::{Review, ReviewDraft, ReviewRelation};
pub use favorite::{Favorite, FavoriteRelation};
