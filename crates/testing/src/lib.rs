//! Testing utilities for RecipeHub
//!
//! - [`fixtures`]: entities filled with realistic fake data
//! - [`builders`]: fluent builders for entities a test wants to control
//! - [`mocks`]: a settable clock for timestamp assertions
//!
//! # Examples
//!
//! ```
//! use recipe_hub_testing::{builders::*, mocks::ManualClock};
//! use recipe_hub_common::Clock;
//!
//! let clock = ManualClock::default();
//! let author = UserBuilder::new().with_username("ana").build_at(clock.now());
//! let recipe = RecipeBuilder::new()
//!     .with_title("Bolo de Cenoura")
//!     .by(author.id)
//!     .build_at(clock.now());
//! assert_eq!(recipe.slug, "bolo-de-cenoura");
//! ```

pub mod builders;
pub mod fixtures;
pub mod mocks;

pub use builders::*;
pub use fixtures::*;
pub use mocks::*;

// Re-export testing dependencies for convenience
pub use fake;
pub use proptest;
