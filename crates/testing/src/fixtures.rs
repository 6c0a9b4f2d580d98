//! Test fixtures for generating domain entities with realistic data.

use chrono::Utc;
use fake::{
    faker::{
        internet::en::Username,
        lorem::en::{Sentence, Word, Words},
        name::en::Name,
    },
    Fake,
};
use recipe_hub_domain::{
    Category, CategoryDraft, CategoryId, Difficulty, Ingredient, Instruction, RecipeDraft,
    UserDraft,
};

/// A user draft that passes validation
pub fn random_user_draft() -> UserDraft {
    // usernames must be 3..=50 chars
    let mut username: String = Username().fake();
    while username.chars().count() < 3 {
        username.push('x');
    }
    username.truncate(50);
    UserDraft {
        username,
        full_name: Name().fake(),
        avatar_image_id: None,
    }
}

pub fn create_test_category() -> Category {
    Category::create(
        CategoryId::new(),
        CategoryDraft {
            name: Word().fake(),
            description: Some(Sentence(3..8).fake()),
        },
        Utc::now(),
    )
}

/// A recipe draft with random content that passes validation
pub fn random_recipe_draft() -> RecipeDraft {
    let title: Vec<String> = Words(2..5).fake();
    let ingredients = (0..(2..6).fake::<usize>())
        .map(|_| Ingredient {
            name: Word().fake(),
            quantity: Some((1..500).fake::<u32>() as f64),
            unit: Some("g".to_string()),
        })
        .collect();
    let instructions = (1..=(1..5).fake::<u32>())
        .map(|step| Instruction {
            step_number: step,
            content: Sentence(4..10).fake(),
        })
        .collect();

    RecipeDraft {
        title: title.join(" "),
        description: Some(Sentence(5..12).fake()),
        category_id: None,
        prep_time: Some((5..240).fake()),
        servings: Some((1..12).fake()),
        difficulty: Some(Difficulty::Medium),
        image_id: None,
        is_published: true,
        ingredients,
        instructions,
        tags: Vec::new(),
    }
}
