//! Favorites, reviews, users and the category/tag catalog over the in-memory store.

use recipe_hub_application::{ApplicationError, ServiceConfig, Services, UserFilter, UserOrder};
use recipe_hub_common::{PaginationRequest, SortDirection};
use recipe_hub_domain::{
    CategoryDraft, Recipe, RecipeDraft, RecipeId, ReviewDraft, User, UserDraft, UserRole,
};
use recipe_hub_infrastructure::Persistence;
use recipe_hub_testing::{builders::*, mocks::ManualClock};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn setup() -> (Services, ManualClock) {
    let clock = ManualClock::default();
    let persistence = Persistence::in_memory(Arc::new(clock.clone()));
    (Services::new(persistence, ServiceConfig::default()), clock)
}

fn user_draft(username: &str, full_name: &str) -> UserDraft {
    UserDraft {
        username: username.to_string(),
        full_name: full_name.to_string(),
        avatar_image_id: None,
    }
}

async fn register(services: &Services, username: &str) -> User {
    services
        .users
        .create(
            user_draft(username, &format!("{username} Souza")),
            UserRole::User,
            &CancellationToken::new(),
        )
        .await
        .unwrap()
}

async fn publish(services: &Services, author: &User, title: &str) -> Recipe {
    services
        .recipes
        .create(
            author.id,
            RecipeBuilder::new().with_title(title).draft(),
            &CancellationToken::new(),
        )
        .await
        .unwrap()
}

fn stars(rating: u8) -> ReviewDraft {
    ReviewDraft {
        rating,
        comment: None,
    }
}

#[tokio::test]
async fn test_favorites_are_unique_per_user_and_recipe() {
    let (services, clock) = setup();
    let cancel = CancellationToken::new();
    let ana = register(&services, "ana").await;
    let bia = register(&services, "bia").await;
    let canjica = publish(&services, &ana, "Canjica").await;
    let pamonha = publish(&services, &ana, "Pamonha").await;

    assert!(services.favorites.add(bia.id, canjica.id, &cancel).await.unwrap());
    assert!(!services.favorites.add(bia.id, canjica.id, &cancel).await.unwrap());
    assert!(!services.favorites.add(bia.id, RecipeId::new(), &cancel).await.unwrap());
    clock.advance_secs(1);
    assert!(services.favorites.add(bia.id, pamonha.id, &cancel).await.unwrap());
    assert!(services.favorites.add(ana.id, canjica.id, &cancel).await.unwrap());

    assert!(services.favorites.is_favorite(bia.id, canjica.id, &cancel).await.unwrap());
    assert_eq!(services.favorites.count_for_recipe(canjica.id, &cancel).await.unwrap(), 2);
    assert_eq!(services.favorites.count_for_user(bia.id, &cancel).await.unwrap(), 2);

    let page = services
        .favorites
        .user_favorites(bia.id, PaginationRequest::default(), &cancel)
        .await
        .unwrap();
    let titles: Vec<_> = page
        .items
        .iter()
        .map(|f| f.recipe.as_ref().map(|r| r.title.as_str()))
        .collect();
    assert_eq!(titles, [Some("Pamonha"), Some("Canjica")]);
}

#[tokio::test]
async fn test_removed_favorite_can_be_added_again() {
    let (services, _clock) = setup();
    let cancel = CancellationToken::new();
    let ana = register(&services, "ana").await;
    let recipe = publish(&services, &ana, "Tapioca").await;

    assert!(services.favorites.add(ana.id, recipe.id, &cancel).await.unwrap());
    assert!(services.favorites.remove(ana.id, recipe.id, &cancel).await.unwrap());
    assert!(!services.favorites.remove(ana.id, recipe.id, &cancel).await.unwrap());
    assert!(!services.favorites.is_favorite(ana.id, recipe.id, &cancel).await.unwrap());

    assert!(services.favorites.add(ana.id, recipe.id, &cancel).await.unwrap());
    assert_eq!(services.favorites.count_for_user(ana.id, &cancel).await.unwrap(), 1);
}

#[tokio::test]
async fn test_one_review_per_user_and_recipe() {
    let (services, _clock) = setup();
    let cancel = CancellationToken::new();
    let ana = register(&services, "ana").await;
    let bia = register(&services, "bia").await;
    let recipe = publish(&services, &ana, "Vatapá").await;

    let review = services
        .reviews
        .create(bia.id, recipe.id, stars(4), &cancel)
        .await
        .unwrap();
    assert_eq!(review.rating, 4);

    let again = services.reviews.create(bia.id, recipe.id, stars(5), &cancel).await;
    assert!(matches!(again, Err(ApplicationError::Conflict(_))));

    let missing = services.reviews.create(bia.id, RecipeId::new(), stars(5), &cancel).await;
    assert!(matches!(missing, Err(ApplicationError::NotFound(_))));

    let out_of_range = services.reviews.create(ana.id, recipe.id, stars(6), &cancel).await;
    assert!(matches!(out_of_range, Err(ApplicationError::ValidationFailed(_))));

    let found = services
        .reviews
        .user_review_for_recipe(bia.id, recipe.id, &cancel)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, review.id);
    assert_eq!(found.author.as_ref().map(|a| a.username.as_str()), Some("bia"));
}

#[tokio::test]
async fn test_only_the_author_changes_a_review() {
    let (services, _clock) = setup();
    let cancel = CancellationToken::new();
    let ana = register(&services, "ana").await;
    let bia = register(&services, "bia").await;
    let recipe = publish(&services, &ana, "Acarajé").await;
    let review = services
        .reviews
        .create(bia.id, recipe.id, stars(2), &cancel)
        .await
        .unwrap();

    let by_stranger = services
        .reviews
        .update(review.id, ana.id, stars(5), &cancel)
        .await
        .unwrap();
    assert!(by_stranger.is_none());
    assert!(!services.reviews.delete(review.id, ana.id, &cancel).await.unwrap());

    let revised = services
        .reviews
        .update(review.id, bia.id, stars(3), &cancel)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(revised.rating, 3);

    assert!(services.reviews.delete(review.id, bia.id, &cancel).await.unwrap());
    assert!(services.reviews.get_by_id(review.id, &cancel).await.unwrap().is_none());

    // the slot is free again once the review is gone
    services
        .reviews
        .create(bia.id, recipe.id, stars(5), &cancel)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_average_rating() {
    let (services, _clock) = setup();
    let cancel = CancellationToken::new();
    let ana = register(&services, "ana").await;
    let recipe = publish(&services, &ana, "Cuscuz").await;

    assert_eq!(services.reviews.average_rating(recipe.id, &cancel).await.unwrap(), 0.0);

    for (name, rating) in [("bia", 5), ("caio", 3), ("duda", 4)] {
        let reviewer = register(&services, name).await;
        services
            .reviews
            .create(reviewer.id, recipe.id, stars(rating), &cancel)
            .await
            .unwrap();
    }
    assert_eq!(services.reviews.average_rating(recipe.id, &cancel).await.unwrap(), 4.0);
    assert_eq!(services.reviews.count_for_recipe(recipe.id, &cancel).await.unwrap(), 3);

    let page = services
        .reviews
        .by_recipe(recipe.id, PaginationRequest::default(), &cancel)
        .await
        .unwrap();
    assert_eq!(page.total_items, 3);
    assert!(page.items.iter().all(|r| r.author.is_some()));
}

#[tokio::test]
async fn test_reviews_by_user_include_recipe() {
    let (services, _clock) = setup();
    let cancel = CancellationToken::new();
    let ana = register(&services, "ana").await;
    let bia = register(&services, "bia").await;
    let recipe = publish(&services, &ana, "Baião de Dois").await;
    services
        .reviews
        .create(bia.id, recipe.id, stars(5), &cancel)
        .await
        .unwrap();

    let page = services
        .reviews
        .by_user(bia.id, PaginationRequest::default(), &cancel)
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(
        page.items[0].recipe.as_ref().map(|r| r.slug.as_str()),
        Some("baio-de-dois")
    );
}

#[tokio::test]
async fn test_usernames_are_unique_ignoring_case() {
    let (services, _clock) = setup();
    let cancel = CancellationToken::new();
    let ana = register(&services, "ana").await;

    let clash = services
        .users
        .create(user_draft("ANA", "Outra Ana"), UserRole::User, &cancel)
        .await;
    assert!(matches!(clash, Err(ApplicationError::Conflict(_))));

    let found = services.users.get_by_username("Ana", &cancel).await.unwrap().unwrap();
    assert_eq!(found.id, ana.id);
    assert!(services.users.get_by_username("an", &cancel).await.unwrap().is_none());

    let bia = register(&services, "bia").await;
    let taken = services
        .users
        .update(bia.id, user_draft("Ana", "Bia Souza"), &cancel)
        .await;
    assert!(matches!(taken, Err(ApplicationError::Conflict(_))));

    let renamed = services
        .users
        .update(bia.id, user_draft("beatriz", "Beatriz Souza"), &cancel)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(renamed.username, "beatriz");
    assert_eq!(services.users.count(&cancel).await.unwrap(), 2);
}

#[tokio::test]
async fn test_user_filter() {
    let (services, clock) = setup();
    let cancel = CancellationToken::new();
    let ana = register(&services, "ana").await;
    clock.advance_secs(1);
    let bia = register(&services, "bia").await;
    clock.advance_secs(1);
    let caio = services
        .users
        .create(user_draft("caio", "Caio Admin"), UserRole::Admin, &cancel)
        .await
        .unwrap();

    publish(&services, &bia, "Moqueca").await;
    publish(&services, &bia, "Bobó").await;
    let draft = RecipeDraft {
        is_published: false,
        ..RecipeBuilder::new().with_title("Rascunho").draft()
    };
    services.recipes.create(caio.id, draft, &cancel).await.unwrap();

    let ids = |page: &recipe_hub_common::PaginatedResult<User>| -> Vec<_> {
        page.items.iter().map(|u| u.id).collect()
    };

    let newest = services.users.filter(&UserFilter::default(), &cancel).await.unwrap();
    assert_eq!(ids(&newest), [caio.id, bia.id, ana.id]);

    let publishers = UserFilter {
        has_published_recipes: Some(true),
        ..UserFilter::default()
    };
    let page = services.users.filter(&publishers, &cancel).await.unwrap();
    assert_eq!(ids(&page), [bia.id]);
    assert_eq!(page.items[0].recipes.len(), 2);

    let silent = UserFilter {
        has_published_recipes: Some(false),
        order_by: UserOrder::Username,
        direction: SortDirection::Asc,
        ..UserFilter::default()
    };
    let page = services.users.filter(&silent, &cancel).await.unwrap();
    assert_eq!(ids(&page), [ana.id, caio.id]);

    let busiest = UserFilter {
        order_by: UserOrder::RecipeCount,
        ..UserFilter::default()
    };
    let page = services.users.filter(&busiest, &cancel).await.unwrap();
    assert_eq!(page.items[0].id, bia.id);
    assert_eq!(page.items[1].id, caio.id);

    let admins = UserFilter {
        role: Some(UserRole::Admin),
        ..UserFilter::default()
    };
    assert_eq!(ids(&services.users.filter(&admins, &cancel).await.unwrap()), [caio.id]);

    let search = UserFilter {
        search: Some("SOUZA".to_string()),
        order_by: UserOrder::FullName,
        direction: SortDirection::Asc,
        ..UserFilter::default()
    };
    assert_eq!(
        ids(&services.users.filter(&search, &cancel).await.unwrap()),
        [ana.id, bia.id]
    );
}

#[tokio::test]
async fn test_user_detail_loads_activity() {
    let (services, _clock) = setup();
    let cancel = CancellationToken::new();
    let ana = register(&services, "ana").await;
    let bia = register(&services, "bia").await;
    let recipe = publish(&services, &ana, "Escondidinho").await;
    services.favorites.add(bia.id, recipe.id, &cancel).await.unwrap();
    services
        .reviews
        .create(bia.id, recipe.id, stars(5), &cancel)
        .await
        .unwrap();

    let detail = services.users.get_by_id(bia.id, &cancel).await.unwrap().unwrap();
    assert!(detail.recipes.is_empty());
    assert_eq!(detail.favorites.len(), 1);
    assert_eq!(detail.reviews.len(), 1);

    assert!(services.users.delete(bia.id, &cancel).await.unwrap());
    assert!(services.users.get_by_id(bia.id, &cancel).await.unwrap().is_none());
}

#[tokio::test]
async fn test_category_catalog() {
    let (services, _clock) = setup();
    let cancel = CancellationToken::new();
    let category = |name: &str| CategoryDraft {
        name: name.to_string(),
        description: None,
    };

    let doces = services.categories.create(category("Doces"), &cancel).await.unwrap();
    services.categories.create(category("Salgados"), &cancel).await.unwrap();
    let blank = services.categories.create(category("  "), &cancel).await;
    assert!(matches!(blank, Err(ApplicationError::InvalidInput(_))));

    let found = services.categories.get_by_name("oce", &cancel).await.unwrap().unwrap();
    assert_eq!(found.id, doces.id);
    assert!(services.categories.get_by_name("bebidas", &cancel).await.unwrap().is_none());

    let renamed = services
        .categories
        .update(doces.id, category("Doces e Sobremesas"), &cancel)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(renamed.name, "Doces e Sobremesas");

    assert!(services.categories.delete(doces.id, &cancel).await.unwrap());
    assert_eq!(services.categories.count(&cancel).await.unwrap(), 1);
    assert_eq!(services.categories.list_all(&cancel).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_tag_catalog() {
    let (services, _clock) = setup();
    let cancel = CancellationToken::new();

    let vegano = services.tags.create(" Vegano ", &cancel).await.unwrap();
    assert_eq!(vegano.name, "Vegano");
    let duplicate = services.tags.create("VEGANO", &cancel).await;
    assert!(matches!(duplicate, Err(ApplicationError::Conflict(_))));

    let rapido = services.tags.create("Rápido", &cancel).await.unwrap();
    let clash = services.tags.update(rapido.id, "vegano", &cancel).await;
    assert!(matches!(clash, Err(ApplicationError::Conflict(_))));

    let found = services.tags.get_by_name("GAN", &cancel).await.unwrap().unwrap();
    assert_eq!(found.id, vegano.id);

    let page = services
        .tags
        .page(PaginationRequest::new(1, 1), &cancel)
        .await
        .unwrap();
    assert_eq!(page.total_pages, 2);

    assert!(services.tags.delete(vegano.id, &cancel).await.unwrap());
    services.tags.create("vegano", &cancel).await.unwrap();
}
