//! Recipe service behaviour over the in-memory store: slugs, tag resolution,
//! filtered listings and soft deletion.

use async_trait::async_trait;
use parking_lot::Mutex;
use recipe_hub_application::{
    ApplicationError, RecipeFilter, RecipeSort, ServiceConfig, Services,
};
use recipe_hub_common::{Clock, PaginatedResult, PaginationConfig, PaginationRequest, SortDirection};
use recipe_hub_domain::{
    CategoryDraft, Entity, Recipe, RecipeDraft, RecipeId, User, UserDraft, UserId, UserRole,
};
use recipe_hub_infrastructure::{
    DocumentStore, MemoryStore, Persistence, Result as StoreResult, RowStream, RowWrite,
    StoredRow, Visibility, WriteBatch, WriteKind,
};
use recipe_hub_testing::{builders::*, fixtures::*, mocks::ManualClock};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

fn setup() -> (Services, ManualClock) {
    let clock = ManualClock::default();
    let persistence = Persistence::in_memory(Arc::new(clock.clone()));
    (Services::new(persistence, ServiceConfig::default()), clock)
}

async fn register(services: &Services, username: &str) -> User {
    let draft = UserDraft {
        username: username.to_string(),
        full_name: format!("{username} da Silva"),
        avatar_image_id: None,
    };
    services
        .users
        .create(draft, UserRole::User, &CancellationToken::new())
        .await
        .unwrap()
}

fn draft(title: &str) -> RecipeDraft {
    RecipeBuilder::new().with_title(title).draft()
}

fn tagged(title: &str, tags: &[&str]) -> RecipeDraft {
    RecipeDraft {
        tags: tags.iter().map(|t| t.to_string()).collect(),
        ..draft(title)
    }
}

#[tokio::test]
async fn test_create_assigns_unique_slugs() {
    let (services, clock) = setup();
    let cancel = CancellationToken::new();
    let author = register(&services, "ana").await;

    let first = services
        .recipes
        .create(author.id, draft("Bolo de Cenoura"), &cancel)
        .await
        .unwrap();
    clock.advance_secs(1);
    let second = services
        .recipes
        .create(author.id, draft("Bolo de  Cenoura!"), &cancel)
        .await
        .unwrap();

    assert_eq!(first.slug, "bolo-de-cenoura");
    assert_eq!(second.slug, "bolo-de-cenoura-2");
    assert_eq!(second.user_id, author.id);

    let found = services
        .recipes
        .get_by_slug("bolo-de-cenoura-2", &cancel)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, second.id);
}

#[tokio::test]
async fn test_create_requires_known_author_and_category() {
    let (services, _clock) = setup();
    let cancel = CancellationToken::new();

    let missing_author = services
        .recipes
        .create(UserId::new(), draft("Pudim"), &cancel)
        .await;
    assert!(matches!(missing_author, Err(ApplicationError::NotFound(_))));

    let author = register(&services, "ana").await;
    let orphan = RecipeDraft {
        category_id: Some(CategoryBuilder::new().build().id),
        ..draft("Pudim")
    };
    let missing_category = services.recipes.create(author.id, orphan, &cancel).await;
    assert!(matches!(missing_category, Err(ApplicationError::NotFound(_))));
    assert_eq!(services.recipes.count(&cancel).await.unwrap(), 0);
}

#[tokio::test]
async fn test_create_rejects_blank_title() {
    let (services, _clock) = setup();
    let author = register(&services, "ana").await;

    let result = services
        .recipes
        .create(author.id, draft("   "), &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(ApplicationError::ValidationFailed(_))));
}

#[tokio::test]
async fn test_tags_are_created_once_and_reused_ignoring_case() {
    let (services, clock) = setup();
    let cancel = CancellationToken::new();
    let author = register(&services, "ana").await;

    let first = services
        .recipes
        .create(author.id, tagged("Brigadeiro", &["Doce", "doce ", "Festa"]), &cancel)
        .await
        .unwrap();
    assert_eq!(first.tag_ids.len(), 2);
    assert_eq!(services.tags.count(&cancel).await.unwrap(), 2);

    clock.advance_secs(1);
    let second = services
        .recipes
        .create(author.id, tagged("Beijinho", &["DOCE"]), &cancel)
        .await
        .unwrap();
    assert_eq!(services.tags.count(&cancel).await.unwrap(), 2);
    assert_eq!(second.tag_ids, vec![first.tag_ids[0]]);

    let detail = services
        .recipes
        .get_by_id(first.id, &cancel)
        .await
        .unwrap()
        .unwrap();
    let mut names: Vec<_> = detail.tags.iter().map(|t| t.name.as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, ["Doce", "Festa"]);
    assert_eq!(detail.author.as_ref().map(|a| a.id), Some(author.id));
}

#[tokio::test]
async fn test_list_filters_and_sorts() {
    let (services, clock) = setup();
    let cancel = CancellationToken::new();
    let author = register(&services, "ana").await;
    let other = register(&services, "bia").await;

    let recipes = [
        (author.id, "Feijoada", Some(240), true, vec!["Almoço"]),
        (author.id, "Salada", Some(10), true, vec!["Leve", "Almoço"]),
        (other.id, "Sopa", Some(40), false, vec!["Leve"]),
        (other.id, "Torrada", None, true, vec![]),
    ];
    for (user_id, title, prep_time, published, tags) in recipes {
        let draft = RecipeDraft {
            prep_time,
            is_published: published,
            ..tagged(title, &tags)
        };
        services.recipes.create(user_id, draft, &cancel).await.unwrap();
        clock.advance_secs(1);
    }

    let titles = |page: &PaginatedResult<Recipe>| -> Vec<String> {
        page.items.iter().map(|r| r.title.clone()).collect()
    };

    let newest_first = services
        .recipes
        .list(&RecipeFilter::default(), &cancel)
        .await
        .unwrap();
    assert_eq!(titles(&newest_first), ["Torrada", "Sopa", "Salada", "Feijoada"]);

    let light = RecipeFilter {
        tags: vec!["leve".to_string()],
        sort_by: RecipeSort::Title,
        direction: SortDirection::Asc,
        ..RecipeFilter::default()
    };
    let page = services.recipes.list(&light, &cancel).await.unwrap();
    assert_eq!(titles(&page), ["Salada", "Sopa"]);

    let quick_and_public = RecipeFilter {
        max_prep_time: Some(60),
        is_published: Some(true),
        ..RecipeFilter::default()
    };
    let page = services.recipes.list(&quick_and_public, &cancel).await.unwrap();
    assert_eq!(titles(&page), ["Salada"]);

    let unknown_tag = RecipeFilter {
        tags: vec!["sobremesa".to_string()],
        ..RecipeFilter::default()
    };
    let page = services.recipes.list(&unknown_tag, &cancel).await.unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total_items, 0);

    let by_prep_time = RecipeFilter {
        user_id: Some(author.id),
        sort_by: RecipeSort::PrepTime,
        direction: SortDirection::Asc,
        ..RecipeFilter::default()
    };
    let page = services.recipes.list(&by_prep_time, &cancel).await.unwrap();
    assert_eq!(titles(&page), ["Salada", "Feijoada"]);
    assert!(page.items.iter().all(|r| r.author.is_some()));

    let search = services
        .recipes
        .search("SOP", PaginationRequest::default(), &cancel)
        .await
        .unwrap();
    assert_eq!(titles(&search), ["Sopa"]);

    assert_eq!(services.recipes.count_published(&cancel).await.unwrap(), 3);
    assert_eq!(services.recipes.count_by_user(other.id, &cancel).await.unwrap(), 2);
}

#[tokio::test]
async fn test_published_pages() {
    let (services, clock) = setup();
    let cancel = CancellationToken::new();
    let author = register(&services, "ana").await;

    for n in 1..=12 {
        services
            .recipes
            .create(author.id, draft(&format!("Receita {n}")), &cancel)
            .await
            .unwrap();
        clock.advance_secs(1);
    }

    let page = services
        .recipes
        .published(PaginationRequest::new(2, 5), &cancel)
        .await
        .unwrap();
    assert_eq!(page.total_items, 12);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.items.len(), 5);
    assert_eq!(page.items[0].title, "Receita 7");
}

#[tokio::test]
async fn test_by_category() {
    let (services, _clock) = setup();
    let cancel = CancellationToken::new();
    let author = register(&services, "ana").await;
    let dessert = services
        .categories
        .create(
            CategoryDraft {
                name: "Sobremesas".to_string(),
                description: None,
            },
            &cancel,
        )
        .await
        .unwrap();

    let pudim = RecipeDraft {
        category_id: Some(dessert.id),
        ..draft("Pudim")
    };
    services.recipes.create(author.id, pudim, &cancel).await.unwrap();
    services.recipes.create(author.id, draft("Arroz"), &cancel).await.unwrap();

    let page = services
        .recipes
        .by_category(dessert.id, PaginationRequest::default(), &cancel)
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(
        page.items[0].category.as_ref().map(|c| c.name.as_str()),
        Some("Sobremesas")
    );
}

#[tokio::test]
async fn test_update_keeps_own_slug_and_follows_title() {
    let (services, clock) = setup();
    let cancel = CancellationToken::new();
    let author = register(&services, "ana").await;

    let recipe = services
        .recipes
        .create(author.id, draft("Quindim"), &cancel)
        .await
        .unwrap();
    clock.advance_secs(60);

    let same_title = RecipeDraft {
        servings: Some(8),
        ..draft("Quindim")
    };
    let updated = services
        .recipes
        .update(recipe.id, same_title, &cancel)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.slug, "quindim");
    assert_eq!(updated.servings, Some(8));
    assert_eq!(updated.lifecycle.created_at(), recipe.lifecycle.created_at());

    let stored = services
        .recipes
        .get_by_id(recipe.id, &cancel)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.lifecycle.updated_at(), Some(clock.now()));

    let renamed = services
        .recipes
        .update(recipe.id, draft("Quindim de Coco"), &cancel)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(renamed.slug, "quindim-de-coco");

    let missing = services
        .recipes
        .update(RecipeId::new(), draft("X"), &cancel)
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_delete_hides_recipe_and_releases_slug() {
    let (services, clock) = setup();
    let cancel = CancellationToken::new();
    let author = register(&services, "ana").await;

    let recipe = services
        .recipes
        .create(author.id, draft("Coxinha"), &cancel)
        .await
        .unwrap();
    assert!(services.recipes.delete(recipe.id, &cancel).await.unwrap());
    assert!(!services.recipes.delete(recipe.id, &cancel).await.unwrap());

    assert!(services.recipes.get_by_id(recipe.id, &cancel).await.unwrap().is_none());
    assert!(services.recipes.get_by_slug("coxinha", &cancel).await.unwrap().is_none());
    assert_eq!(services.recipes.count(&cancel).await.unwrap(), 0);

    clock.advance_secs(1);
    let again = services
        .recipes
        .create(author.id, draft("Coxinha"), &cancel)
        .await
        .unwrap();
    assert_eq!(again.slug, "coxinha");
}

#[tokio::test]
async fn test_set_published() {
    let (services, _clock) = setup();
    let cancel = CancellationToken::new();
    let author = register(&services, "ana").await;
    let recipe = services
        .recipes
        .create(author.id, draft("Pastel"), &cancel)
        .await
        .unwrap();

    assert!(services.recipes.set_published(recipe.id, false, &cancel).await.unwrap());
    assert_eq!(services.recipes.count_published(&cancel).await.unwrap(), 0);
    assert!(!services
        .recipes
        .set_published(RecipeId::new(), true, &cancel)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_cancelled_create_writes_nothing() {
    let (services, _clock) = setup();
    let author = register(&services, "ana").await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = services.recipes.create(author.id, draft("Pamonha"), &cancel).await;
    assert!(matches!(result, Err(ApplicationError::Cancelled)));

    let fresh = CancellationToken::new();
    assert_eq!(services.recipes.count(&fresh).await.unwrap(), 0);
}

/// Commits a rival batch right before the next commit it receives.
#[derive(Debug, Default)]
struct RacingStore {
    inner: MemoryStore,
    rival: Mutex<Option<WriteBatch>>,
}

impl RacingStore {
    fn arm(&self, rival: &Recipe) {
        let mut batch = WriteBatch::new();
        batch.push(RowWrite {
            table: Recipe::TABLE,
            kind: WriteKind::Insert,
            row: StoredRow::encode(rival).unwrap(),
            unique_keys: rival.unique_keys(),
        });
        *self.rival.lock() = Some(batch);
    }
}

#[async_trait]
impl DocumentStore for RacingStore {
    fn scan(&self, table: &'static str, visibility: Visibility) -> RowStream<'_> {
        self.inner.scan(table, visibility)
    }

    async fn fetch(&self, table: &'static str, id: Uuid) -> StoreResult<Option<StoredRow>> {
        self.inner.fetch(table, id).await
    }

    async fn commit(&self, batch: WriteBatch, cancel: &CancellationToken) -> StoreResult<u64> {
        let rival = self.rival.lock().take();
        if let Some(rival) = rival {
            self.inner.commit(rival, cancel).await?;
        }
        self.inner.commit(batch, cancel).await
    }
}

#[tokio::test]
async fn test_lost_slug_race_is_retried_with_next_suffix() {
    let clock = ManualClock::default();
    let store = Arc::new(RacingStore::default());
    let persistence = Persistence::new(
        store.clone(),
        Arc::new(clock.clone()),
        PaginationConfig::default(),
    );
    let services = Services::new(persistence, ServiceConfig::default());
    let cancel = CancellationToken::new();
    let author = register(&services, "ana").await;

    let rival = RecipeBuilder::new()
        .with_title("Moqueca")
        .by(author.id)
        .build_at(clock.now());
    store.arm(&rival);

    let recipe = services
        .recipes
        .create(author.id, draft("Moqueca"), &cancel)
        .await
        .unwrap();
    assert_eq!(recipe.slug, "moqueca-2");
    assert_eq!(services.recipes.count(&cancel).await.unwrap(), 2);
}

#[tokio::test]
async fn test_random_recipes_get_distinct_slugs_and_page_totals() {
    let (services, clock) = setup();
    let cancel = CancellationToken::new();
    let author = services
        .users
        .create(random_user_draft(), UserRole::User, &cancel)
        .await
        .unwrap();

    let repeated = random_recipe_draft().title;
    let mut slugs = HashSet::new();
    for n in 0..12 {
        // every third recipe reuses one title
        let draft = if n % 3 == 0 {
            RecipeDraft {
                title: repeated.clone(),
                ..random_recipe_draft()
            }
        } else {
            random_recipe_draft()
        };
        clock.advance_secs(1);
        let recipe = services.recipes.create(author.id, draft, &cancel).await.unwrap();
        assert!(slugs.insert(recipe.slug.clone()), "slug {} handed out twice", recipe.slug);
    }

    let page = services
        .recipes
        .published(PaginationRequest::new(3, 5), &cancel)
        .await
        .unwrap();
    assert_eq!(page.total_items, 12);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.items.len(), 2);
    assert_eq!(services.recipes.count_by_user(author.id, &cancel).await.unwrap(), 12);
}
