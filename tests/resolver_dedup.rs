//! Resolver convergence under concurrent selection of the same catalog
//! entry, including a deterministic exercise of the recovery read after a
//! lost insert race.

use std::sync::Arc;

use async_trait::async_trait;
use bookpitch::catalog::{Catalog, CatalogError, MockCatalog};
use bookpitch::models::{BookMetadata, CatalogEntry};
use bookpitch::store::{BookStore, NewBook};
use bookpitch::BookResolver;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

fn dune_metadata() -> BookMetadata {
    BookMetadata::new("Dune", "Frank Herbert", "/works/OL45883W")
        .cover_url(Some("https://covers.openlibrary.org/b/id/12345-M.jpg".into()))
        .published_year(Some(1965))
}

async fn key_count(store: &BookStore, key: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM books WHERE open_library_key = ?")
        .bind(key)
        .fetch_one(store.pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn concurrent_resolves_converge_on_one_row() {
    let dir = tempfile::tempdir().unwrap();
    let store = BookStore::open(&dir.path().join("books.db")).await.unwrap();
    let catalog = Arc::new(MockCatalog::new());
    catalog.set_description(Some("A desert planet epic.".into()));
    let resolver = BookResolver::new(catalog, store.clone());

    let mut handles = Vec::new();
    for _ in 0..4 {
        let resolver = resolver.clone();
        handles.push(tokio::spawn(
            async move { resolver.resolve(dune_metadata()).await },
        ));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap().id);
    }

    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 1, "all resolvers must observe the same row");
    assert_eq!(key_count(&store, "/works/OL45883W").await, 1);
}

#[tokio::test]
async fn existing_key_short_circuits_without_insert() {
    let store = BookStore::open_in_memory().await.unwrap();
    let catalog = Arc::new(MockCatalog::new());
    catalog.set_description(Some("Only fetched on the create path.".into()));
    let resolver = BookResolver::new(Arc::clone(&catalog) as Arc<dyn Catalog>, store.clone());

    let created = resolver.resolve(dune_metadata()).await.unwrap();
    assert_eq!(catalog.description_count(), 1);

    let resolved = resolver.resolve(dune_metadata()).await.unwrap();
    assert_eq!(resolved.id, created.id);
    assert_eq!(resolved.slug, created.slug);

    // Fast path: no second description fetch, no second row
    assert_eq!(catalog.description_count(), 1);
    assert_eq!(key_count(&store, "/works/OL45883W").await, 1);
}

/// A catalog whose description fetch blocks until the test releases it,
/// pinning a resolver between its miss lookup and its insert.
#[derive(Debug)]
struct HandshakeCatalog {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl Catalog for HandshakeCatalog {
    fn id(&self) -> &str {
        "handshake"
    }

    fn name(&self) -> &str {
        "Handshake Catalog"
    }

    async fn search(
        &self,
        _query: &str,
        _cancel: &CancellationToken,
    ) -> Result<Vec<CatalogEntry>, CatalogError> {
        Ok(Vec::new())
    }

    async fn fetch_description(&self, _key: &str) -> Option<String> {
        self.entered.notify_one();
        self.release.notified().await;
        None
    }
}

#[tokio::test]
async fn lost_insert_race_recovers_the_winner_row() {
    let store = BookStore::open_in_memory().await.unwrap();
    let catalog = Arc::new(HandshakeCatalog {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let resolver = BookResolver::new(Arc::clone(&catalog) as Arc<dyn Catalog>, store.clone());

    let loser = {
        let resolver = resolver.clone();
        tokio::spawn(async move { resolver.resolve(dune_metadata()).await })
    };

    // The loser has passed its miss lookup and is now parked in the
    // description fetch; insert the winner row behind its back.
    catalog.entered.notified().await;
    let winner = store
        .insert(NewBook {
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            open_library_key: Some("/works/OL45883W".to_string()),
            cover_url: None,
            published_year: Some(1965),
            description: Some("Winner's copy.".to_string()),
            slug: "dune".to_string(),
        })
        .await
        .unwrap();
    catalog.release.notify_one();

    let resolved = loser.await.unwrap().unwrap();
    assert_eq!(resolved.id, winner.id);
    assert_eq!(resolved.description.as_deref(), Some("Winner's copy."));
    assert_eq!(key_count(&store, "/works/OL45883W").await, 1);
}

#[tokio::test]
async fn store_failure_surfaces_as_error_string() {
    let store = BookStore::open_in_memory().await.unwrap();
    let catalog = Arc::new(MockCatalog::new());
    let resolver = BookResolver::new(catalog, store.clone());

    store.pool().close().await;

    let err = resolver.resolve(dune_metadata()).await.unwrap_err();
    assert!(err.to_string().starts_with("store failure"));
}
