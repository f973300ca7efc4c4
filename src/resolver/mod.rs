//! Get-or-create resolution of catalog metadata to one persisted book.
//!
//! Independent sessions may select the same catalog entry at the same
//! time. The store's unique constraint on `open_library_key` is the sole
//! serialization point: the resolver looks up first as a fast path, but
//! the recovery read after a duplicate-key insert failure is what actually
//! enforces convergence. Losing the insert race is an expected outcome,
//! not a failure.

use std::sync::Arc;
use tracing::debug;

use crate::catalog::Catalog;
use crate::models::{Book, BookMetadata};
use crate::store::{BookStore, InsertError, NewBook};
use crate::utils::{key_suffix, slugify};

/// Resolution failures that reach the caller
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Persistence failure other than the recoverable key conflict
    #[error("store failure: {0}")]
    Store(String),
}

/// Resolves selected catalog entries to canonical persisted books.
#[derive(Debug, Clone)]
pub struct BookResolver {
    catalog: Arc<dyn Catalog>,
    store: BookStore,
}

impl BookResolver {
    /// Create a resolver over the given catalog and store.
    pub fn new(catalog: Arc<dyn Catalog>, store: BookStore) -> Self {
        Self { catalog, store }
    }

    /// Return the canonical book for this catalog key, creating it on
    /// first selection.
    ///
    /// Concurrent calls for one key converge on exactly one row; which
    /// caller's insert wins is unspecified, but every caller observes the
    /// same final row.
    pub async fn resolve(&self, metadata: BookMetadata) -> Result<Book, ResolveError> {
        let key = metadata.open_library_key.clone();

        if let Some(existing) = self
            .store
            .find_by_key(&key)
            .await
            .map_err(|e| ResolveError::Store(e.to_string()))?
        {
            debug!(key = %key, id = %existing.id, "book already resolved");
            return Ok(existing);
        }

        // Create path: the description is fetched lazily, only for rows we
        // are about to insert.
        let description = self.catalog.fetch_description(&key).await;

        let slug = match slugify(&metadata.title) {
            s if s.is_empty() => key_suffix(&key),
            s => s,
        };

        let new = NewBook {
            title: metadata.title,
            author: metadata.author,
            open_library_key: Some(key.clone()),
            cover_url: sanitize_cover_url(metadata.cover_url),
            published_year: metadata.published_year,
            description,
            slug: slug.clone(),
        };

        match self.store.insert(new.clone()).await {
            Ok(book) => Ok(book),
            Err(InsertError::DuplicateKey) => self.recover(&key).await,
            Err(InsertError::DuplicateSlug) => {
                // A different key already took this slug; retry once with a
                // deterministic per-key suffix.
                let disambiguated = format!("{}-{}", slug, key_suffix(&key));
                debug!(key = %key, slug = %disambiguated, "slug taken, retrying");
                let retry = NewBook {
                    slug: disambiguated,
                    ..new
                };
                match self.store.insert(retry).await {
                    Ok(book) => Ok(book),
                    Err(InsertError::DuplicateKey) => self.recover(&key).await,
                    Err(err) => Err(ResolveError::Store(err.to_string())),
                }
            }
            Err(err) => Err(ResolveError::Store(err.to_string())),
        }
    }

    /// A concurrent caller won the insert race; their row is the canonical
    /// one.
    async fn recover(&self, key: &str) -> Result<Book, ResolveError> {
        debug!(key = %key, "lost insert race, reading winner row");
        match self
            .store
            .find_by_key(key)
            .await
            .map_err(|e| ResolveError::Store(e.to_string()))?
        {
            Some(book) => Ok(book),
            None => Err(ResolveError::Store(format!(
                "winner row for {} disappeared during recovery",
                key
            ))),
        }
    }
}

/// Only absolute http/https URLs are stored; anything else becomes NULL.
fn sanitize_cover_url(url: Option<String>) -> Option<String> {
    url.filter(|u| u.starts_with("http://") || u.starts_with("https://"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MockCatalog;
    use crate::store::BookStore;

    fn metadata(key: &str, title: &str) -> BookMetadata {
        BookMetadata::new(title, "Frank Herbert", key)
    }

    #[test]
    fn test_sanitize_cover_url() {
        assert_eq!(
            sanitize_cover_url(Some("https://covers.openlibrary.org/b/id/1-M.jpg".into())),
            Some("https://covers.openlibrary.org/b/id/1-M.jpg".to_string())
        );
        assert_eq!(sanitize_cover_url(Some("obsidian://vault/cover.png".into())), None);
        assert_eq!(sanitize_cover_url(Some("/relative/cover.jpg".into())), None);
        assert_eq!(sanitize_cover_url(None), None);
    }

    #[tokio::test]
    async fn test_create_then_fast_path() {
        let catalog = Arc::new(MockCatalog::new());
        catalog.set_description(Some("A desert planet epic.".into()));
        let store = BookStore::open_in_memory().await.unwrap();
        let resolver = BookResolver::new(catalog, store);

        let first = resolver
            .resolve(metadata("/works/OL45883W", "Dune"))
            .await
            .unwrap();
        assert_eq!(first.slug, "dune");
        assert_eq!(first.description.as_deref(), Some("A desert planet epic."));

        let second = resolver
            .resolve(metadata("/works/OL45883W", "Dune"))
            .await
            .unwrap();
        assert_eq!(second.id, first.id);
    }

    #[tokio::test]
    async fn test_description_failure_degrades_to_null() {
        let catalog = Arc::new(MockCatalog::new());
        catalog.set_description(None);
        let store = BookStore::open_in_memory().await.unwrap();
        let resolver = BookResolver::new(catalog, store);

        let book = resolver
            .resolve(metadata("/works/OL1W", "Dune"))
            .await
            .unwrap();
        assert!(book.description.is_none());
    }

    #[tokio::test]
    async fn test_slug_collision_gets_key_suffix() {
        let catalog = Arc::new(MockCatalog::new());
        let store = BookStore::open_in_memory().await.unwrap();
        let resolver = BookResolver::new(catalog, store);

        let first = resolver
            .resolve(metadata("/works/OL1W", "Dune"))
            .await
            .unwrap();
        let second = resolver
            .resolve(metadata("/works/OL2W", "Dune!"))
            .await
            .unwrap();

        assert_eq!(first.slug, "dune");
        assert_eq!(second.slug, "dune-ol2w");
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_punctuation_only_title_falls_back_to_key() {
        let catalog = Arc::new(MockCatalog::new());
        let store = BookStore::open_in_memory().await.unwrap();
        let resolver = BookResolver::new(catalog, store);

        let book = resolver
            .resolve(metadata("/works/OL9W", "!!!"))
            .await
            .unwrap();
        assert_eq!(book.slug, "ol9w");
    }
}
