//! Book models: the ephemeral catalog entry and the persisted book row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single result from a catalog search.
///
/// Entries are ephemeral: they live for one render of a result list and,
/// on selection, are turned into [`BookMetadata`] for the resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Opaque external key, e.g. `/works/OL45883W`
    pub key: String,

    /// Work title
    pub title: String,

    /// Primary author
    pub author: String,

    /// First publication year, when the catalog knows it
    pub first_publish_year: Option<i64>,

    /// Numeric cover id for constructing image URLs
    pub cover_id: Option<i64>,
}

/// A persisted book row.
///
/// Created once by the resolver on first selection of a catalog key and
/// never mutated or deleted by this crate afterwards. At most one row
/// exists per non-null `open_library_key`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Book {
    /// Generated row id (UUID v4)
    pub id: String,

    /// Book title
    pub title: String,

    /// Primary author
    pub author: String,

    /// External catalog key; unique when present
    pub open_library_key: Option<String>,

    /// Absolute http/https cover image URL, or None
    pub cover_url: Option<String>,

    /// Year of first publication
    pub published_year: Option<i64>,

    /// Long-form description, fetched lazily at creation time
    pub description: Option<String>,

    /// URL-safe identifier derived from the title; unique
    pub slug: String,

    /// Row creation time
    pub created_at: DateTime<Utc>,
}

/// Metadata handed to the resolver when the user selects a search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookMetadata {
    /// Book title
    pub title: String,

    /// Primary author
    pub author: String,

    /// External catalog key used for deduplication
    pub open_library_key: String,

    /// Cover image URL as derived from the catalog entry
    pub cover_url: Option<String>,

    /// Year of first publication
    pub published_year: Option<i64>,
}

impl BookMetadata {
    /// Create metadata with the required fields
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        open_library_key: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            open_library_key: open_library_key.into(),
            cover_url: None,
            published_year: None,
        }
    }

    /// Set the cover URL
    pub fn cover_url(mut self, url: Option<String>) -> Self {
        self.cover_url = url;
        self
    }

    /// Set the publication year
    pub fn published_year(mut self, year: Option<i64>) -> Self {
        self.published_year = year;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_builder() {
        let metadata = BookMetadata::new("Dune", "Frank Herbert", "/works/OL45883W")
            .cover_url(Some("https://covers.openlibrary.org/b/id/12345-M.jpg".into()))
            .published_year(Some(1965));

        assert_eq!(metadata.title, "Dune");
        assert_eq!(metadata.open_library_key, "/works/OL45883W");
        assert_eq!(metadata.published_year, Some(1965));
    }
}
