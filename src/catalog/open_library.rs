//! Open Library catalog implementation.
//!
//! Uses the Open Library search API for free-text author/title queries and
//! the work detail endpoint for long-form descriptions.
//! API documentation: https://openlibrary.org/dev/docs/api/search

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::catalog::{Catalog, CatalogError};
use crate::models::CatalogEntry;
use crate::utils::HttpClient;

const OPEN_LIBRARY_API_BASE: &str = "https://openlibrary.org";
const COVERS_API_BASE: &str = "https://covers.openlibrary.org";

/// Fixed field projection requested from the search endpoint
const SEARCH_FIELDS: &str = "key,title,author_name,first_publish_year,cover_i";

/// Results are capped at one screenful
const SEARCH_LIMIT: usize = 10;

/// Cover image size variants served by the covers host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverSize {
    Small,
    Medium,
    Large,
}

impl CoverSize {
    fn letter(self) -> char {
        match self {
            CoverSize::Small => 'S',
            CoverSize::Medium => 'M',
            CoverSize::Large => 'L',
        }
    }
}

/// Derive a cover image URL from a catalog cover id.
///
/// Pure URL construction, no network. Returns `None` when the entry has no
/// cover id.
pub fn cover_url(cover_id: Option<i64>, size: CoverSize) -> Option<String> {
    cover_id.map(|id| format!("{}/b/id/{}-{}.jpg", COVERS_API_BASE, id, size.letter()))
}

/// Open Library catalog source
#[derive(Debug, Clone)]
pub struct OpenLibrarySource {
    client: HttpClient,
    api_base: String,
}

impl OpenLibrarySource {
    /// Create a new source against the production API
    pub fn new() -> Self {
        Self::with_base_url(OPEN_LIBRARY_API_BASE)
    }

    /// Create a source against a non-default base URL
    pub fn with_base_url(api_base: impl Into<String>) -> Self {
        Self {
            client: HttpClient::new(),
            api_base: api_base.into(),
        }
    }

    fn parse_doc(doc: SearchDoc) -> CatalogEntry {
        let author = doc
            .author_name
            .and_then(|names| names.into_iter().next())
            .unwrap_or_else(|| "Unknown author".to_string());

        CatalogEntry {
            key: doc.key,
            title: doc.title,
            author,
            first_publish_year: doc.first_publish_year,
            cover_id: doc.cover_i,
        }
    }
}

impl Default for OpenLibrarySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Catalog for OpenLibrarySource {
    fn id(&self) -> &str {
        "openlibrary"
    }

    fn name(&self) -> &str {
        "Open Library"
    }

    async fn search(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<CatalogEntry>, CatalogError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!(
            "{}/search.json?q={}&limit={}&fields={}",
            self.api_base,
            urlencoding::encode(query),
            SEARCH_LIMIT,
            SEARCH_FIELDS
        );

        let fetch = async {
            let response = self.client.client().get(&url).send().await?;

            if !response.status().is_success() {
                return Err(CatalogError::Network(format!(
                    "Open Library returned status {}",
                    response.status()
                )));
            }

            let page: SearchPage = response.json().await?;
            let entries: Vec<CatalogEntry> =
                page.docs.into_iter().map(Self::parse_doc).collect();
            Ok(entries)
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(CatalogError::Cancelled),
            outcome = fetch => outcome,
        }
    }

    async fn fetch_description(&self, key: &str) -> Option<String> {
        let url = format!("{}{}.json", self.api_base, key);

        let response = match self.client.client().get(&url).send().await {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!("work detail fetch failed for {}: {}", key, err);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::debug!(
                "work detail for {} returned status {}",
                key,
                response.status()
            );
            return None;
        }

        match response.json::<WorkDetail>().await {
            Ok(detail) => detail.description.map(Description::into_text),
            Err(err) => {
                tracing::debug!("work detail for {} not decodable: {}", key, err);
                None
            }
        }
    }
}

/// Search endpoint response page
#[derive(Debug, Deserialize)]
struct SearchPage {
    #[allow(dead_code)]
    #[serde(rename = "numFound", default)]
    num_found: i64,

    #[allow(dead_code)]
    #[serde(default)]
    start: i64,

    docs: Vec<SearchDoc>,
}

#[derive(Debug, Deserialize)]
struct SearchDoc {
    key: String,
    title: String,
    author_name: Option<Vec<String>>,
    first_publish_year: Option<i64>,
    cover_i: Option<i64>,
}

/// Work detail response; only the description is projected out
#[derive(Debug, Deserialize)]
struct WorkDetail {
    description: Option<Description>,
}

/// Descriptions come back either as a plain string or `{value: string}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Description {
    Text(String),
    Value { value: String },
}

impl Description {
    fn into_text(self) -> String {
        match self {
            Description::Text(text) => text,
            Description::Value { value } => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cover_url_with_id() {
        assert_eq!(
            cover_url(Some(12345), CoverSize::Large),
            Some("https://covers.openlibrary.org/b/id/12345-L.jpg".to_string())
        );
        assert_eq!(
            cover_url(Some(240727), CoverSize::Medium),
            Some("https://covers.openlibrary.org/b/id/240727-M.jpg".to_string())
        );
    }

    #[test]
    fn test_cover_url_without_id() {
        assert_eq!(cover_url(None, CoverSize::Medium), None);
        assert_eq!(cover_url(None, CoverSize::Small), None);
    }

    #[test]
    fn test_parse_doc_takes_primary_author() {
        let doc = SearchDoc {
            key: "/works/OL45883W".into(),
            title: "Dune".into(),
            author_name: Some(vec!["Frank Herbert".into(), "Someone Else".into()]),
            first_publish_year: Some(1965),
            cover_i: Some(12345),
        };

        let entry = OpenLibrarySource::parse_doc(doc);
        assert_eq!(entry.author, "Frank Herbert");
        assert_eq!(entry.first_publish_year, Some(1965));
    }

    #[test]
    fn test_parse_doc_without_authors() {
        let doc = SearchDoc {
            key: "/works/OL1W".into(),
            title: "Anonymous Work".into(),
            author_name: None,
            first_publish_year: None,
            cover_i: None,
        };

        let entry = OpenLibrarySource::parse_doc(doc);
        assert_eq!(entry.author, "Unknown author");
        assert_eq!(entry.cover_id, None);
    }

    #[test]
    fn test_description_shapes() {
        let plain: WorkDetail = serde_json::from_str(r#"{"description": "A classic."}"#).unwrap();
        assert_eq!(
            plain.description.map(Description::into_text),
            Some("A classic.".to_string())
        );

        let wrapped: WorkDetail =
            serde_json::from_str(r#"{"description": {"type": "/type/text", "value": "Wrapped."}}"#)
                .unwrap();
        assert_eq!(
            wrapped.description.map(Description::into_text),
            Some("Wrapped.".to_string())
        );

        let missing: WorkDetail = serde_json::from_str(r#"{"title": "No description"}"#).unwrap();
        assert!(missing.description.is_none());
    }
}
