//! Catalog clients with a trait-based seam.
//!
//! [`Catalog`] is the interface the search controller and the book resolver
//! consume. [`OpenLibrarySource`] is the production implementation;
//! [`MockCatalog`] backs deterministic tests.

mod open_library;

pub mod mock;

pub use mock::MockCatalog;
pub use open_library::{cover_url, CoverSize, OpenLibrarySource};

use crate::models::CatalogEntry;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Interface to an external bibliographic catalog.
#[async_trait]
pub trait Catalog: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this catalog (used in logs and tool output)
    fn id(&self) -> &str;

    /// Human-readable name of this catalog
    fn name(&self) -> &str;

    /// Search the catalog for works matching the query.
    ///
    /// Returns [`CatalogError::Cancelled`] when the token fires before the
    /// round trip completes; callers must treat that as a no-op, not as an
    /// error-state change.
    async fn search(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<CatalogEntry>, CatalogError>;

    /// Fetch the long-form description for a work, best effort.
    ///
    /// Any failure degrades to `None`; the error branch is never
    /// constructed for this call.
    async fn fetch_description(&self, key: &str) -> Option<String>;
}

/// Errors that can occur when talking to a catalog
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// Transport failure or non-2xx status
    #[error("network error: {0}")]
    Network(String),

    /// Response body could not be decoded
    #[error("parse error: {0}")]
    Parse(String),

    /// The cancellation token fired before the request completed
    #[error("request cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CatalogError::Parse(err.to_string())
        } else {
            CatalogError::Network(err.to_string())
        }
    }
}
