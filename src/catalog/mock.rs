//! Mock catalog for testing purposes.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::catalog::{Catalog, CatalogError};
use crate::models::CatalogEntry;

/// One scripted search outcome.
#[derive(Debug)]
pub struct ScriptedSearch {
    /// Simulated round-trip time before the outcome is produced
    pub delay: Duration,

    /// What the search resolves to
    pub outcome: Result<Vec<CatalogEntry>, CatalogError>,

    /// When set, the simulated request keeps running even after its
    /// cancellation token fires, modeling the imperfect-cancellation case
    /// where a stale response still arrives.
    pub ignore_cancel: bool,
}

impl ScriptedSearch {
    /// An immediate successful response
    pub fn ok(entries: Vec<CatalogEntry>) -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Ok(entries),
            ignore_cancel: false,
        }
    }

    /// An immediate failure
    pub fn err(error: CatalogError) -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Err(error),
            ignore_cancel: false,
        }
    }

    /// Delay the outcome by the given duration
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Keep running through cancellation
    pub fn ignoring_cancel(mut self) -> Self {
        self.ignore_cancel = true;
        self
    }
}

/// A mock catalog that replays scripted responses in order.
///
/// Searches past the end of the script resolve immediately with an empty
/// result set.
#[derive(Debug, Default)]
pub struct MockCatalog {
    script: Mutex<VecDeque<ScriptedSearch>>,
    queries: Mutex<Vec<String>>,
    descriptions: Mutex<Option<String>>,
    searches: AtomicUsize,
    description_fetches: AtomicUsize,
}

impl MockCatalog {
    /// Create a new mock catalog with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next search outcome.
    pub fn push_search(&self, scripted: ScriptedSearch) {
        self.script.lock().unwrap().push_back(scripted);
    }

    /// Set the description returned by every `fetch_description` call.
    pub fn set_description(&self, description: Option<String>) {
        *self.descriptions.lock().unwrap() = description;
    }

    /// Number of search calls that reached this catalog.
    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    /// Queries received so far, in call order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    /// Number of description fetches that reached this catalog.
    pub fn description_count(&self) -> usize {
        self.description_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Catalog for MockCatalog {
    fn id(&self) -> &str {
        "mock"
    }

    fn name(&self) -> &str {
        "Mock Catalog"
    }

    async fn search(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<CatalogEntry>, CatalogError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.to_string());

        let scripted = self.script.lock().unwrap().pop_front();
        let scripted = match scripted {
            Some(scripted) => scripted,
            None => return Ok(Vec::new()),
        };

        if scripted.ignore_cancel {
            tokio::time::sleep(scripted.delay).await;
        } else {
            tokio::select! {
                _ = cancel.cancelled() => return Err(CatalogError::Cancelled),
                _ = tokio::time::sleep(scripted.delay) => {}
            }
        }

        scripted.outcome
    }

    async fn fetch_description(&self, _key: &str) -> Option<String> {
        self.description_fetches.fetch_add(1, Ordering::SeqCst);
        self.descriptions.lock().unwrap().clone()
    }
}

/// Helper to build a catalog entry for tests.
pub fn make_entry(key: &str, title: &str, author: &str) -> CatalogEntry {
    CatalogEntry {
        key: key.to_string(),
        title: title.to_string(),
        author: author.to_string(),
        first_publish_year: None,
        cover_id: None,
    }
}
