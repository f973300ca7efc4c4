//! Per-session search state machine.
//!
//! One [`SearchController`] is spawned per mounted search surface. It owns
//! all session state (query text, generation counter, cancellation handle)
//! inside a single task, so there are no locks; keystrokes arrive on an
//! mpsc channel and the current [`SearchState`] is published on a watch
//! channel.
//!
//! Ordering guarantee: the settled result set always reflects the most
//! recent non-superseded query regardless of network arrival order. That
//! is enforced by tagging every issued request with a generation and
//! discarding completions whose generation is stale; cancellation is only
//! best effort and may race with response arrival.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::catalog::{Catalog, CatalogError};
use crate::config::SearchConfig;
use crate::models::CatalogEntry;

/// Message shown when a search round trip fails or times out
const SEARCH_TIMED_OUT: &str = "search unavailable";
const SEARCH_FAILED: &str = "search unavailable, please try again";

/// Observable state of a search session.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchState {
    /// No query, or query below the minimum length
    Idle,

    /// A query is pending the debounce window
    Debouncing,

    /// A catalog request is in flight
    Loading,

    /// The most recent non-superseded request completed
    Settled(Vec<CatalogEntry>),

    /// The most recent request failed; message is user-facing
    Failed(String),
}

impl SearchState {
    /// Entries to render for this state
    pub fn entries(&self) -> &[CatalogEntry] {
        match self {
            SearchState::Settled(entries) => entries,
            _ => &[],
        }
    }
}

type SearchOutcome = Result<Vec<CatalogEntry>, CatalogError>;

/// Handle to a running search session.
///
/// Dropping the handle closes the input channel, which tears the session
/// task down and cancels any in-flight request.
#[derive(Debug)]
pub struct SearchController {
    input_tx: mpsc::UnboundedSender<String>,
    state_rx: watch::Receiver<SearchState>,
}

impl SearchController {
    /// Spawn a session task against the given catalog.
    pub fn spawn(catalog: Arc<dyn Catalog>, config: SearchConfig) -> Self {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SearchState::Idle);
        let (done_tx, done_rx) = mpsc::unbounded_channel();

        let session = Session {
            catalog,
            config,
            state_tx,
            done_tx,
            generation: 0,
            query: String::new(),
            cancel: None,
            debounce_deadline: None,
            timeout_deadline: None,
        };
        tokio::spawn(session.run(input_rx, done_rx));

        Self { input_tx, state_rx }
    }

    /// Feed the current input text (the full field contents, not a delta).
    ///
    /// Sends after teardown are silently dropped.
    pub fn input(&self, text: impl Into<String>) {
        let _ = self.input_tx.send(text.into());
    }

    /// Subscribe to state transitions.
    pub fn state(&self) -> watch::Receiver<SearchState> {
        self.state_rx.clone()
    }

    /// Snapshot of the current state.
    pub fn current(&self) -> SearchState {
        self.state_rx.borrow().clone()
    }
}

/// Session-internal event, produced by the select loop.
enum Event {
    Input(Option<String>),
    DebounceFired,
    TimeoutFired,
    Completed(u64, SearchOutcome),
}

struct Session {
    catalog: Arc<dyn Catalog>,
    config: SearchConfig,
    state_tx: watch::Sender<SearchState>,
    done_tx: mpsc::UnboundedSender<(u64, SearchOutcome)>,

    /// Tag for issued requests; bumped whenever the pending request is
    /// superseded (keystroke or self-inflicted timeout)
    generation: u64,

    /// Trimmed query awaiting the debounce window
    query: String,

    cancel: Option<CancellationToken>,
    debounce_deadline: Option<Instant>,
    timeout_deadline: Option<Instant>,
}

impl Session {
    async fn run(
        mut self,
        mut input_rx: mpsc::UnboundedReceiver<String>,
        mut done_rx: mpsc::UnboundedReceiver<(u64, SearchOutcome)>,
    ) {
        loop {
            let event = tokio::select! {
                input = input_rx.recv() => Event::Input(input),
                _ = deadline(self.debounce_deadline) => Event::DebounceFired,
                _ = deadline(self.timeout_deadline) => Event::TimeoutFired,
                Some((generation, outcome)) = done_rx.recv() => {
                    Event::Completed(generation, outcome)
                }
            };

            match event {
                Event::Input(None) => break,
                Event::Input(Some(text)) => self.on_input(&text),
                Event::DebounceFired => self.on_debounce_fired(),
                Event::TimeoutFired => self.on_timeout(),
                Event::Completed(generation, outcome) => self.on_completed(generation, outcome),
            }
        }

        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }

    /// A keystroke supersedes whatever was pending.
    fn on_input(&mut self, text: &str) {
        self.generation += 1;
        self.supersede();

        let trimmed = text.trim();
        if trimmed.chars().count() < self.config.min_query_len {
            self.query.clear();
            self.publish(SearchState::Idle);
            return;
        }

        self.query = trimmed.to_string();
        self.debounce_deadline = Some(Instant::now() + self.config.debounce());
        self.publish(SearchState::Debouncing);
    }

    fn on_debounce_fired(&mut self) {
        self.debounce_deadline = None;

        let cancel = CancellationToken::new();
        self.cancel = Some(cancel.clone());

        let generation = self.generation;
        let catalog = Arc::clone(&self.catalog);
        let query = self.query.clone();
        let done_tx = self.done_tx.clone();
        tokio::spawn(async move {
            let outcome = catalog.search(&query, &cancel).await;
            let _ = done_tx.send((generation, outcome));
        });

        self.timeout_deadline = Some(Instant::now() + self.config.request_timeout());
        self.publish(SearchState::Loading);
    }

    /// The secondary round-trip bound fired before the request completed.
    fn on_timeout(&mut self) {
        tracing::debug!(query = %self.query, "search round trip exceeded the bound");
        // The timed-out request is superseded, so a late success for it is
        // discarded like any other stale completion.
        self.generation += 1;
        self.supersede();
        self.publish(SearchState::Failed(SEARCH_TIMED_OUT.to_string()));
    }

    fn on_completed(&mut self, generation: u64, outcome: SearchOutcome) {
        if generation != self.generation {
            tracing::trace!(generation, current = self.generation, "stale completion discarded");
            return;
        }

        match outcome {
            // Best-effort cancellation won the race; never a visible
            // transition by itself.
            Err(CatalogError::Cancelled) => {}
            Ok(entries) => {
                self.supersede();
                self.publish(SearchState::Settled(entries));
            }
            Err(err) => {
                tracing::debug!(query = %self.query, error = %err, "catalog search failed");
                self.supersede();
                self.publish(SearchState::Failed(SEARCH_FAILED.to_string()));
            }
        }
    }

    /// Cancel the in-flight request (best effort) and clear both timers.
    fn supersede(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        self.debounce_deadline = None;
        self.timeout_deadline = None;
    }

    fn publish(&self, state: SearchState) {
        let _ = self.state_tx.send(state);
    }
}

/// Sleep until the deadline, or forever when there is none.
async fn deadline(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
