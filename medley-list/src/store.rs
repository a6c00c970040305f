//! Filtered list store
//!
//! One store instance backs one list view. It owns the active filter set,
//! issues at most one remote query at a time (a newer query cancels the
//! older, and a superseded response never publishes), remembers the page
//! size per view, and runs bulk deletes in concurrent chunks.

use crate::events::ListEvent;
use crate::filters::{FilterSchema, FilterSet, FilterValue, PAGE_INDEX, PAGE_SIZE};
use medley_common::prefs::{view_key, PreferenceStore};
use medley_common::rpc::{Action, RemoteClient};
use medley_common::{ConsoleConfig, Error, Result};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// One page of decoded list rows plus the unpaged total
#[derive(Debug, Clone)]
pub struct ListPage<T> {
    pub items: Vec<T>,
    pub total_count: i64,
}

impl<T> Default for ListPage<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total_count: 0,
        }
    }
}

/// Per-view wiring for a [`FilteredListStore`]
///
/// Implementations translate the generic filter set into the remote
/// service's list action and decode its response into typed rows.
pub trait ListAdapter: Send + Sync + 'static {
    type Item: Clone + Send + Sync + 'static;

    /// Stable token namespacing this view's persisted preferences
    fn view_token(&self) -> &str;

    /// Filter registry for this view; must register the paging keys
    fn schema(&self) -> FilterSchema;

    fn build_action(&self, filters: &FilterSet) -> Action;

    fn decode_page(&self, payload: Value) -> Result<ListPage<Self::Item>>;

    fn delete_action(&self, id: &str) -> Action;
}

/// Published query state; failed queries keep the previous rows
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListState {
    pub loading: bool,
    pub error_message: Option<String>,
}

/// Aggregated outcome of a bulk delete
#[derive(Debug, thiserror::Error)]
#[error("bulk delete failed for {} of {attempted} items", failures.len())]
pub struct BulkError {
    pub attempted: usize,
    /// (item id, failure message) per failed item
    pub failures: Vec<(String, String)>,
}

/// Reactive container for one paged, filtered collection
pub struct FilteredListStore<A: ListAdapter> {
    adapter: A,
    client: Arc<dyn RemoteClient>,
    prefs: Arc<dyn PreferenceStore>,
    schema: FilterSchema,
    filters: Mutex<FilterSet>,
    rows: Mutex<ListPage<A::Item>>,
    state_tx: watch::Sender<ListState>,
    event_tx: broadcast::Sender<ListEvent>,
    query_token: Mutex<CancellationToken>,
    scope: CancellationToken,
    page_size_key: String,
    bulk_chunk_size: usize,
}

impl<A: ListAdapter> FilteredListStore<A> {
    /// Build a store for one view, restoring its persisted page size
    pub async fn new(
        adapter: A,
        client: Arc<dyn RemoteClient>,
        prefs: Arc<dyn PreferenceStore>,
        config: &ConsoleConfig,
    ) -> Result<Arc<Self>> {
        let schema = adapter.schema();
        if !schema.contains(PAGE_INDEX) || !schema.contains(PAGE_SIZE) {
            return Err(Error::InvalidInput(format!(
                "List schema for \"{}\" must register {} and {}",
                adapter.view_token(),
                PAGE_INDEX,
                PAGE_SIZE
            )));
        }

        let mut filters = schema.create_default();
        let page_size_key = view_key(adapter.view_token(), "pageSize");
        if let Some(saved) = prefs.get(&page_size_key).await? {
            match saved.parse::<i64>() {
                Ok(size) if size > 0 => {
                    debug!(view = adapter.view_token(), size, "Restored page size");
                    filters.insert(PAGE_SIZE.to_string(), FilterValue::Number(size));
                }
                _ => warn!(
                    view = adapter.view_token(),
                    saved, "Ignoring unparsable persisted page size"
                ),
            }
        }

        let (state_tx, _) = watch::channel(ListState::default());
        let (event_tx, _) = broadcast::channel(64);
        let scope = CancellationToken::new();

        Ok(Arc::new(Self {
            adapter,
            client,
            prefs,
            schema,
            filters: Mutex::new(filters),
            rows: Mutex::new(ListPage::default()),
            state_tx,
            event_tx,
            query_token: Mutex::new(scope.child_token()),
            scope,
            page_size_key,
            bulk_chunk_size: config.bulk_chunk_size.max(1),
        }))
    }

    /// Current filter snapshot
    pub fn filters(&self) -> FilterSet {
        self.filters.lock().unwrap().clone()
    }

    /// Currently published rows
    pub fn items(&self) -> Vec<A::Item> {
        self.rows.lock().unwrap().items.clone()
    }

    pub fn total_count(&self) -> i64 {
        self.rows.lock().unwrap().total_count
    }

    pub fn state(&self) -> ListState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ListState> {
        self.state_tx.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ListEvent> {
        self.event_tx.subscribe()
    }

    /// Apply a filter update and, if anything changed, issue one query
    ///
    /// Values are merged through the registered adapters; unknown keys are
    /// rejected. Changing any non-paging filter resets the page index to 0
    /// unless the update itself sets it. A no-op update (all values equal to
    /// the active set) emits nothing and issues no query. Returns the keys
    /// that actually changed.
    pub async fn filter(&self, update: Vec<(String, FilterValue)>) -> Result<Vec<String>> {
        let update_sets_page_index = update.iter().any(|(key, _)| key == PAGE_INDEX);

        let changed = {
            let mut active = self.filters.lock().unwrap();
            let mut next = active.clone();
            let mut changed = Vec::new();

            for (key, value) in update {
                let adapter = self.schema.adapter(&key).ok_or_else(|| {
                    Error::InvalidInput(format!(
                        "Unknown filter key \"{}\" for view \"{}\"",
                        key,
                        self.adapter.view_token()
                    ))
                })?;
                let normalized = adapter.normalize(value)?;
                if next.get(&key) != Some(&normalized) {
                    next.insert(key.clone(), normalized);
                    changed.push(key);
                }
            }

            if changed.is_empty() {
                return Ok(changed);
            }

            let non_paging_change = changed.iter().any(|key| key != PAGE_INDEX);
            if non_paging_change && !update_sets_page_index && next.page_index() != 0 {
                next.insert(PAGE_INDEX.to_string(), FilterValue::Number(0));
                changed.push(PAGE_INDEX.to_string());
            }

            *active = next;
            changed
        };

        if changed.iter().any(|key| key == PAGE_SIZE) {
            let size = self.filters.lock().unwrap().page_size();
            if let Err(e) = self.prefs.set(&self.page_size_key, &size.to_string()).await {
                warn!(
                    view = self.adapter.view_token(),
                    error = %e,
                    "Failed to persist page size"
                );
            }
        }

        debug!(
            view = self.adapter.view_token(),
            keys = ?changed,
            "Filters changed"
        );
        let _ = self.event_tx.send(ListEvent::FiltersChanged {
            keys: changed.clone(),
        });

        self.execute_query().await;
        Ok(changed)
    }

    /// Re-issue the current query
    ///
    /// While a query is loading this is a no-op unless forced; a forced
    /// reload supersedes the in-flight query.
    pub async fn reload(&self, force: bool) {
        if !force && self.state_tx.borrow().loading {
            return;
        }
        self.execute_query().await;
    }

    /// Delete items in concurrent chunks and reload
    ///
    /// Per-item and per-chunk failures are collapsed into one [`BulkError`].
    /// The list reloads afterwards either way so already-deleted rows
    /// disappear.
    pub async fn delete_items(&self, ids: &[String]) -> std::result::Result<(), BulkError> {
        if ids.is_empty() {
            return Ok(());
        }

        let chunks: Vec<&[String]> = ids.chunks(self.bulk_chunk_size).collect();
        let requests = chunks.iter().map(|chunk| {
            let actions: Vec<Action> = chunk
                .iter()
                .map(|id| self.adapter.delete_action(id))
                .collect();
            self.client.multi_request(actions)
        });
        let outcomes = futures::future::join_all(requests).await;

        let mut failures = Vec::new();
        for (chunk, outcome) in chunks.iter().zip(outcomes) {
            match outcome {
                Ok(results) => {
                    for (id, result) in chunk.iter().zip(results) {
                        if let Some(error) = result.error {
                            failures.push((id.clone(), error.message));
                        }
                    }
                }
                Err(e) => {
                    let message = e.to_string();
                    for id in chunk.iter() {
                        failures.push((id.clone(), message.clone()));
                    }
                }
            }
        }

        self.reload(true).await;

        if failures.is_empty() {
            Ok(())
        } else {
            warn!(
                view = self.adapter.view_token(),
                failed = failures.len(),
                attempted = ids.len(),
                "Bulk delete completed with failures"
            );
            Err(BulkError {
                attempted: ids.len(),
                failures,
            })
        }
    }

    /// Tear down the store, cancelling any in-flight query
    pub fn close(&self) {
        self.scope.cancel();
    }

    async fn execute_query(&self) {
        // Supersede: the previous query's token dies before we start
        let token = {
            let mut guard = self.query_token.lock().unwrap();
            guard.cancel();
            let token = self.scope.child_token();
            *guard = token.clone();
            token
        };
        // A closed store hands out already-cancelled children; no state is
        // published after teardown
        if token.is_cancelled() {
            return;
        }

        let filters = self.filters.lock().unwrap().clone();
        let action = self.adapter.build_action(&filters);

        self.state_tx.send_replace(ListState {
            loading: true,
            error_message: None,
        });
        let _ = self.event_tx.send(ListEvent::QueryStarted);

        let outcome = tokio::select! {
            _ = token.cancelled() => return,
            outcome = self.client.request(action) => outcome,
        };
        if token.is_cancelled() {
            return;
        }

        match outcome.and_then(|payload| self.adapter.decode_page(payload)) {
            Ok(page) => {
                let total_count = page.total_count;
                *self.rows.lock().unwrap() = page;
                self.state_tx.send_replace(ListState::default());
                let _ = self.event_tx.send(ListEvent::PageLoaded { total_count });
            }
            Err(e) => {
                // Previously published rows stay on screen
                warn!(
                    view = self.adapter.view_token(),
                    error = %e,
                    "List query failed"
                );
                self.state_tx.send_replace(ListState {
                    loading: false,
                    error_message: Some(e.to_string()),
                });
                let _ = self.event_tx.send(ListEvent::QueryFailed {
                    message: e.to_string(),
                });
            }
        }
    }
}

impl<A: ListAdapter> Drop for FilteredListStore<A> {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}
