//! List store event bus payloads

use serde::{Deserialize, Serialize};

/// Events published by a [`FilteredListStore`](crate::FilteredListStore)
///
/// `FiltersChanged` carries only the keys whose values actually changed in
/// the triggering update, page-index resets included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ListEvent {
    FiltersChanged { keys: Vec<String> },
    QueryStarted,
    PageLoaded { total_count: i64 },
    QueryFailed { message: String },
}
