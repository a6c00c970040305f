//! Generic reactive container for paged, filtered collections
//!
//! Every list screen of the console (entries, categories, drop folders, bulk
//! logs, schemas, transcoding profiles) is backed by a [`FilteredListStore`]:
//! a typed, diffable filter set with per-key adapters, exactly one in-flight
//! query with supersede-and-cancel discipline, per-view page-size memory, and
//! chunked bulk operations.

pub mod events;
pub mod filters;
pub mod store;

pub use events::ListEvent;
pub use filters::{FilterSchema, FilterSet, FilterValue, PAGE_INDEX, PAGE_SIZE};
pub use store::{BulkError, FilteredListStore, ListAdapter, ListPage, ListState};
