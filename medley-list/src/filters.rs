//! Typed, diffable filter sets
//!
//! A filter set maps filter names to typed values. Every key is registered
//! with a type adapter supplying its default value and normalization rule;
//! the active set is always fully materializable to its default shape (no
//! missing keys), and serializing then restoring the defaults through the
//! adapters yields an equal set.

use chrono::{DateTime, Utc};
use medley_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reserved key: zero-based page index. Changing any other filter resets it.
pub const PAGE_INDEX: &str = "pageIndex";
/// Reserved key: page size, persisted per view.
pub const PAGE_SIZE: &str = "pageSize";

/// Typed filter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum FilterValue {
    Text(String),
    Number(i64),
    DateRange {
        after: Option<DateTime<Utc>>,
        before: Option<DateTime<Utc>>,
    },
    List(Vec<String>),
    GroupedList(BTreeMap<String, Vec<String>>),
    Choice(String),
}

/// Discriminant used by adapters to reject mistyped updates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Text,
    Number,
    DateRange,
    List,
    GroupedList,
    Choice,
}

impl FilterValue {
    pub fn kind(&self) -> FilterKind {
        match self {
            FilterValue::Text(_) => FilterKind::Text,
            FilterValue::Number(_) => FilterKind::Number,
            FilterValue::DateRange { .. } => FilterKind::DateRange,
            FilterValue::List(_) => FilterKind::List,
            FilterValue::GroupedList(_) => FilterKind::GroupedList,
            FilterValue::Choice(_) => FilterKind::Choice,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FilterValue::Text(s) | FilterValue::Choice(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            FilterValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// Per-key type adapter: default shape plus normalization of updates
pub trait FilterAdapter: Send + Sync {
    fn default_value(&self) -> FilterValue;

    /// Validate and normalize an incoming value for this key
    fn normalize(&self, value: FilterValue) -> Result<FilterValue>;
}

/// Adapter accepting any value of the registered kind
struct TypedAdapter {
    default: FilterValue,
}

impl FilterAdapter for TypedAdapter {
    fn default_value(&self) -> FilterValue {
        self.default.clone()
    }

    fn normalize(&self, value: FilterValue) -> Result<FilterValue> {
        if value.kind() != self.default.kind() {
            return Err(Error::InvalidInput(format!(
                "Filter value kind {:?} does not match registered kind {:?}",
                value.kind(),
                self.default.kind()
            )));
        }
        Ok(value)
    }
}

/// Adapter restricting a choice filter to a fixed option set
struct ChoiceAdapter {
    default: String,
    options: Vec<String>,
}

impl FilterAdapter for ChoiceAdapter {
    fn default_value(&self) -> FilterValue {
        FilterValue::Choice(self.default.clone())
    }

    fn normalize(&self, value: FilterValue) -> Result<FilterValue> {
        match value {
            FilterValue::Choice(option) if self.options.contains(&option) => {
                Ok(FilterValue::Choice(option))
            }
            FilterValue::Choice(option) => Err(Error::InvalidInput(format!(
                "\"{}\" is not one of {:?}",
                option, self.options
            ))),
            other => Err(Error::InvalidInput(format!(
                "Filter value kind {:?} does not match registered kind Choice",
                other.kind()
            ))),
        }
    }
}

/// Ordered registry of filter keys and their adapters for one list view
pub struct FilterSchema {
    entries: Vec<(String, Box<dyn FilterAdapter>)>,
}

impl FilterSchema {
    pub fn builder() -> FilterSchemaBuilder {
        FilterSchemaBuilder {
            entries: Vec::new(),
        }
    }

    /// Fully materialized default filter set (every registered key present)
    pub fn create_default(&self) -> FilterSet {
        FilterSet {
            values: self
                .entries
                .iter()
                .map(|(key, adapter)| (key.clone(), adapter.default_value()))
                .collect(),
        }
    }

    pub fn adapter(&self, key: &str) -> Option<&dyn FilterAdapter> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, a)| a.as_ref())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Serialize a filter set for persistence
    pub fn serialize(&self, set: &FilterSet) -> Result<String> {
        serde_json::to_string(set).map_err(|e| Error::Internal(e.to_string()))
    }

    /// Restore a persisted filter set through the registered adapters
    ///
    /// Missing keys materialize to their defaults; unknown or mistyped
    /// persisted values fall back to the default for their key rather than
    /// failing the whole restore.
    pub fn restore(&self, raw: &str) -> Result<FilterSet> {
        let persisted: FilterSet =
            serde_json::from_str(raw).map_err(|e| Error::Decode(e.to_string()))?;

        let mut restored = self.create_default();
        for (key, value) in persisted.values {
            let Some(adapter) = self.adapter(&key) else {
                continue;
            };
            if let Ok(normalized) = adapter.normalize(value) {
                restored.values.insert(key, normalized);
            }
        }
        Ok(restored)
    }
}

/// Builder registering keys in iteration (and thus query) order
pub struct FilterSchemaBuilder {
    entries: Vec<(String, Box<dyn FilterAdapter>)>,
}

impl FilterSchemaBuilder {
    fn register(mut self, key: &str, adapter: Box<dyn FilterAdapter>) -> Self {
        self.entries.push((key.to_string(), adapter));
        self
    }

    pub fn text(self, key: &str, default: &str) -> Self {
        self.register(
            key,
            Box::new(TypedAdapter {
                default: FilterValue::Text(default.to_string()),
            }),
        )
    }

    pub fn number(self, key: &str, default: i64) -> Self {
        self.register(
            key,
            Box::new(TypedAdapter {
                default: FilterValue::Number(default),
            }),
        )
    }

    pub fn date_range(self, key: &str) -> Self {
        self.register(
            key,
            Box::new(TypedAdapter {
                default: FilterValue::DateRange {
                    after: None,
                    before: None,
                },
            }),
        )
    }

    pub fn list(self, key: &str) -> Self {
        self.register(
            key,
            Box::new(TypedAdapter {
                default: FilterValue::List(Vec::new()),
            }),
        )
    }

    pub fn grouped_list(self, key: &str) -> Self {
        self.register(
            key,
            Box::new(TypedAdapter {
                default: FilterValue::GroupedList(BTreeMap::new()),
            }),
        )
    }

    pub fn choice(self, key: &str, default: &str, options: &[&str]) -> Self {
        self.register(
            key,
            Box::new(ChoiceAdapter {
                default: default.to_string(),
                options: options.iter().map(|s| s.to_string()).collect(),
            }),
        )
    }

    /// Register the reserved paging keys
    pub fn paged(self, default_page_size: i64) -> Self {
        self.number(PAGE_INDEX, 0).number(PAGE_SIZE, default_page_size)
    }

    pub fn build(self) -> FilterSchema {
        FilterSchema {
            entries: self.entries,
        }
    }
}

/// Immutable snapshot of one view's active filters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSet {
    values: BTreeMap<String, FilterValue>,
}

impl FilterSet {
    pub fn get(&self, key: &str) -> Option<&FilterValue> {
        self.values.get(key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.as_text())
    }

    pub fn number(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(|v| v.as_number())
    }

    pub fn page_index(&self) -> i64 {
        self.number(PAGE_INDEX).unwrap_or(0)
    }

    pub fn page_size(&self) -> i64 {
        self.number(PAGE_SIZE).unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn insert(&mut self, key: String, value: FilterValue) {
        self.values.insert(key, value);
    }
}
