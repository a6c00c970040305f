//! Shared fixtures for list store integration tests
//!
//! Provides a small entries list view: a row type, its adapter over the
//! scripted mock transport, and response payload builders.

use medley_common::rpc::Action;
use medley_common::{ConsoleConfig, Error, Result};
use medley_list::filters::{FilterSchema, FilterSet};
use medley_list::store::{ListAdapter, ListPage};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Small bulk chunks so chunking is observable with few ids
pub fn test_config() -> ConsoleConfig {
    ConsoleConfig {
        bulk_chunk_size: 2,
        ..ConsoleConfig::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRow {
    pub id: String,
    pub name: String,
}

/// Remote list response payload for the given rows
pub fn page_json(rows: &[(&str, &str)], total_count: i64) -> Value {
    let objects: Vec<Value> = rows
        .iter()
        .map(|(id, name)| json!({ "id": id, "name": name }))
        .collect();
    json!({ "objects": objects, "totalCount": total_count })
}

/// Entries list view adapter
pub struct EntriesList;

impl ListAdapter for EntriesList {
    type Item = MediaRow;

    fn view_token(&self) -> &str {
        "entries"
    }

    fn schema(&self) -> FilterSchema {
        FilterSchema::builder()
            .paged(50)
            .text("freetext", "")
            .choice("status", "any", &["any", "ready", "pending", "error"])
            .list("mediaTypes")
            .build()
    }

    fn build_action(&self, filters: &FilterSet) -> Action {
        Action::new(
            "entry",
            "list",
            json!({
                "freetext": filters.text("freetext"),
                "status": filters.text("status"),
                "pageIndex": filters.page_index(),
                "pageSize": filters.page_size(),
            }),
        )
    }

    fn decode_page(&self, payload: Value) -> Result<ListPage<MediaRow>> {
        let objects = payload
            .get("objects")
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));
        let items: Vec<MediaRow> =
            serde_json::from_value(objects).map_err(|e| Error::Decode(e.to_string()))?;
        let total_count = payload
            .get("totalCount")
            .and_then(Value::as_i64)
            .unwrap_or(items.len() as i64);
        Ok(ListPage { items, total_count })
    }

    fn delete_action(&self, id: &str) -> Action {
        Action::new("entry", "delete", json!({ "entryId": id }))
    }
}
