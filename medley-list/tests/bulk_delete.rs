//! Chunked bulk delete integration tests

mod helpers;

use helpers::{page_json, test_config, EntriesList};
use medley_common::prefs::{MemoryPreferenceStore, PreferenceStore};
use medley_common::rpc::mock::MockClient;
use medley_common::rpc::{ActionResult, RemoteClient};
use medley_list::store::FilteredListStore;
use serde_json::json;
use std::sync::Arc;

struct Fixture {
    store: Arc<FilteredListStore<EntriesList>>,
    client: Arc<MockClient>,
}

async fn fixture() -> Fixture {
    let client = Arc::new(MockClient::new());
    let prefs = Arc::new(MemoryPreferenceStore::new());

    let store = FilteredListStore::new(
        EntriesList,
        client.clone() as Arc<dyn RemoteClient>,
        prefs as Arc<dyn PreferenceStore>,
        &test_config(),
    )
    .await
    .unwrap();

    Fixture { store, client }
}

fn ids(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|id| id.to_string()).collect()
}

#[tokio::test]
async fn test_delete_chunks_by_configured_size() {
    let fixture = fixture().await;

    // bulk_chunk_size is 2, so five ids become chunks of 2 + 2 + 1
    fixture
        .client
        .queue_multi_response(vec![ActionResult::ok(json!(true)); 2]);
    fixture
        .client
        .queue_multi_response(vec![ActionResult::ok(json!(true)); 2]);
    fixture
        .client
        .queue_multi_response(vec![ActionResult::ok(json!(true)); 1]);
    // Reload after the delete
    fixture.client.queue_response(page_json(&[], 0));

    fixture
        .store
        .delete_items(&ids(&["0_a", "0_b", "0_c", "0_d", "0_e"]))
        .await
        .unwrap();

    let batches = fixture.client.issued_multi();
    assert_eq!(batches.len(), 3);
    assert_eq!(batches[0].len(), 2);
    assert_eq!(batches[1].len(), 2);
    assert_eq!(batches[2].len(), 1);
    assert_eq!(batches[0][0].name, "delete");
    assert_eq!(batches[0][0].params["entryId"], "0_a");
    assert_eq!(batches[2][0].params["entryId"], "0_e");

    // Success refreshes the list
    assert_eq!(fixture.client.single_count(), 1);
}

#[tokio::test]
async fn test_delete_aggregates_per_item_and_chunk_failures() {
    let fixture = fixture().await;

    // First chunk: one item succeeds, one fails server-side
    fixture.client.queue_multi_response(vec![
        ActionResult::ok(json!(true)),
        ActionResult::failed("ENTRY_ID_NOT_FOUND", "entry 0_b is gone"),
    ]);
    // Second chunk fails as a whole at the transport
    fixture.client.queue_multi_failure("connection reset");
    fixture.client.queue_response(page_json(&[], 0));

    let error = fixture
        .store
        .delete_items(&ids(&["0_a", "0_b", "0_c", "0_d"]))
        .await
        .unwrap_err();

    assert_eq!(error.attempted, 4);
    assert_eq!(error.failures.len(), 3);
    let failed_ids: Vec<&str> = error.failures.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(failed_ids, vec!["0_b", "0_c", "0_d"]);
    assert!(error.failures[0].1.contains("gone"));

    // Partial success still refreshes so deleted rows disappear
    assert_eq!(fixture.client.single_count(), 1);
}

#[tokio::test]
async fn test_delete_with_no_ids_is_noop() {
    let fixture = fixture().await;

    fixture.store.delete_items(&[]).await.unwrap();

    assert_eq!(fixture.client.multi_count(), 0);
    assert_eq!(fixture.client.single_count(), 0);
}
