//! Shared fixtures for entity store integration tests
//!
//! Provides a small media entry entity, its adapter, and a scripted section
//! whose flags and behavior tests control directly through its handle.

use async_trait::async_trait;
use medley_common::rpc::{Action, MultiRequest};
use medley_common::{ConsoleConfig, Error, Result};
use medley_edit::section::{
    ActivationOutcome, Section, SectionHandle, SectionKey, SectionValidation,
};
use medley_edit::store::EntityAdapter;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Fast debounce windows so tests settle quickly
pub fn test_config() -> ConsoleConfig {
    ConsoleConfig {
        aggregate_debounce_ms: 10,
        dirty_debounce_ms: 20,
        ..ConsoleConfig::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Image,
}

/// Minimal composite entity for editor tests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaEntry {
    pub id: String,
    pub name: String,
    pub media_type: MediaType,
}

impl MediaEntry {
    pub fn video(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            media_type: MediaType::Video,
        }
    }

    pub fn image(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            media_type: MediaType::Image,
        }
    }

    pub fn json(&self) -> Value {
        serde_json::to_value(self).unwrap()
    }
}

/// Adapter for the media entry editor
///
/// Image entries do not support the clips, live or flavors sections.
pub struct MediaEntryAdapter;

impl EntityAdapter for MediaEntryAdapter {
    type Entity = MediaEntry;

    fn entity_id(&self, entity: &MediaEntry) -> String {
        entity.id.clone()
    }

    fn load_action(&self, id: &str) -> Action {
        Action::new("entry", "get", json!({ "entryId": id }))
    }

    fn decode(&self, value: Value) -> Result<MediaEntry> {
        serde_json::from_value(value).map_err(|e| Error::Decode(e.to_string()))
    }

    fn is_section_allowed(&self, entity: &MediaEntry, key: SectionKey) -> bool {
        match entity.media_type {
            MediaType::Video => true,
            MediaType::Image => !matches!(
                key,
                SectionKey::Clips | SectionKey::Live | SectionKey::Flavors
            ),
        }
    }

    fn default_section(&self) -> SectionKey {
        SectionKey::Metadata
    }
}

/// Section whose behavior is scripted by the test
///
/// Flags are driven through the shared [`SectionHandle`]; behavior knobs
/// (validation result, activation failure, load error, save contribution)
/// are plain fields the test flips before exercising the store.
pub struct ScriptedSection {
    key: SectionKey,
    handle: SectionHandle,
    /// Result the next `validate` call reports
    pub valid: AtomicBool,
    /// Fail the next activation
    pub activation_fails: AtomicBool,
    /// Error reported from `on_data_loaded`
    pub load_error: Mutex<Option<String>>,
    /// Operation appended on save when the section is dirty
    pub contribution: Mutex<Option<Action>>,
    /// Fail `on_data_saving` instead of contributing
    pub build_fails: AtomicBool,
    /// `first_activation` flag of each activate call
    pub activations: Mutex<Vec<bool>>,
    /// `was_activated` flag of each validate call
    pub validations: Mutex<Vec<bool>>,
    /// Ids passed to `on_data_loading`
    pub loading_ids: Mutex<Vec<String>>,
    pub loaded_count: AtomicUsize,
    pub reset_count: AtomicUsize,
    /// Session-scoped preview cache-buster; survives resets by contract
    pub cache_buster: AtomicU64,
}

impl ScriptedSection {
    pub fn new(key: SectionKey) -> (std::sync::Arc<Self>, SectionHandle) {
        let handle = SectionHandle::new();
        let section = std::sync::Arc::new(Self {
            key,
            handle: handle.clone(),
            valid: AtomicBool::new(true),
            activation_fails: AtomicBool::new(false),
            load_error: Mutex::new(None),
            contribution: Mutex::new(None),
            build_fails: AtomicBool::new(false),
            activations: Mutex::new(Vec::new()),
            validations: Mutex::new(Vec::new()),
            loading_ids: Mutex::new(Vec::new()),
            loaded_count: AtomicUsize::new(0),
            reset_count: AtomicUsize::new(0),
            cache_buster: AtomicU64::new(0),
        });
        (section, handle)
    }

    pub fn handle(&self) -> &SectionHandle {
        &self.handle
    }

    pub fn set_contribution(&self, action: Action) {
        *self.contribution.lock().unwrap() = Some(action);
    }
}

#[async_trait]
impl Section<MediaEntry> for ScriptedSection {
    fn key(&self) -> SectionKey {
        self.key
    }

    async fn activate(&self, _entity: &MediaEntry, first_activation: bool) -> ActivationOutcome {
        self.activations.lock().unwrap().push(first_activation);
        if self.activation_fails.load(Ordering::SeqCst) {
            ActivationOutcome::failure("scripted activation failure")
        } else {
            ActivationOutcome::ok()
        }
    }

    fn on_data_loading(&self, id: &str) {
        self.loading_ids.lock().unwrap().push(id.to_string());
    }

    fn on_data_loaded(&self, _entity: &MediaEntry) -> Vec<Error> {
        self.loaded_count.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.load_error.lock().unwrap().clone() {
            return vec![Error::Internal(message)];
        }
        // Fresh snapshot repopulates the local form state
        self.handle.set_dirty(false);
        Vec::new()
    }

    async fn validate(&self, was_activated: bool) -> SectionValidation {
        self.validations.lock().unwrap().push(was_activated);
        SectionValidation {
            is_valid: self.valid.load(Ordering::SeqCst),
        }
    }

    fn on_data_saving(&self, _draft: &mut MediaEntry, request: &mut MultiRequest) -> Result<()> {
        if self.build_fails.load(Ordering::SeqCst) {
            return Err(Error::Internal("scripted contribution failure".to_string()));
        }
        if let Some(action) = self.contribution.lock().unwrap().clone() {
            request.add(self.key.to_string(), action);
        }
        Ok(())
    }

    fn reset(&self) {
        self.reset_count.fetch_add(1, Ordering::SeqCst);
        // Local edits discarded; the cache-buster only ever moves forward so
        // preview URLs never go stale after a reset
        self.cache_buster.fetch_add(1, Ordering::SeqCst);
        *self.contribution.lock().unwrap() = None;
    }
}
