//! Entity store: the section orchestrator state machine
//!
//! Owns the canonical entity snapshot for one edit session and drives the
//! load/save/navigation lifecycle:
//!
//! ```text
//! Loading -> Loaded -> { Saving -> (reload) Loaded | SavingFailed -> Loaded }
//! ```
//!
//! plus the failure states `LoadingFailed`, `PrepareSavingFailed`,
//! `DataIsInvalid`, `ActiveSectionBusy` and `PermissionDenied`. The store is
//! the single point of truth for "is this entity dirty / valid / busy"; all
//! per-section knowledge is fused by the coordinator.

use crate::coordinator::{SaveReadiness, SectionCoordinator};
use crate::events::EditorEvent;
use crate::guard::{ConfirmPrompt, NavigationGuard};
use crate::section::{Section, SectionHandle, SectionKey};
use medley_common::rpc::{Action, MultiRequest, RemoteClient};
use medley_common::{ConsoleConfig, Result};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Entity-type specific glue injected into the store
///
/// The store treats the entity as opaque beyond an identifier and a mutable
/// draft; the adapter supplies the load action, the decode step, and the
/// variant-legality rule used to redirect navigation away from sections the
/// loaded entity does not support.
pub trait EntityAdapter: Send + Sync + 'static {
    type Entity: Clone + Send + Sync + 'static;

    /// Identifier of an entity snapshot
    fn entity_id(&self, entity: &Self::Entity) -> String;

    /// Action fetching the entity by id
    fn load_action(&self, id: &str) -> Action;

    /// Decode the remote payload into an entity snapshot
    fn decode(&self, value: Value) -> Result<Self::Entity>;

    /// Fresh writable draft for one save attempt
    fn new_draft(&self, current: &Self::Entity) -> Self::Entity {
        current.clone()
    }

    /// Whether `key` is legal for the loaded entity's variant (e.g. an
    /// image entry has no clips section)
    fn is_section_allowed(&self, _entity: &Self::Entity, _key: SectionKey) -> bool {
        true
    }

    /// Section shown when navigation must be redirected
    fn default_section(&self) -> SectionKey {
        SectionKey::Metadata
    }
}

/// Entity store lifecycle state
#[derive(Debug, Clone, PartialEq)]
pub enum StoreStatus {
    /// No entity loaded yet
    Idle,
    Loading,
    Loaded,
    Saving,
    /// Multi-operation write failed or returned per-item errors; pending
    /// edits are preserved
    SavingFailed { message: String },
    LoadingFailed { message: String },
    /// A section threw while contributing to the save request
    PrepareSavingFailed { message: String },
    /// At least one section reports invalid content; no write attempted
    DataIsInvalid { sections: Vec<SectionKey> },
    /// At least one section is mid-async-work; no write attempted
    ActiveSectionBusy { sections: Vec<SectionKey> },
    PermissionDenied,
}

/// Outcome of a leave request against a possibly-dirty editor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveDecision {
    pub allowed: bool,
}

/// Section-orchestrated entity store
pub struct EntityStore<A: EntityAdapter> {
    adapter: A,
    client: Arc<dyn RemoteClient>,
    coordinator: Arc<SectionCoordinator<A::Entity>>,
    guard: Arc<dyn NavigationGuard>,
    prompt: Arc<dyn ConfirmPrompt>,
    entity: RwLock<Option<A::Entity>>,
    status_tx: watch::Sender<StoreStatus>,
    events_tx: broadcast::Sender<EditorEvent>,
    active_section: Mutex<SectionKey>,
    dirty: AtomicBool,
    scope: CancellationToken,
    load_token: Mutex<CancellationToken>,
}

impl<A: EntityAdapter> EntityStore<A> {
    /// Build a store over an explicit, ordered section list
    ///
    /// Must be called inside a tokio runtime: spawns the debounced
    /// dirty-tracking task that toggles the navigation guard. All background
    /// work is scoped to the store's cancellation token and stops at
    /// [`close`](Self::close).
    pub fn new(
        adapter: A,
        client: Arc<dyn RemoteClient>,
        sections: Vec<(Arc<dyn Section<A::Entity>>, SectionHandle)>,
        guard: Arc<dyn NavigationGuard>,
        prompt: Arc<dyn ConfirmPrompt>,
        config: &ConsoleConfig,
    ) -> Arc<Self> {
        let scope = CancellationToken::new();
        let coordinator = Arc::new(SectionCoordinator::new(
            sections,
            Duration::from_millis(config.aggregate_debounce_ms),
            scope.child_token(),
        ));

        let (status_tx, _) = watch::channel(StoreStatus::Idle);
        let (events_tx, _) = broadcast::channel(64);
        let active_section = adapter.default_section();

        let store = Arc::new(Self {
            adapter,
            client,
            coordinator,
            guard,
            prompt,
            entity: RwLock::new(None),
            status_tx,
            events_tx,
            active_section: Mutex::new(active_section),
            dirty: AtomicBool::new(false),
            load_token: Mutex::new(scope.child_token()),
            scope,
        });

        store.spawn_dirty_tracker(Duration::from_millis(config.dirty_debounce_ms));
        store
    }

    /// Debounced subscription to the coordinator's fused dirty flag; on
    /// change, enables/disables the page-exit guard and emits `DirtyChanged`.
    fn spawn_dirty_tracker(self: &Arc<Self>, window: Duration) {
        let store = Arc::downgrade(self);
        let mut rx = self.coordinator.subscribe();
        let scope = self.scope.clone();

        tokio::spawn(async move {
            let mut last = false;
            loop {
                tokio::select! {
                    _ = scope.cancelled() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                tokio::select! {
                    _ = scope.cancelled() => break,
                    _ = tokio::time::sleep(window) => {}
                }

                let Some(store) = store.upgrade() else { break };
                let dirty = rx.borrow_and_update().any_dirty;
                if dirty != last {
                    last = dirty;
                    store.apply_dirty(dirty);
                }
            }
        });
    }

    fn apply_dirty(&self, dirty: bool) {
        self.dirty.store(dirty, Ordering::SeqCst);
        if dirty {
            self.guard.enable();
        } else {
            self.guard.disable();
        }
        self.emit(EditorEvent::DirtyChanged { is_dirty: dirty });
    }

    fn set_status(&self, status: StoreStatus) {
        self.status_tx.send_replace(status);
    }

    fn emit(&self, event: EditorEvent) {
        // No receivers is fine
        let _ = self.events_tx.send(event);
    }

    /// Current lifecycle state
    pub fn status(&self) -> StoreStatus {
        self.status_tx.borrow().clone()
    }

    /// Subscribe to lifecycle state changes
    pub fn subscribe_status(&self) -> watch::Receiver<StoreStatus> {
        self.status_tx.subscribe()
    }

    /// Subscribe to editor events
    pub fn subscribe_events(&self) -> broadcast::Receiver<EditorEvent> {
        self.events_tx.subscribe()
    }

    /// Clone of the current entity snapshot
    pub fn entity(&self) -> Option<A::Entity> {
        self.entity.read().unwrap().clone()
    }

    /// Debounced entity-level dirty flag
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Currently targeted section
    pub fn active_section(&self) -> SectionKey {
        *self.active_section.lock().unwrap()
    }

    /// Coordinator owning this store's sections
    pub fn coordinator(&self) -> &SectionCoordinator<A::Entity> {
        &self.coordinator
    }

    /// Load (or reload) the entity with `id`
    ///
    /// Cancels and supersedes any in-flight load; a superseded load never
    /// publishes state. Switching to a different entity resets every section
    /// first. Returns the resulting lifecycle state.
    pub async fn load(&self, id: &str) -> StoreStatus {
        let token = {
            let mut slot = self.load_token.lock().unwrap();
            slot.cancel();
            let token = self.scope.child_token();
            *slot = token.clone();
            token
        };
        // A closed store hands out already-cancelled children; no state is
        // published after teardown
        if token.is_cancelled() {
            return self.status();
        }

        let previous_id = self
            .entity
            .read()
            .unwrap()
            .as_ref()
            .map(|e| self.adapter.entity_id(e));
        if let Some(previous) = previous_id {
            if previous != id {
                debug!(from = %previous, to = %id, "Entity swap: resetting sections");
                self.coordinator.reset_all();
            }
        }

        self.dirty.store(false, Ordering::SeqCst);
        self.guard.disable();
        self.set_status(StoreStatus::Loading);
        self.coordinator.on_data_loading(id);

        info!(entity_id = %id, "Loading entity");
        let action = self.adapter.load_action(id);
        let result = tokio::select! {
            _ = token.cancelled() => {
                debug!(entity_id = %id, "Load superseded before response");
                return self.status();
            }
            result = self.client.request(action) => result,
        };
        if token.is_cancelled() {
            debug!(entity_id = %id, "Load superseded; discarding response");
            return self.status();
        }

        let entity = match result.and_then(|value| self.adapter.decode(value)) {
            Ok(entity) => entity,
            Err(error) => {
                // Superseded between the response check and here: the newer
                // load owns the published status now
                if token.is_cancelled() {
                    debug!(entity_id = %id, "Load superseded; discarding failure");
                    return self.status();
                }
                let status = if error.is_permission_denied() {
                    warn!(entity_id = %id, "Entity load denied");
                    StoreStatus::PermissionDenied
                } else {
                    warn!(entity_id = %id, error = %error, "Entity load failed");
                    StoreStatus::LoadingFailed {
                        message: error.to_string(),
                    }
                };
                self.set_status(status.clone());
                self.emit(EditorEvent::LoadFailed {
                    id: id.to_string(),
                    message: error.to_string(),
                });
                return status;
            }
        };

        *self.entity.write().unwrap() = Some(entity.clone());

        if let Err(errors) = self.coordinator.on_data_loaded(&entity) {
            if token.is_cancelled() {
                return self.status();
            }
            let message = errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            warn!(entity_id = %id, error = %message, "Sections rejected loaded entity");
            let status = StoreStatus::LoadingFailed {
                message: message.clone(),
            };
            self.set_status(status.clone());
            self.emit(EditorEvent::LoadFailed {
                id: id.to_string(),
                message,
            });
            return status;
        }

        // Variant legality: silently redirect navigation away from a section
        // the loaded entity does not support
        let target = {
            let mut active = self.active_section.lock().unwrap();
            if !self.adapter.is_section_allowed(&entity, *active) {
                let fallback = self.adapter.default_section();
                debug!(from = %*active, to = %fallback, "Active section not legal for entity variant");
                self.emit(EditorEvent::SectionRedirected {
                    from: *active,
                    to: fallback,
                });
                *active = fallback;
            }
            *active
        };

        // Activation failures are section-local: the section records its
        // error and is barred from save contribution, the load still lands
        self.coordinator.activate(target, &entity).await;

        if token.is_cancelled() {
            return self.status();
        }
        self.set_status(StoreStatus::Loaded);
        self.emit(EditorEvent::EntityLoaded { id: id.to_string() });
        info!(entity_id = %id, "Entity loaded");
        StoreStatus::Loaded
    }

    /// Navigate to a section within the current entity
    ///
    /// Applies the variant-legality redirect when an entity is loaded and the
    /// requested section is not legal for it. Returns the section actually
    /// targeted.
    pub async fn open_section(&self, key: SectionKey) -> SectionKey {
        let entity = self.entity();
        let target = match &entity {
            Some(entity) if !self.adapter.is_section_allowed(entity, key) => {
                let fallback = self.adapter.default_section();
                debug!(from = %key, to = %fallback, "Redirecting navigation: section not legal for entity");
                self.emit(EditorEvent::SectionRedirected {
                    from: key,
                    to: fallback,
                });
                fallback
            }
            _ => key,
        };

        *self.active_section.lock().unwrap() = target;
        if let Some(entity) = entity {
            self.coordinator.activate(target, &entity).await;
        }
        target
    }

    /// Attempt one atomic save of all dirty sections
    ///
    /// Validation gates the write: a busy or invalid section rejects the
    /// attempt with zero transport writes. On success the entity is reloaded
    /// from the authoritative server state; the optimistic local draft is
    /// never trusted. Returns the resulting lifecycle state.
    pub async fn save(&self) -> StoreStatus {
        let Some(current) = self.entity() else {
            warn!("Save requested with no entity loaded");
            return self.status();
        };
        let id = self.adapter.entity_id(&current);

        let mut draft = self.adapter.new_draft(&current);
        let mut request = MultiRequest::new();

        match self.coordinator.prepare_save(&mut draft, &mut request).await {
            SaveReadiness::SectionBusy { sections } => {
                let status = StoreStatus::ActiveSectionBusy { sections };
                self.set_status(status.clone());
                return status;
            }
            SaveReadiness::Invalid { sections } => {
                let status = StoreStatus::DataIsInvalid { sections };
                self.set_status(status.clone());
                return status;
            }
            SaveReadiness::BuildFailed { section, error } => {
                let message = format!("{}: {}", section, error);
                warn!(entity_id = %id, error = %message, "Save preparation failed");
                let status = StoreStatus::PrepareSavingFailed { message };
                self.set_status(status.clone());
                return status;
            }
            SaveReadiness::Ready => {}
        }

        if request.is_empty() {
            debug!(entity_id = %id, "No dirty sections; nothing to save");
            self.set_status(StoreStatus::Loaded);
            return StoreStatus::Loaded;
        }

        info!(entity_id = %id, operations = request.len(), "Saving entity");
        self.set_status(StoreStatus::Saving);

        let outcome = self.client.multi_request(request.into_actions()).await;
        let failure_message = match outcome {
            Err(error) => Some(error.to_string()),
            Ok(results) => {
                let failures: Vec<String> = results
                    .iter()
                    .filter_map(|r| r.error.as_ref())
                    .map(|e| format!("{}: {}", e.code, e.message))
                    .collect();
                if failures.is_empty() {
                    None
                } else {
                    Some(failures.join("; "))
                }
            }
        };

        match failure_message {
            Some(message) => {
                // Entity is NOT reloaded: a reload would discard the user's
                // pending edits
                warn!(entity_id = %id, error = %message, "Save failed");
                let status = StoreStatus::SavingFailed {
                    message: message.clone(),
                };
                self.set_status(status.clone());
                self.emit(EditorEvent::SaveFailed { id, message });
                status
            }
            None => {
                info!(entity_id = %id, "Save accepted; reloading from server");
                self.emit(EditorEvent::EntitySaved { id: id.clone() });
                self.load(&id).await
            }
        }
    }

    /// Decide whether navigation away from this editor is allowed
    ///
    /// Clean editors resolve immediately; dirty editors await the injected
    /// discard prompt.
    pub async fn can_leave(&self) -> LeaveDecision {
        if !self.is_dirty() {
            return LeaveDecision { allowed: true };
        }
        let allowed = self
            .prompt
            .confirm_discard("You have unsaved changes that will be lost. Discard and leave?")
            .await;
        debug!(allowed, "Leave decision for dirty editor");
        LeaveDecision { allowed }
    }

    /// Tear the editor down: resets sections, lifts the navigation guard and
    /// cancels every outstanding task and request. No callback observes
    /// store state after this returns.
    pub fn close(&self) {
        debug!("Closing entity editor");
        self.coordinator.reset_all();
        self.guard.disable();
        self.scope.cancel();
    }
}

impl<A: EntityAdapter> Drop for EntityStore<A> {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}
