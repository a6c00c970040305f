//! Section coordinator
//!
//! Owns the full set of sections registered for one entity-type editor and
//! presents one fused, debounced state stream to the entity store. Sections
//! are injected as an explicit list at construction; fan-out and save
//! preparation iterate that list in registration order, which is also the
//! deterministic submission order of the multi-operation save request.

use crate::section::{ActivationOutcome, Section, SectionHandle, SectionKey};
use medley_common::debounce::DebouncedInvalidator;
use medley_common::rpc::MultiRequest;
use medley_common::Error;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Fused state derived from all registered sections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateState {
    /// At least one section is busy
    pub any_busy: bool,
    /// Every section reports valid content
    pub all_valid: bool,
    /// At least one section holds unsaved edits
    pub any_dirty: bool,
}

impl Default for AggregateState {
    fn default() -> Self {
        Self {
            any_busy: false,
            all_valid: true,
            any_dirty: false,
        }
    }
}

/// Result of asking the coordinator to prepare a save
#[derive(Debug)]
pub enum SaveReadiness {
    /// All sections valid and non-busy; dirty contributions appended
    Ready,
    /// At least one section is mid-async-work; validation was not attempted
    SectionBusy { sections: Vec<SectionKey> },
    /// At least one section reports invalid content
    Invalid { sections: Vec<SectionKey> },
    /// A section failed while contributing to the save request
    BuildFailed { section: SectionKey, error: Error },
}

struct RegisteredSection<E> {
    section: Arc<dyn Section<E>>,
    handle: SectionHandle,
}

/// Coordinator for the sections of one entity editor
pub struct SectionCoordinator<E> {
    sections: Vec<RegisteredSection<E>>,
    aggregate_tx: Arc<watch::Sender<AggregateState>>,
    invalidator: DebouncedInvalidator,
    activated: Mutex<HashSet<SectionKey>>,
}

impl<E: Send + Sync + 'static> SectionCoordinator<E> {
    /// Build a coordinator over an explicit, ordered section list
    ///
    /// Must be called inside a tokio runtime (spawns the debounced aggregate
    /// recompute task, scoped to `scope`).
    pub fn new(
        sections: Vec<(Arc<dyn Section<E>>, SectionHandle)>,
        debounce_window: Duration,
        scope: CancellationToken,
    ) -> Self {
        let sections: Vec<RegisteredSection<E>> = sections
            .into_iter()
            .map(|(section, handle)| RegisteredSection { section, handle })
            .collect();

        let (tx, _) = watch::channel(AggregateState::default());
        let aggregate_tx = Arc::new(tx);

        let handles: Vec<SectionHandle> =
            sections.iter().map(|r| r.handle.clone()).collect();
        let flush_tx = aggregate_tx.clone();
        let invalidator = DebouncedInvalidator::spawn(debounce_window, scope, move || {
            let aggregate = compute_aggregate(&handles);
            flush_tx.send_if_modified(|current| {
                if *current != aggregate {
                    *current = aggregate;
                    true
                } else {
                    false
                }
            });
        });

        // Every flag change on any handle schedules one coalesced recompute
        for registered in &sections {
            let marker = invalidator.clone();
            registered.handle.connect(Arc::new(move || marker.mark()));
        }

        Self {
            sections,
            aggregate_tx,
            invalidator,
            activated: Mutex::new(HashSet::new()),
        }
    }

    /// Registered section keys, in registration order
    pub fn keys(&self) -> Vec<SectionKey> {
        self.sections.iter().map(|r| r.section.key()).collect()
    }

    /// Handle for one registered section
    pub fn handle(&self, key: SectionKey) -> Option<SectionHandle> {
        self.sections
            .iter()
            .find(|r| r.section.key() == key)
            .map(|r| r.handle.clone())
    }

    /// Immediately computed (non-debounced) aggregate of all section flags
    pub fn aggregate(&self) -> AggregateState {
        let handles: Vec<SectionHandle> =
            self.sections.iter().map(|r| r.handle.clone()).collect();
        compute_aggregate(&handles)
    }

    /// Subscribe to the debounced aggregate stream
    pub fn subscribe(&self) -> watch::Receiver<AggregateState> {
        self.aggregate_tx.subscribe()
    }

    /// Whether a section has been activated at least once this session
    pub fn was_activated(&self, key: SectionKey) -> bool {
        self.activated.lock().unwrap().contains(&key)
    }

    /// Activate one section against the current entity snapshot
    ///
    /// Tracks first-vs-repeat activation and records the activation error in
    /// the section's handle on failure. A failed activation bars the section
    /// from contributing to the next save.
    pub async fn activate(&self, key: SectionKey, entity: &E) -> ActivationOutcome {
        let Some(registered) = self.sections.iter().find(|r| r.section.key() == key) else {
            warn!(section = %key, "Activation requested for unregistered section");
            return ActivationOutcome::failure(format!("Section {} is not registered", key));
        };

        let first_activation = self.activated.lock().unwrap().insert(key);
        registered.handle.set_busy(true);
        registered.handle.set_loader_visible(true);

        let outcome = registered.section.activate(entity, first_activation).await;

        registered.handle.set_busy(false);
        registered.handle.set_loader_visible(false);
        if outcome.failed {
            warn!(
                section = %key,
                error = outcome.error.as_deref().unwrap_or("unknown"),
                "Section activation failed"
            );
            registered.handle.set_activation_error(outcome.error.clone());
        } else {
            registered.handle.set_activation_error(None);
        }

        outcome
    }

    /// Fan out: a new entity load is about to begin
    pub fn on_data_loading(&self, id: &str) {
        debug!(entity_id = %id, sections = self.sections.len(), "Notifying sections of pending load");
        for registered in &self.sections {
            registered.section.on_data_loading(id);
            registered.handle.set_activation_error(None);
        }
    }

    /// Fan out a freshly loaded entity snapshot to every section
    ///
    /// Every section receives the snapshot even when an earlier one reported
    /// errors; any error fails the load as a whole.
    pub fn on_data_loaded(&self, entity: &E) -> std::result::Result<(), Vec<Error>> {
        let mut errors = Vec::new();
        for registered in &self.sections {
            let section_errors = registered.section.on_data_loaded(entity);
            if !section_errors.is_empty() {
                warn!(
                    section = %registered.section.key(),
                    count = section_errors.len(),
                    "Section reported errors for loaded entity"
                );
                errors.extend(section_errors);
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Prepare one atomic save
    ///
    /// 1. Any busy section rejects the save without validating the rest.
    /// 2. All sections are validated, activated or not — a never-revisited
    ///    but invalid section still blocks the save.
    /// 3. Each dirty section (without a pending activation error) appends its
    ///    operations to `request` in registration order.
    pub async fn prepare_save(
        &self,
        draft: &mut E,
        request: &mut MultiRequest,
    ) -> SaveReadiness {
        let busy: Vec<SectionKey> = self
            .sections
            .iter()
            .filter(|r| r.handle.is_busy())
            .map(|r| r.section.key())
            .collect();
        if !busy.is_empty() {
            debug!(sections = ?busy, "Save rejected: sections busy");
            return SaveReadiness::SectionBusy { sections: busy };
        }

        let mut invalid = Vec::new();
        for registered in &self.sections {
            let key = registered.section.key();
            let was_activated = self.was_activated(key);
            let validation = registered.section.validate(was_activated).await;
            registered.handle.set_valid(validation.is_valid);
            if !validation.is_valid {
                invalid.push(key);
            }
        }
        if !invalid.is_empty() {
            debug!(sections = ?invalid, "Save rejected: sections invalid");
            return SaveReadiness::Invalid { sections: invalid };
        }

        for registered in &self.sections {
            let key = registered.section.key();
            if !registered.handle.is_dirty() {
                continue;
            }
            if registered.handle.state().activation_error.is_some() {
                warn!(section = %key, "Skipping save contribution: activation error pending");
                continue;
            }
            if let Err(error) = registered.section.on_data_saving(draft, request) {
                warn!(section = %key, error = %error, "Section failed to build save contribution");
                return SaveReadiness::BuildFailed { section: key, error };
            }
        }

        SaveReadiness::Ready
    }

    /// Reset every section and its published flags (entity swap or editor
    /// close). Activation bookkeeping survives: a section already visited in
    /// this editor session keeps its repeat-activation semantics.
    pub fn reset_all(&self) {
        for registered in &self.sections {
            registered.section.reset();
            registered.handle.reset();
        }
        self.invalidator.mark();
    }
}

fn compute_aggregate(handles: &[SectionHandle]) -> AggregateState {
    let mut aggregate = AggregateState::default();
    for handle in handles {
        let state = handle.state();
        aggregate.any_busy |= state.is_busy;
        aggregate.all_valid &= state.is_valid;
        aggregate.any_dirty |= state.is_dirty;
    }
    aggregate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::SectionValidation;
    use async_trait::async_trait;
    use medley_common::Result;

    /// Minimal inert section for aggregate tests
    struct InertSection {
        key: SectionKey,
    }

    #[async_trait]
    impl Section<String> for InertSection {
        fn key(&self) -> SectionKey {
            self.key
        }

        async fn activate(&self, _entity: &String, _first: bool) -> ActivationOutcome {
            ActivationOutcome::ok()
        }

        fn on_data_loading(&self, _id: &str) {}

        fn on_data_loaded(&self, _entity: &String) -> Vec<Error> {
            Vec::new()
        }

        async fn validate(&self, _was_activated: bool) -> SectionValidation {
            SectionValidation::valid()
        }

        fn on_data_saving(&self, _draft: &mut String, _request: &mut MultiRequest) -> Result<()> {
            Ok(())
        }

        fn reset(&self) {}
    }

    fn coordinator_with(
        keys: &[SectionKey],
        scope: CancellationToken,
    ) -> (SectionCoordinator<String>, Vec<SectionHandle>) {
        let mut sections: Vec<(Arc<dyn Section<String>>, SectionHandle)> = Vec::new();
        let mut handles = Vec::new();
        for &key in keys {
            let handle = SectionHandle::new();
            handles.push(handle.clone());
            sections.push((Arc::new(InertSection { key }), handle));
        }
        let coordinator =
            SectionCoordinator::new(sections, Duration::from_millis(10), scope);
        (coordinator, handles)
    }

    #[tokio::test]
    async fn test_aggregate_fuses_flags() {
        let scope = CancellationToken::new();
        let (coordinator, handles) = coordinator_with(
            &[SectionKey::Metadata, SectionKey::AccessControl],
            scope.clone(),
        );

        assert_eq!(coordinator.aggregate(), AggregateState::default());

        handles[0].set_dirty(true);
        handles[1].set_valid(false);
        handles[1].set_busy(true);

        let aggregate = coordinator.aggregate();
        assert!(aggregate.any_dirty);
        assert!(aggregate.any_busy);
        assert!(!aggregate.all_valid);
        scope.cancel();
    }

    #[tokio::test]
    async fn test_debounced_stream_coalesces_burst() {
        let scope = CancellationToken::new();
        let (coordinator, handles) = coordinator_with(
            &[SectionKey::Metadata, SectionKey::Thumbnails],
            scope.clone(),
        );
        let mut rx = coordinator.subscribe();

        // Burst of flag changes in the same tick
        handles[0].set_dirty(true);
        handles[1].set_dirty(true);
        handles[1].set_busy(true);

        tokio::time::timeout(Duration::from_millis(500), rx.changed())
            .await
            .expect("aggregate should flush within the window")
            .unwrap();
        let aggregate = *rx.borrow();
        assert!(aggregate.any_dirty);
        assert!(aggregate.any_busy);
        scope.cancel();
    }

    #[tokio::test]
    async fn test_activation_tracking() {
        let scope = CancellationToken::new();
        let (coordinator, _) =
            coordinator_with(&[SectionKey::Metadata], scope.clone());

        assert!(!coordinator.was_activated(SectionKey::Metadata));
        coordinator
            .activate(SectionKey::Metadata, &"entity".to_string())
            .await;
        assert!(coordinator.was_activated(SectionKey::Metadata));
        scope.cancel();
    }

    #[tokio::test]
    async fn test_activate_unregistered_section_fails() {
        let scope = CancellationToken::new();
        let (coordinator, _) =
            coordinator_with(&[SectionKey::Metadata], scope.clone());

        let outcome = coordinator
            .activate(SectionKey::Captions, &"entity".to_string())
            .await;
        assert!(outcome.failed);
        scope.cancel();
    }
}
