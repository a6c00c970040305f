//! Section contract
//!
//! A section is a named, stateful unit owning one portion of a composite
//! entity's edit experience (metadata, access control, thumbnails, ...).
//! Sections are created once per editor instance, reset on every entity swap
//! within the same editor, and torn down when the editor closes.
//!
//! Sections publish their `{dirty, valid, busy}` flags through a
//! [`SectionHandle`]; every flag change pings the coordinator so the fused
//! aggregate can be recomputed after a debounce window.

use async_trait::async_trait;
use medley_common::rpc::MultiRequest;
use medley_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};

/// Stable section identifiers for the media entry editor family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionKey {
    Metadata,
    Thumbnails,
    AccessControl,
    Scheduling,
    Flavors,
    Captions,
    Live,
    Related,
    Clips,
    Users,
    Distribution,
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SectionKey::Metadata => "metadata",
            SectionKey::Thumbnails => "thumbnails",
            SectionKey::AccessControl => "accessControl",
            SectionKey::Scheduling => "scheduling",
            SectionKey::Flavors => "flavors",
            SectionKey::Captions => "captions",
            SectionKey::Live => "live",
            SectionKey::Related => "related",
            SectionKey::Clips => "clips",
            SectionKey::Users => "users",
            SectionKey::Distribution => "distribution",
        };
        write!(f, "{}", name)
    }
}

/// Per-section state published to the coordinator
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionState {
    /// Section holds local edits not yet saved
    pub is_dirty: bool,
    /// Section's current content is acceptable to save
    pub is_valid: bool,
    /// Section is mid-activation or mid-internal-async-work
    pub is_busy: bool,
    /// Section wants its loader overlay shown
    pub loader_visible: bool,
    /// Error captured during the last activation, if any
    pub activation_error: Option<String>,
}

impl SectionState {
    /// Fresh state for a section that has nothing loaded yet
    pub fn idle() -> Self {
        Self {
            is_valid: true,
            ..Self::default()
        }
    }
}

/// Outcome of a section activation
#[derive(Debug, Clone, Default)]
pub struct ActivationOutcome {
    pub failed: bool,
    pub error: Option<String>,
}

impl ActivationOutcome {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            failed: true,
            error: Some(error.into()),
        }
    }
}

/// Result of a section validation pass
#[derive(Debug, Clone)]
pub struct SectionValidation {
    pub is_valid: bool,
}

impl SectionValidation {
    pub fn valid() -> Self {
        Self { is_valid: true }
    }

    pub fn invalid() -> Self {
        Self { is_valid: false }
    }
}

type ChangeListener = Arc<dyn Fn() + Send + Sync>;

struct HandleInner {
    state: Mutex<SectionState>,
    listener: Mutex<Option<ChangeListener>>,
}

/// Shared per-section state cell
///
/// The section mutates its flags through this handle; the coordinator holds a
/// clone and reads the fused view. Every mutation notifies the coordinator's
/// invalidator (once connected) so aggregate recomputation can be scheduled.
#[derive(Clone)]
pub struct SectionHandle {
    inner: Arc<HandleInner>,
}

impl SectionHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HandleInner {
                state: Mutex::new(SectionState::idle()),
                listener: Mutex::new(None),
            }),
        }
    }

    /// Attach the coordinator's change listener. Called once at registration.
    pub(crate) fn connect(&self, listener: ChangeListener) {
        *self.inner.listener.lock().unwrap() = Some(listener);
    }

    /// Snapshot the current state
    pub fn state(&self) -> SectionState {
        self.inner.state.lock().unwrap().clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.state.lock().unwrap().is_dirty
    }

    pub fn is_busy(&self) -> bool {
        self.inner.state.lock().unwrap().is_busy
    }

    pub fn is_valid(&self) -> bool {
        self.inner.state.lock().unwrap().is_valid
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.update(|s| s.is_dirty = dirty);
    }

    pub fn set_valid(&self, valid: bool) {
        self.update(|s| s.is_valid = valid);
    }

    pub fn set_busy(&self, busy: bool) {
        self.update(|s| s.is_busy = busy);
    }

    pub fn set_loader_visible(&self, visible: bool) {
        self.update(|s| s.loader_visible = visible);
    }

    pub fn set_activation_error(&self, error: Option<String>) {
        self.update(|s| s.activation_error = error);
    }

    /// Reset flags for an entity swap. Dirty/busy/error state is discarded;
    /// validity returns to its idle default.
    pub fn reset(&self) {
        self.update(|s| *s = SectionState::idle());
    }

    fn update(&self, f: impl FnOnce(&mut SectionState)) {
        let changed = {
            let mut state = self.inner.state.lock().unwrap();
            let before = state.clone();
            f(&mut state);
            *state != before
        };
        if changed {
            let listener = self.inner.listener.lock().unwrap().clone();
            if let Some(listener) = listener {
                listener();
            }
        }
    }
}

impl Default for SectionHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Contract every pluggable editing section implements
///
/// `E` is the entity type of the owning editor. Sections read the entity
/// snapshot handed to them but route all mutation through the
/// [`on_data_saving`](Section::on_data_saving) contribution step; no section
/// mutates the shared snapshot outside a save cycle.
#[async_trait]
pub trait Section<E>: Send + Sync {
    /// Stable key identifying this section
    fn key(&self) -> SectionKey;

    /// Invoked when the section becomes the relevant one (or, for
    /// always-active sections, when the entity is reloaded). Fetches
    /// auxiliary data and populates the local editable representation from
    /// the entity snapshot.
    ///
    /// On failure the coordinator records the activation error and the
    /// section is barred from contributing to the next save.
    async fn activate(&self, entity: &E, first_activation: bool) -> ActivationOutcome;

    /// Notified before a new entity load begins. Must cancel in-flight work
    /// and clear error state.
    fn on_data_loading(&self, id: &str);

    /// Notified after a new entity snapshot arrives. Returned errors are
    /// aggregated by the coordinator into a load failure.
    fn on_data_loaded(&self, entity: &E) -> Vec<Error>;

    /// Whether the section's current state is acceptable to save: the form
    /// state when the section was activated, the raw entity field otherwise.
    async fn validate(&self, was_activated: bool) -> SectionValidation;

    /// Contribute operations persisting this section's changes to the shared
    /// multi-operation request. Invoked only on dirty sections; an `Err`
    /// aborts the whole save attempt.
    fn on_data_saving(&self, draft: &mut E, request: &mut MultiRequest) -> Result<()>;

    /// Discard local edits and loader/error state on entity swap or editor
    /// close. Session-scoped internals documented per section (e.g. a
    /// monotonically increasing preview cache-buster) survive resets.
    fn reset(&self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_handle_notifies_on_change_only() {
        let handle = SectionHandle::new();
        let pings = Arc::new(AtomicUsize::new(0));
        let counter = pings.clone();
        handle.connect(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        handle.set_dirty(true);
        assert_eq!(pings.load(Ordering::SeqCst), 1);

        // No-op update must not ping
        handle.set_dirty(true);
        assert_eq!(pings.load(Ordering::SeqCst), 1);

        handle.set_dirty(false);
        assert_eq!(pings.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let handle = SectionHandle::new();
        handle.set_dirty(true);
        handle.set_busy(true);
        handle.set_valid(false);
        handle.set_activation_error(Some("boom".to_string()));

        handle.reset();

        let state = handle.state();
        assert!(!state.is_dirty);
        assert!(!state.is_busy);
        assert!(state.is_valid);
        assert!(state.activation_error.is_none());
    }

    #[test]
    fn test_section_key_display() {
        assert_eq!(SectionKey::AccessControl.to_string(), "accessControl");
        assert_eq!(SectionKey::Metadata.to_string(), "metadata");
    }
}
