//! Section-orchestrated entity editing
//!
//! One composite entity (a media entry, category, playlist, transcoding
//! profile, ...) is edited through an injected set of independent sections,
//! each owning one slice of the edit experience. The pieces:
//!
//! - [`section`] — the contract every pluggable section implements, plus the
//!   shared state handle sections use to publish dirty/valid/busy flags
//! - [`coordinator`] — fans lifecycle notifications out to every registered
//!   section and fuses per-section state into one debounced aggregate
//! - [`store`] — the entity store state machine owning the canonical entity
//!   snapshot and the load/save/navigation lifecycle
//! - [`guard`] — navigation guard and confirm-prompt boundaries

pub mod coordinator;
pub mod events;
pub mod guard;
pub mod section;
pub mod store;

pub use coordinator::{AggregateState, SaveReadiness, SectionCoordinator};
pub use events::EditorEvent;
pub use guard::{ConfirmPrompt, NavigationGuard};
pub use section::{ActivationOutcome, Section, SectionHandle, SectionKey, SectionState};
pub use store::{EntityAdapter, EntityStore, LeaveDecision, StoreStatus};
