//! Editor event types
//!
//! Broadcast to host views over a `tokio::sync::broadcast` bus. Emission
//! ignores absent receivers.

use crate::section::SectionKey;
use serde::{Deserialize, Serialize};

/// Events emitted by the entity store over one edit session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EditorEvent {
    /// Entity snapshot (re)loaded from the remote service
    EntityLoaded { id: String },

    /// Entity load failed; a retry affordance should be offered
    LoadFailed { id: String, message: String },

    /// Fused dirty flag changed (debounced)
    DirtyChanged { is_dirty: bool },

    /// Navigation was silently redirected away from a section not legal for
    /// the loaded entity's variant
    SectionRedirected { from: SectionKey, to: SectionKey },

    /// Save request accepted by the remote service; a reload follows
    EntitySaved { id: String },

    /// Save rejected or failed; pending edits are preserved
    SaveFailed { id: String, message: String },
}
