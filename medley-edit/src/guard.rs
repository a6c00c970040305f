//! Navigation guard and confirmation boundaries
//!
//! The entity store enables a navigation guard while unsaved edits exist and
//! asks a confirm prompt before allowing navigation away from a dirty editor.
//! Both are injected traits with explicit lifecycle, never global listeners.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

/// Page-exit guard toggled by the editor's dirty flag
pub trait NavigationGuard: Send + Sync {
    /// Block navigation away from the editor until disabled
    fn enable(&self);

    /// Lift the navigation block
    fn disable(&self);
}

/// Blocking user decision requested before discarding unsaved edits
#[async_trait]
pub trait ConfirmPrompt: Send + Sync {
    /// Returns true when the user agrees to discard pending edits
    async fn confirm_discard(&self, message: &str) -> bool;
}

/// Guard that tracks its enabled state without any host integration
#[derive(Default)]
pub struct FlagGuard {
    enabled: AtomicBool,
}

impl FlagGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

impl NavigationGuard for FlagGuard {
    fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }
}

/// Prompt that always answers the same way (hosts without a dialog layer,
/// and scripted tests)
pub struct PresetPrompt {
    answer: bool,
}

impl PresetPrompt {
    pub fn confirming() -> Self {
        Self { answer: true }
    }

    pub fn declining() -> Self {
        Self { answer: false }
    }
}

#[async_trait]
impl ConfirmPrompt for PresetPrompt {
    async fn confirm_discard(&self, _message: &str) -> bool {
        self.answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_guard_toggles() {
        let guard = FlagGuard::new();
        assert!(!guard.is_enabled());
        guard.enable();
        assert!(guard.is_enabled());
        guard.disable();
        assert!(!guard.is_enabled());
    }

    #[tokio::test]
    async fn test_preset_prompt_answers() {
        assert!(PresetPrompt::confirming().confirm_discard("discard?").await);
        assert!(!PresetPrompt::declining().confirm_discard("discard?").await);
    }
}
