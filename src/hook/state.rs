//! Authoritative set of currently held keys

use std::collections::{BTreeSet, HashSet};

use parking_lot::RwLock;

use crate::events::KeyDirection;
use crate::keys::VirtualKey;

/// Tracks which keys are held for one capture session.
///
/// Written only from the capture callback; anyone may take a snapshot.
#[derive(Debug, Default)]
pub struct KeyStateTracker {
    held: RwLock<HashSet<VirtualKey>>,
}

impl KeyStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a transition and return the pressed-set as it was *before* it.
    pub fn update(&self, key: VirtualKey, direction: KeyDirection) -> BTreeSet<VirtualKey> {
        let mut held = self.held.write();
        let before = held.iter().copied().collect();
        match direction {
            KeyDirection::Press => {
                held.insert(key);
            }
            KeyDirection::Release => {
                held.remove(&key);
            }
        }
        before
    }

    /// Current pressed-set
    pub fn snapshot(&self) -> BTreeSet<VirtualKey> {
        self.held.read().iter().copied().collect()
    }

    /// Forget every held key (session stop)
    pub fn reset(&self) {
        self.held.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: VirtualKey = VirtualKey::LMENU;
    const B: VirtualKey = VirtualKey::LSHIFT;
    const K: VirtualKey = VirtualKey::KEY_1;

    fn set(keys: &[VirtualKey]) -> BTreeSet<VirtualKey> {
        keys.iter().copied().collect()
    }

    #[test]
    fn test_press_snapshot_excludes_pressed_key() {
        let tracker = KeyStateTracker::new();
        tracker.update(A, KeyDirection::Press);
        tracker.update(B, KeyDirection::Press);

        let before = tracker.update(K, KeyDirection::Press);
        assert_eq!(before, set(&[A, B]));
        assert_eq!(tracker.snapshot(), set(&[A, B, K]));
    }

    #[test]
    fn test_release_snapshot_includes_released_key() {
        let tracker = KeyStateTracker::new();
        for key in [A, B, K] {
            tracker.update(key, KeyDirection::Press);
        }

        let before = tracker.update(K, KeyDirection::Release);
        assert_eq!(before, set(&[A, B, K]));
        assert_eq!(tracker.snapshot(), set(&[A, B]));
    }

    #[test]
    fn test_release_of_unknown_key_is_harmless() {
        let tracker = KeyStateTracker::new();
        tracker.update(A, KeyDirection::Press);

        let before = tracker.update(K, KeyDirection::Release);
        assert_eq!(before, set(&[A]));
        assert_eq!(tracker.snapshot(), set(&[A]));
    }

    #[test]
    fn test_auto_repeat_keeps_single_entry() {
        let tracker = KeyStateTracker::new();
        tracker.update(A, KeyDirection::Press);
        let before = tracker.update(A, KeyDirection::Press);
        assert_eq!(before, set(&[A]));
        assert_eq!(tracker.snapshot(), set(&[A]));
    }

    #[test]
    fn test_reset_clears_everything() {
        let tracker = KeyStateTracker::new();
        tracker.update(A, KeyDirection::Press);
        tracker.update(K, KeyDirection::Press);
        tracker.reset();
        assert!(tracker.snapshot().is_empty());
    }
}
