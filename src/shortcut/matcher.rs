//! Ordered registry of chords, first match wins

use std::sync::Arc;

use crate::events::KeyEvent;

use super::Registration;

/// Registered chords, evaluated in registration order
#[derive(Debug, Default)]
pub struct BindingMatcher {
    registrations: Vec<Arc<Registration>>,
}

impl BindingMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append registrations. Setup-time only.
    pub fn register(&mut self, registrations: impl IntoIterator<Item = Registration>) {
        self.registrations.extend(registrations.into_iter().map(Arc::new));
    }

    /// The first registration, in registration order, that matches `event`
    pub fn match_event(&self, event: &KeyEvent) -> Option<Arc<Registration>> {
        self.registrations
            .iter()
            .find(|registration| registration.matches(event))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::events::KeyDirection;
    use crate::keys::{KeyBinding, VirtualKey};

    fn release(pressed: &[VirtualKey], key: VirtualKey) -> KeyEvent {
        let pressed: BTreeSet<_> = pressed.iter().copied().collect();
        KeyEvent::new(pressed, key, KeyDirection::Release)
    }

    fn noop(label: &str, keys: &[VirtualKey]) -> Registration {
        Registration::new(label, keys.iter().copied().collect::<KeyBinding>(), || Ok(()))
    }

    #[test]
    fn test_no_match_on_empty_registry() {
        let matcher = BindingMatcher::new();
        assert_eq!(matcher.len(), 0);
        assert!(matcher
            .match_event(&release(&[VirtualKey::LMENU], VirtualKey::LMENU))
            .is_none());
    }

    #[test]
    fn test_first_registration_wins() {
        let mut matcher = BindingMatcher::new();
        matcher.register([
            noop("first", &[VirtualKey::LMENU, VirtualKey::KEY_1]),
            noop("second", &[VirtualKey::KEY_1, VirtualKey::LMENU]),
        ]);

        let found = matcher
            .match_event(&release(
                &[VirtualKey::LMENU, VirtualKey::KEY_1],
                VirtualKey::KEY_1,
            ))
            .unwrap();
        assert_eq!(found.label(), "first");
    }

    #[test]
    fn test_subset_and_superset_chords_are_distinct() {
        let mut matcher = BindingMatcher::new();
        matcher.register([
            noop("switch", &[VirtualKey::LMENU, VirtualKey::KEY_1]),
            noop(
                "move",
                &[VirtualKey::LMENU, VirtualKey::LSHIFT, VirtualKey::KEY_1],
            ),
        ]);

        let switch = matcher
            .match_event(&release(
                &[VirtualKey::LMENU, VirtualKey::KEY_1],
                VirtualKey::KEY_1,
            ))
            .unwrap();
        assert_eq!(switch.label(), "switch");

        let moved = matcher
            .match_event(&release(
                &[VirtualKey::LSHIFT, VirtualKey::KEY_1, VirtualKey::LMENU],
                VirtualKey::KEY_1,
            ))
            .unwrap();
        assert_eq!(moved.label(), "move");

        assert!(matcher
            .match_event(&release(&[VirtualKey::LMENU], VirtualKey::LMENU))
            .is_none());
    }

    #[test]
    fn test_direction_filters_before_keys() {
        let mut matcher = BindingMatcher::new();
        matcher.register([
            noop("on-release", &[VirtualKey::LMENU, VirtualKey::KEY_N]),
            noop("on-press", &[VirtualKey::LMENU, VirtualKey::KEY_N])
                .with_direction(KeyDirection::Press),
        ]);

        let pressed: BTreeSet<_> = [VirtualKey::LMENU].into_iter().collect();
        let press = KeyEvent::new(pressed, VirtualKey::KEY_N, KeyDirection::Press);
        assert_eq!(matcher.match_event(&press).unwrap().label(), "on-press");

        let release = release(&[VirtualKey::LMENU, VirtualKey::KEY_N], VirtualKey::KEY_N);
        assert_eq!(matcher.match_event(&release).unwrap().label(), "on-release");
        assert_eq!(matcher.len(), 2);
    }
}
