//! A chord bound to an action

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::anyhow;

use crate::events::{KeyDirection, KeyEvent};
use crate::keys::KeyBinding;

/// Zero-argument fallible action run when a chord matches
pub type ActionFn = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// Immutable pairing of a chord, the direction it fires on, and its action
pub struct Registration {
    label: String,
    binding: KeyBinding,
    direction: KeyDirection,
    action: ActionFn,
    exclusive: bool,
    running: AtomicBool,
}

impl Registration {
    /// Release-triggered, reentrant registration
    pub fn new<F>(label: impl Into<String>, binding: KeyBinding, action: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            binding,
            direction: KeyDirection::Release,
            action: Arc::new(action),
            exclusive: false,
            running: AtomicBool::new(false),
        }
    }

    pub fn with_direction(mut self, direction: KeyDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Never run two invocations of this action at the same time; a match
    /// arriving while one is in flight is skipped.
    pub fn exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Exact, order-independent match against the event's pre-transition
    /// pressed-set.
    ///
    /// Release: the snapshot still holds the released key, so it is compared
    /// as is. Press: the snapshot lacks the key going down, so the chord must
    /// equal snapshot + that key. Auto-repeat presses never match.
    pub fn matches(&self, event: &KeyEvent) -> bool {
        if event.direction != self.direction {
            return false;
        }
        match self.direction {
            KeyDirection::Release => self.binding.matches(&event.pressed),
            KeyDirection::Press => {
                !event.is_repeat()
                    && self.binding.len() == event.pressed.len() + 1
                    && self.binding.contains(event.key)
                    && event.pressed.iter().all(|k| self.binding.contains(*k))
            }
        }
    }

    /// Run the action, turning a panic into an error
    pub fn execute(&self) -> anyhow::Result<()> {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.action)())) {
            Ok(result) => result,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(anyhow!("action panicked: {message}"))
            }
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("label", &self.label)
            .field("binding", &self.binding.to_string())
            .field("direction", &self.direction)
            .field("exclusive", &self.exclusive)
            .finish()
    }
}

impl fmt::Display for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} on {})", self.label, self.binding, self.direction)
    }
}

/// One claimed execution of a registration.
///
/// For exclusive registrations only one `InFlight` exists at a time; the
/// claim is released on drop, even if the action panicked.
pub struct InFlight {
    registration: Arc<Registration>,
}

impl InFlight {
    /// Claim an execution slot; `None` if an exclusive action is already
    /// running
    pub fn begin(registration: Arc<Registration>) -> Option<Self> {
        if registration.exclusive && registration.running.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(Self { registration })
    }

    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    pub fn execute(&self) -> anyhow::Result<()> {
        self.registration.execute()
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.registration.exclusive {
            self.registration.running.store(false, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::keys::VirtualKey;

    fn chord() -> KeyBinding {
        KeyBinding::new([VirtualKey::LMENU, VirtualKey::KEY_1])
    }

    fn event(pressed: &[VirtualKey], key: VirtualKey, direction: KeyDirection) -> KeyEvent {
        let pressed: BTreeSet<_> = pressed.iter().copied().collect();
        KeyEvent::new(pressed, key, direction)
    }

    #[test]
    fn test_execute_calls_action() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let registration = Registration::new("count", chord(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        registration.execute().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_release_match_uses_snapshot_as_is() {
        let registration = Registration::new("r", chord(), || Ok(()));

        let matching = event(
            &[VirtualKey::KEY_1, VirtualKey::LMENU],
            VirtualKey::KEY_1,
            KeyDirection::Release,
        );
        let wrong_direction = event(
            &[VirtualKey::KEY_1, VirtualKey::LMENU],
            VirtualKey::KEY_1,
            KeyDirection::Press,
        );
        let wrong_keys = event(
            &[VirtualKey::LMENU, VirtualKey::LSHIFT],
            VirtualKey::LSHIFT,
            KeyDirection::Release,
        );

        assert!(registration.matches(&matching));
        assert!(!registration.matches(&wrong_direction));
        assert!(!registration.matches(&wrong_keys));
    }

    #[test]
    fn test_press_match_adds_pressed_key() {
        let registration =
            Registration::new("p", chord(), || Ok(())).with_direction(KeyDirection::Press);

        let completes_chord = event(&[VirtualKey::LMENU], VirtualKey::KEY_1, KeyDirection::Press);
        let too_early = event(&[], VirtualKey::LMENU, KeyDirection::Press);
        let extra_key = event(
            &[VirtualKey::LMENU, VirtualKey::LSHIFT],
            VirtualKey::KEY_1,
            KeyDirection::Press,
        );
        let repeat = event(
            &[VirtualKey::LMENU, VirtualKey::KEY_1],
            VirtualKey::KEY_1,
            KeyDirection::Press,
        );

        assert!(registration.matches(&completes_chord));
        assert!(!registration.matches(&too_early));
        assert!(!registration.matches(&extra_key));
        assert!(!registration.matches(&repeat));
    }

    #[test]
    fn test_panicking_action_becomes_error() {
        let registration = Registration::new("boom", chord(), || panic!("desktop gone"));
        let err = registration.execute().unwrap_err();
        assert!(err.to_string().contains("desktop gone"));
    }

    #[test]
    fn test_exclusive_claim_is_released_on_drop() {
        let registration = Arc::new(Registration::new("x", chord(), || Ok(())).exclusive(true));

        let first = InFlight::begin(Arc::clone(&registration)).unwrap();
        assert!(InFlight::begin(Arc::clone(&registration)).is_none());
        drop(first);
        assert!(InFlight::begin(Arc::clone(&registration)).is_some());
    }

    #[test]
    fn test_reentrant_claims_do_not_block() {
        let registration = Arc::new(Registration::new("r", chord(), || Ok(())));

        let _first = InFlight::begin(Arc::clone(&registration)).unwrap();
        assert!(InFlight::begin(Arc::clone(&registration)).is_some());
    }
}
