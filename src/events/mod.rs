//! Raw key transition events
//!
//! One `KeyEvent` is produced per transition reported by the capture
//! source. It carries the pressed-set as it was *before* the transition was
//! applied, so a release still sees the released key as held.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::keys::VirtualKey;

/// Whether a transition (or a binding) concerns a key going down or up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyDirection {
    Press,
    #[default]
    Release,
}

impl std::fmt::Display for KeyDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyDirection::Press => write!(f, "press"),
            KeyDirection::Release => write!(f, "release"),
        }
    }
}

/// Snapshot of one raw transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyEvent {
    /// Keys held immediately before this transition
    pub pressed: BTreeSet<VirtualKey>,
    /// The key that changed
    pub key: VirtualKey,
    pub direction: KeyDirection,
}

impl KeyEvent {
    pub fn new(pressed: BTreeSet<VirtualKey>, key: VirtualKey, direction: KeyDirection) -> Self {
        Self {
            pressed,
            key,
            direction,
        }
    }

    /// A press for a key that is already held: the OS typematic repeat
    pub fn is_repeat(&self) -> bool {
        self.direction == KeyDirection::Press && self.pressed.contains(&self.key)
    }
}

impl std::fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} [", self.direction, self.key)?;
        for (i, key) in self.pressed.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}")?;
        }
        f.write_str("]")
    }
}
