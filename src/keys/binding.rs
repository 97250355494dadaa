//! Unordered key chords

use std::collections::BTreeSet;
use std::fmt;

use super::VirtualKey;

/// A chord: a duplicate-free, unordered set of keys.
///
/// Two bindings are equal when they hold the same keys, whatever order they
/// were built in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct KeyBinding {
    keys: BTreeSet<VirtualKey>,
}

impl KeyBinding {
    pub fn new(keys: impl IntoIterator<Item = VirtualKey>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    /// True when `pressed` holds exactly this chord's keys, nothing more
    pub fn matches(&self, pressed: &BTreeSet<VirtualKey>) -> bool {
        self.keys == *pressed
    }

    pub fn contains(&self, key: VirtualKey) -> bool {
        self.keys.contains(&key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = VirtualKey> + '_ {
        self.keys.iter().copied()
    }

    /// Keys in display order: modifiers first, then the rest, each group
    /// ascending by code
    pub fn display_order(&self) -> Vec<VirtualKey> {
        let (mut ordered, rest): (Vec<_>, Vec<_>) = self.keys().partition(|k| k.is_modifier());
        ordered.extend(rest);
        ordered
    }
}

impl FromIterator<VirtualKey> for KeyBinding {
    fn from_iter<I: IntoIterator<Item = VirtualKey>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl fmt::Display for KeyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.display_order().into_iter().enumerate() {
            if i > 0 {
                f.write_str(" + ")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}
