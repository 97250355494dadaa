//! Key identities and chords
//!
//! `VirtualKey` wraps an OS virtual-key code; `KeyBinding` is an unordered
//! set of them. Display ordering is cosmetic and never used for matching.

mod binding;
mod virtual_key;

pub use binding::KeyBinding;
pub use virtual_key::VirtualKey;
