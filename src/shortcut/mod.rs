//! Chord registration, matching and dispatch
//!
//! Registrations are matched against each raw key event in registration
//! order; the first exact match is queued for the dispatch worker.

mod matcher;
mod registration;
mod service;

pub use matcher::BindingMatcher;
pub use registration::Registration;
pub use service::{ServiceOptions, ShortcutError, ShortcutService, DEFAULT_QUEUE_CAPACITY};
