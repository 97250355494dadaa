//! Key capture: the OS hook boundary, held-key tracking and raw event
//! fan-out

mod broadcast;
mod capture;
mod state;
#[cfg(windows)]
mod win32;

pub use broadcast::{Broadcaster, SubscriberId, Subscription, DEFAULT_SUBSCRIBER_CAPACITY};
pub use capture::{platform_capture, CaptureError, CaptureSource, KeyCallback};
pub use state::KeyStateTracker;

#[cfg(test)]
pub use capture::{Injector, ManualCapture};
