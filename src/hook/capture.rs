//! Boundary to the OS facility that reports raw key transitions

use std::sync::Arc;

use crate::events::KeyDirection;
use crate::keys::VirtualKey;

/// Called synchronously for every raw transition. Must return quickly and
/// must not block: the OS input pipeline waits on it.
pub type KeyCallback = Arc<dyn Fn(VirtualKey, KeyDirection) + Send + Sync>;

/// A system-wide key hook, installed once per capture session
pub trait CaptureSource: Send {
    /// Start delivering transitions to `callback`
    fn install(&mut self, callback: KeyCallback) -> Result<(), CaptureError>;

    /// Stop delivering transitions and release the OS resource
    fn uninstall(&mut self) -> Result<(), CaptureError>;
}

/// Errors raised while installing or removing the key hook
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("key hook is already installed")]
    AlreadyInstalled,

    #[error("key hook is not installed")]
    NotInstalled,

    #[error("failed to install key hook: {0}")]
    Install(String),

    #[error("failed to uninstall key hook: {0}")]
    Uninstall(String),

    #[error("failed to spawn capture thread: {0}")]
    ThreadSpawn(String),

    #[error("global key capture is not supported on this platform")]
    Unsupported,
}

/// Capture source for platforms without a global key hook
#[cfg(not(windows))]
#[derive(Debug, Default)]
pub struct UnsupportedCapture;

#[cfg(not(windows))]
impl CaptureSource for UnsupportedCapture {
    fn install(&mut self, _callback: KeyCallback) -> Result<(), CaptureError> {
        Err(CaptureError::Unsupported)
    }

    fn uninstall(&mut self) -> Result<(), CaptureError> {
        Err(CaptureError::NotInstalled)
    }
}

/// The capture source for the current platform
pub fn platform_capture() -> Box<dyn CaptureSource> {
    #[cfg(windows)]
    {
        Box::new(super::win32::LowLevelKeyboardHook::new())
    }
    #[cfg(not(windows))]
    {
        Box::new(UnsupportedCapture)
    }
}

#[cfg(test)]
pub use manual::{Injector, ManualCapture};

#[cfg(test)]
mod manual {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::{CaptureError, CaptureSource, KeyCallback};
    use crate::events::KeyDirection;
    use crate::keys::VirtualKey;

    #[derive(Default)]
    struct Shared {
        callback: Option<KeyCallback>,
        last: Option<KeyCallback>,
        installs: usize,
        uninstalls: usize,
    }

    /// In-process capture source; tests drive it through an `Injector`
    #[derive(Default)]
    pub struct ManualCapture {
        shared: Arc<Mutex<Shared>>,
        fail_install: bool,
        fail_uninstall: bool,
    }

    /// Feeds synthetic transitions into the installed callback
    #[derive(Clone)]
    pub struct Injector {
        shared: Arc<Mutex<Shared>>,
    }

    impl ManualCapture {
        pub fn new() -> (Self, Injector) {
            let capture = Self::default();
            let injector = Injector {
                shared: Arc::clone(&capture.shared),
            };
            (capture, injector)
        }

        pub fn failing_install(mut self) -> Self {
            self.fail_install = true;
            self
        }

        pub fn failing_uninstall(mut self) -> Self {
            self.fail_uninstall = true;
            self
        }
    }

    impl CaptureSource for ManualCapture {
        fn install(&mut self, callback: KeyCallback) -> Result<(), CaptureError> {
            if self.fail_install {
                return Err(CaptureError::Install("access denied".to_string()));
            }
            let mut shared = self.shared.lock();
            if shared.callback.is_some() {
                return Err(CaptureError::AlreadyInstalled);
            }
            shared.last = Some(Arc::clone(&callback));
            shared.callback = Some(callback);
            shared.installs += 1;
            Ok(())
        }

        fn uninstall(&mut self) -> Result<(), CaptureError> {
            let mut shared = self.shared.lock();
            shared.uninstalls += 1;
            if self.fail_uninstall {
                return Err(CaptureError::Uninstall("hook handle invalid".to_string()));
            }
            shared
                .callback
                .take()
                .map(|_| ())
                .ok_or(CaptureError::NotInstalled)
        }
    }

    impl Injector {
        /// Deliver a transition the way the OS hook would. A no-op while
        /// nothing is installed.
        pub fn send(&self, key: VirtualKey, direction: KeyDirection) {
            let callback = self.shared.lock().callback.clone();
            if let Some(callback) = callback {
                callback(key, direction);
            }
        }

        /// Deliver a transition to the most recently installed callback,
        /// even after uninstall, like a late event racing teardown
        pub fn send_late(&self, key: VirtualKey, direction: KeyDirection) {
            let callback = self.shared.lock().last.clone();
            if let Some(callback) = callback {
                callback(key, direction);
            }
        }

        pub fn press(&self, key: VirtualKey) {
            self.send(key, KeyDirection::Press);
        }

        pub fn release(&self, key: VirtualKey) {
            self.send(key, KeyDirection::Release);
        }

        pub fn installs(&self) -> usize {
            self.shared.lock().installs
        }

        pub fn uninstalls(&self) -> usize {
            self.shared.lock().uninstalls
        }

        pub fn is_installed(&self) -> bool {
            self.shared.lock().callback.is_some()
        }
    }
}
