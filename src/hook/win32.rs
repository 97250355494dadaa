//! Global key capture using the Win32 low-level keyboard hook
//!
//! The hook lives on a dedicated thread that pumps its own message loop.
//! The hook procedure only forwards the transition to the installed
//! callback and always chains to the next hook, so every key still reaches
//! the focused application.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc as std_mpsc;
use std::thread::{self, JoinHandle};

use parking_lot::RwLock;
use tracing::{error, info, warn};
use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PeekMessageW, PostThreadMessageW,
    SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx, KBDLLHOOKSTRUCT, MSG,
    PM_NOREMOVE, WH_KEYBOARD_LL, WM_KEYDOWN, WM_KEYUP, WM_QUIT, WM_SYSKEYDOWN, WM_SYSKEYUP,
    WM_USER,
};

use super::capture::{CaptureError, CaptureSource, KeyCallback};
use crate::events::KeyDirection;
use crate::keys::VirtualKey;

/// The hook procedure is a bare function, so the callback has to be global.
/// At most one hook is installed per process.
static CALLBACK: RwLock<Option<KeyCallback>> = RwLock::new(None);

/// `WH_KEYBOARD_LL` hook running on its own message-loop thread
#[derive(Default)]
pub struct LowLevelKeyboardHook {
    thread: Option<(u32, JoinHandle<Result<(), CaptureError>>)>,
}

impl LowLevelKeyboardHook {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CaptureSource for LowLevelKeyboardHook {
    fn install(&mut self, callback: KeyCallback) -> Result<(), CaptureError> {
        if self.thread.is_some() {
            return Err(CaptureError::AlreadyInstalled);
        }
        {
            let mut slot = CALLBACK.write();
            if slot.is_some() {
                return Err(CaptureError::AlreadyInstalled);
            }
            *slot = Some(callback);
        }

        let (ready_tx, ready_rx) = std_mpsc::channel();
        let handle = thread::Builder::new()
            .name("key-capture".to_string())
            .spawn(move || run_message_loop(ready_tx))
            .map_err(|e| {
                CALLBACK.write().take();
                CaptureError::ThreadSpawn(e.to_string())
            })?;

        match ready_rx.recv() {
            Ok(Ok(thread_id)) => {
                info!(thread_id, "low-level keyboard hook installed");
                self.thread = Some((thread_id, handle));
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                CALLBACK.write().take();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                CALLBACK.write().take();
                Err(CaptureError::Install(
                    "capture thread exited during setup".to_string(),
                ))
            }
        }
    }

    fn uninstall(&mut self) -> Result<(), CaptureError> {
        let (thread_id, handle) = self.thread.take().ok_or(CaptureError::NotInstalled)?;
        CALLBACK.write().take();

        unsafe { PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) }
            .map_err(|e| CaptureError::Uninstall(e.to_string()))?;

        let result = handle.join().unwrap_or_else(|_| {
            Err(CaptureError::Uninstall("capture thread panicked".to_string()))
        });
        if result.is_ok() {
            info!("low-level keyboard hook removed");
        }
        result
    }
}

impl Drop for LowLevelKeyboardHook {
    fn drop(&mut self) {
        if self.thread.is_some() {
            if let Err(e) = self.uninstall() {
                warn!(?e, "failed to remove keyboard hook on drop");
            }
        }
    }
}

/// Install the hook, report readiness, then pump messages until `WM_QUIT`
fn run_message_loop(
    ready: std_mpsc::Sender<Result<u32, CaptureError>>,
) -> Result<(), CaptureError> {
    let hook = match unsafe { SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_proc), None, 0) } {
        Ok(hook) => hook,
        Err(e) => {
            error!(%e, "SetWindowsHookExW failed");
            let _ = ready.send(Err(CaptureError::Install(e.to_string())));
            return Ok(());
        }
    };

    let mut msg = MSG::default();
    // Force creation of this thread's message queue so that the WM_QUIT
    // posted by `uninstall` cannot be lost.
    unsafe {
        let _ = PeekMessageW(&mut msg, None, WM_USER, WM_USER, PM_NOREMOVE);
    }
    let _ = ready.send(Ok(unsafe { GetCurrentThreadId() }));

    loop {
        let ret = unsafe { GetMessageW(&mut msg, None, 0, 0) };
        if ret.0 == 0 {
            break;
        }
        if ret.0 < 0 {
            warn!("GetMessageW failed, leaving hook message loop");
            break;
        }
        unsafe {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }

    unsafe { UnhookWindowsHookEx(hook) }.map_err(|e| CaptureError::Uninstall(e.to_string()))
}

unsafe extern "system" fn keyboard_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code >= 0 {
        let direction = match wparam.0 as u32 {
            WM_KEYDOWN | WM_SYSKEYDOWN => Some(KeyDirection::Press),
            WM_KEYUP | WM_SYSKEYUP => Some(KeyDirection::Release),
            _ => None,
        };

        if let Some(direction) = direction {
            let info = &*(lparam.0 as *const KBDLLHOOKSTRUCT);
            let key = VirtualKey(info.vkCode);

            // Nothing may unwind into the OS.
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                if let Some(callback) = CALLBACK.read().as_ref() {
                    callback(key, direction);
                }
            }));
            if outcome.is_err() {
                error!(%key, %direction, "key callback panicked");
            }
        }
    }

    CallNextHookEx(None, code, wparam, lparam)
}
