//! Virtual desktop and window operations used by shortcut actions
//!
//! Desktop indices are 0-based here; configuration and the tray speak
//! 1-based desktop numbers.

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use tracing::info;

#[cfg(windows)]
mod accessor;

#[cfg(windows)]
pub use accessor::VirtualDesktopAccessor;

/// Opaque top-level window handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHandle(pub isize);

/// OS virtual desktop primitives. Every call may fail.
pub trait DesktopManager: Send + Sync {
    fn desktop_count(&self) -> Result<usize>;
    fn create_desktop(&self) -> Result<()>;
    fn switch_to_desktop(&self, index: usize) -> Result<()>;
    fn move_window_to_desktop(&self, window: WindowHandle, index: usize) -> Result<()>;
    fn foreground_window(&self) -> Result<WindowHandle>;
}

/// Create desktops until at least `minimum` exist. Returns how many were
/// created.
pub fn ensure_minimum_desktops(manager: &dyn DesktopManager, minimum: usize) -> Result<usize> {
    let current = manager.desktop_count()?;
    let missing = minimum.saturating_sub(current);
    for _ in 0..missing {
        manager.create_desktop()?;
    }
    if missing > 0 {
        info!(created = missing, minimum, "created virtual desktops");
    }
    Ok(missing)
}

/// Logs every operation instead of touching the OS (`--dry-run`)
#[derive(Debug)]
pub struct DryRunDesktop {
    count: AtomicUsize,
    current: AtomicUsize,
}

impl DryRunDesktop {
    pub fn new(count: usize) -> Self {
        Self {
            count: AtomicUsize::new(count),
            current: AtomicUsize::new(0),
        }
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }
}

impl DesktopManager for DryRunDesktop {
    fn desktop_count(&self) -> Result<usize> {
        Ok(self.count.load(Ordering::SeqCst))
    }

    fn create_desktop(&self) -> Result<()> {
        let count = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        info!(count, "dry run: create desktop");
        Ok(())
    }

    fn switch_to_desktop(&self, index: usize) -> Result<()> {
        let count = self.count.load(Ordering::SeqCst);
        anyhow::ensure!(index < count, "desktop {} does not exist ({count} desktops)", index + 1);
        let from = self.current() + 1;
        self.current.store(index, Ordering::SeqCst);
        info!(from, desktop = index + 1, "dry run: switch desktop");
        Ok(())
    }

    fn move_window_to_desktop(&self, window: WindowHandle, index: usize) -> Result<()> {
        let count = self.count.load(Ordering::SeqCst);
        anyhow::ensure!(index < count, "desktop {} does not exist ({count} desktops)", index + 1);
        info!(window = window.0, desktop = index + 1, "dry run: move window");
        Ok(())
    }

    fn foreground_window(&self) -> Result<WindowHandle> {
        Ok(WindowHandle(0))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{Call, RecordingDesktop};
    use super::*;

    #[test]
    fn test_ensure_minimum_creates_missing_desktops() {
        let desktops = RecordingDesktop::new(3);
        assert_eq!(ensure_minimum_desktops(&desktops, 5).unwrap(), 2);
        assert_eq!(desktops.calls(), vec![Call::Create, Call::Create]);
        assert_eq!(desktops.desktop_count().unwrap(), 5);
    }

    #[test]
    fn test_ensure_minimum_never_removes() {
        let desktops = RecordingDesktop::new(9);
        assert_eq!(ensure_minimum_desktops(&desktops, 4).unwrap(), 0);
        assert!(desktops.calls().is_empty());
    }

    #[test]
    fn test_dry_run_rejects_missing_desktop() {
        let desktops = DryRunDesktop::new(2);
        assert!(desktops.switch_to_desktop(1).is_ok());
        assert_eq!(desktops.current(), 1);
        assert!(desktops.switch_to_desktop(2).is_err());

        desktops.create_desktop().unwrap();
        assert!(desktops.switch_to_desktop(2).is_ok());
    }
}
