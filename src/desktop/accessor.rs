//! Windows virtual desktops through `VirtualDesktopAccessor.dll`
//!
//! The DLL is expected next to the executable. Its exports use 0-based
//! desktop numbers and return -1 on failure.

use std::ffi::c_void;
use std::os::windows::ffi::OsStrExt;

use anyhow::{anyhow, bail, Context, Result};
use tracing::info;
use windows::core::{s, PCSTR, PCWSTR};
use windows::Win32::Foundation::{HMODULE, HWND};
use windows::Win32::System::LibraryLoader::{GetProcAddress, LoadLibraryW};
use windows::Win32::UI::WindowsAndMessaging::GetForegroundWindow;

use super::{DesktopManager, WindowHandle};

const DLL_NAME: &str = "VirtualDesktopAccessor.dll";

type NoArgFn = unsafe extern "system" fn() -> i32;
type IndexFn = unsafe extern "system" fn(i32) -> i32;
type MoveFn = unsafe extern "system" fn(HWND, i32) -> i32;

/// Function table resolved from the accessor DLL
pub struct VirtualDesktopAccessor {
    get_desktop_count: NoArgFn,
    create_desktop: NoArgFn,
    go_to_desktop_number: IndexFn,
    move_window_to_desktop_number: MoveFn,
}

impl VirtualDesktopAccessor {
    pub fn load() -> Result<Self> {
        let exe = std::env::current_exe().context("failed to locate executable")?;
        let path = exe
            .parent()
            .context("executable has no parent directory")?
            .join(DLL_NAME);
        let wide: Vec<u16> = path.as_os_str().encode_wide().chain(Some(0)).collect();

        let module = unsafe { LoadLibraryW(PCWSTR(wide.as_ptr())) }
            .with_context(|| format!("failed to load {}", path.display()))?;

        // The exports' signatures are fixed by the accessor DLL.
        let accessor = unsafe {
            Self {
                get_desktop_count: std::mem::transmute(export(module, s!("GetDesktopCount"))?),
                create_desktop: std::mem::transmute(export(module, s!("CreateDesktop"))?),
                go_to_desktop_number: std::mem::transmute(export(module, s!("GoToDesktopNumber"))?),
                move_window_to_desktop_number: std::mem::transmute(export(
                    module,
                    s!("MoveWindowToDesktopNumber"),
                )?),
            }
        };
        info!(path = %path.display(), "virtual desktop accessor loaded");
        Ok(accessor)
    }
}

fn export(module: HMODULE, name: PCSTR) -> Result<unsafe extern "system" fn() -> isize> {
    unsafe { GetProcAddress(module, name) }
        .ok_or_else(|| anyhow!("{DLL_NAME} is missing export {}", unsafe { name.display() }))
}

fn index_arg(index: usize) -> Result<i32> {
    i32::try_from(index).map_err(|_| anyhow!("desktop index {index} out of range"))
}

impl DesktopManager for VirtualDesktopAccessor {
    fn desktop_count(&self) -> Result<usize> {
        let count = unsafe { (self.get_desktop_count)() };
        usize::try_from(count).map_err(|_| anyhow!("GetDesktopCount failed ({count})"))
    }

    fn create_desktop(&self) -> Result<()> {
        if unsafe { (self.create_desktop)() } < 0 {
            bail!("CreateDesktop failed");
        }
        Ok(())
    }

    fn switch_to_desktop(&self, index: usize) -> Result<()> {
        if unsafe { (self.go_to_desktop_number)(index_arg(index)?) } < 0 {
            bail!("GoToDesktopNumber({index}) failed");
        }
        Ok(())
    }

    fn move_window_to_desktop(&self, window: WindowHandle, index: usize) -> Result<()> {
        let hwnd = HWND(window.0 as *mut c_void);
        if unsafe { (self.move_window_to_desktop_number)(hwnd, index_arg(index)?) } < 0 {
            bail!("MoveWindowToDesktopNumber({index}) failed");
        }
        Ok(())
    }

    fn foreground_window(&self) -> Result<WindowHandle> {
        let hwnd = unsafe { GetForegroundWindow() };
        if hwnd.0.is_null() {
            bail!("no foreground window");
        }
        Ok(WindowHandle(hwnd.0 as isize))
    }
}
