//! Desktop actions that shortcuts can trigger
//!
//! Action names from configuration are resolved once, at startup, into a
//! closed `ActionKind` carrying its validated parameters. Each registration
//! captures its own copy; nothing is looked up by name on the hot path.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::config::{ConfigError, ResolvedBinding};
use crate::desktop::DesktopManager;
use crate::shortcut::Registration;

/// What a shortcut does. Desktop indices are 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    SwitchDesktop { desktop: usize },
    /// Move the foreground window, then follow it
    MoveWindowToDesktop { desktop: usize },
    CreateDesktop,
}

impl ActionKind {
    pub const NAMES: [&'static str; 3] = ["SwitchDesktop", "MoveWindowToDesktop", "CreateDesktop"];

    /// Resolve a configured action name and its string parameters.
    /// Desktop numbers in `params` are 1-based.
    pub fn parse(name: &str, params: &[String]) -> Result<Self, ConfigError> {
        let expected = match name {
            "SwitchDesktop" | "MoveWindowToDesktop" => 1,
            "CreateDesktop" => 0,
            _ => return Err(ConfigError::UnknownAction(name.to_string())),
        };
        if params.len() != expected {
            return Err(ConfigError::WrongArity {
                action: name.to_string(),
                expected,
                got: params.len(),
            });
        }

        Ok(match name {
            "SwitchDesktop" => Self::SwitchDesktop {
                desktop: desktop_index(&params[0])?,
            },
            "MoveWindowToDesktop" => Self::MoveWindowToDesktop {
                desktop: desktop_index(&params[0])?,
            },
            _ => Self::CreateDesktop,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::SwitchDesktop { .. } => "SwitchDesktop",
            ActionKind::MoveWindowToDesktop { .. } => "MoveWindowToDesktop",
            ActionKind::CreateDesktop => "CreateDesktop",
        }
    }

    pub fn run(&self, desktops: &dyn DesktopManager) -> anyhow::Result<()> {
        match *self {
            ActionKind::SwitchDesktop { desktop } => desktops.switch_to_desktop(desktop),
            ActionKind::MoveWindowToDesktop { desktop } => {
                let window = desktops.foreground_window()?;
                desktops.move_window_to_desktop(window, desktop)?;
                desktops.switch_to_desktop(desktop)
            }
            ActionKind::CreateDesktop => desktops.create_desktop(),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::SwitchDesktop { desktop } | ActionKind::MoveWindowToDesktop { desktop } => {
                write!(f, "{}({})", self.name(), desktop + 1)
            }
            ActionKind::CreateDesktop => f.write_str(self.name()),
        }
    }
}

fn desktop_index(param: &str) -> Result<usize, ConfigError> {
    match param.trim().parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(ConfigError::InvalidDesktop(param.to_string())),
    }
}

/// Bind each resolved chord to its action against `desktops`
pub fn build_registrations(
    bindings: Vec<ResolvedBinding>,
    desktops: Arc<dyn DesktopManager>,
) -> Vec<Registration> {
    bindings
        .into_iter()
        .map(|resolved| {
            let action = resolved.action;
            let desktops = Arc::clone(&desktops);
            debug!(binding = %resolved.binding, %action, "binding action");
            Registration::new(action.to_string(), resolved.binding, move || {
                action.run(desktops.as_ref())
            })
            .with_direction(resolved.direction)
            .exclusive(resolved.exclusive)
        })
        .collect()
}
