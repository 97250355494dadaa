//! Configuration loading and management
//!
//! Built-in defaults, overlaid by an optional YAML file, overlaid by
//! command-line flags. Binding names are resolved and validated here,
//! before the shortcut service starts.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::actions::ActionKind;
use crate::events::KeyDirection;
use crate::hook::DEFAULT_SUBSCRIBER_CAPACITY;
use crate::keys::{KeyBinding, VirtualKey};
use crate::shortcut::{ServiceOptions, DEFAULT_QUEUE_CAPACITY};

const DEFAULT_MINIMUM_DESKTOPS: usize = 9;

const FILE_HEADER: &str = "\
# desk-chord default configuration
# Generated from the built-in defaults. Edit to taste; any section left
# out falls back to its default.

";

/// Errors raised while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("failed to serialize configuration")]
    Serialize(#[from] serde_yaml::Error),

    #[error("unsupported config file format {0:?}, expected .yaml or .yml")]
    UnsupportedFormat(String),

    #[error("invalid log level {0:?}, expected DEBUG, INFO, WARN or ERROR")]
    InvalidLogLevel(String),

    #[error("unknown key name {0:?}")]
    UnknownKey(String),

    #[error("unknown action {0:?}, expected one of: {}", ActionKind::NAMES.join(", "))]
    UnknownAction(String),

    #[error("{action} takes {expected} parameter(s), got {got}")]
    WrongArity {
        action: String,
        expected: usize,
        got: usize,
    },

    #[error("invalid desktop number {0:?}, expected 1 or more")]
    InvalidDesktop(String),

    #[error("binding has no keys")]
    EmptyKeys,

    #[error("modifier {0:?} has no side, name the left or right key (e.g. LAlt, RCtrl)")]
    SidelessModifier(String),

    #[error("invalid binding #{index} [{keys}]")]
    InvalidBinding {
        index: usize,
        keys: String,
        source: Box<ConfigError>,
    },
}

/// Log verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            _ => Err(ConfigError::InvalidLogLevel(s.to_string())),
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, ConfigError> {
        value.parse()
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        level.to_string()
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_filter().to_ascii_uppercase())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: LogLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualDesktopsConfig {
    /// Desktops to create at startup if fewer exist
    pub minimum_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    pub queue_capacity: usize,
    pub subscriber_capacity: usize,
}

/// One shortcut as written in the configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BindingConfig {
    /// Key names, e.g. `["LAlt", "LShift", "1"]`
    pub keys: Vec<String>,
    pub action: String,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub direction: KeyDirection,
    #[serde(default)]
    pub exclusive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortcutsConfig {
    pub bindings: Vec<BindingConfig>,
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub logging: LoggingConfig,
    pub virtual_desktops: VirtualDesktopsConfig,
    pub dispatch: DispatchConfig,
    pub shortcuts: ShortcutsConfig,
}

/// A binding whose key names and action have been resolved
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedBinding {
    pub binding: KeyBinding,
    pub action: ActionKind,
    pub direction: KeyDirection,
    pub exclusive: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                level: LogLevel::Debug,
            },
            virtual_desktops: VirtualDesktopsConfig {
                minimum_count: DEFAULT_MINIMUM_DESKTOPS,
            },
            dispatch: DispatchConfig {
                queue_capacity: DEFAULT_QUEUE_CAPACITY,
                subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
            },
            shortcuts: ShortcutsConfig {
                bindings: default_bindings(),
            },
        }
    }
}

/// LAlt+n switches to desktop n, LAlt+LShift+n carries the focused window
/// there, LAlt+N creates a desktop.
fn default_bindings() -> Vec<BindingConfig> {
    let binding = |keys: &[&str], action: &str, params: &[String]| BindingConfig {
        keys: keys.iter().map(|k| k.to_string()).collect(),
        action: action.to_string(),
        params: params.to_vec(),
        direction: KeyDirection::Release,
        exclusive: false,
    };

    let mut bindings = Vec::new();
    for n in 1..=9 {
        let desktop = n.to_string();
        let params = [desktop.clone()];
        bindings.push(binding(&["LAlt", &desktop], "SwitchDesktop", &params));
        bindings.push(binding(
            &["LAlt", "LShift", &desktop],
            "MoveWindowToDesktop",
            &params,
        ));
    }
    bindings.push(binding(&["LAlt", "N"], "CreateDesktop", &[]));
    bindings
}

/// Partial configuration as read from a file; absent fields keep defaults
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    logging: Option<FileLogging>,
    virtual_desktops: Option<FileDesktops>,
    dispatch: Option<FileDispatch>,
    shortcuts: Option<FileShortcuts>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileLogging {
    level: Option<LogLevel>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileDesktops {
    minimum_count: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileDispatch {
    queue_capacity: Option<usize>,
    subscriber_capacity: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileShortcuts {
    bindings: Vec<BindingConfig>,
}

impl Config {
    /// Defaults overlaid with `path`, or with the per-user config file when
    /// no path is given and that file exists.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().filter(|p| p.exists()),
        };
        if let Some(path) = path {
            config.merge(read_file(&path)?);
        }
        Ok(config)
    }

    /// `%APPDATA%\desk-chord\config.yaml` on Windows,
    /// `$HOME/.config/desk-chord/config.yaml` elsewhere
    pub fn default_path() -> Option<PathBuf> {
        let base = if cfg!(windows) {
            PathBuf::from(std::env::var_os("APPDATA")?)
        } else {
            PathBuf::from(std::env::var_os("HOME")?).join(".config")
        };
        Some(base.join("desk-chord").join("config.yaml"))
    }

    fn merge(&mut self, file: FileConfig) {
        if let Some(level) = file.logging.and_then(|l| l.level) {
            self.logging.level = level;
        }
        if let Some(count) = file.virtual_desktops.and_then(|d| d.minimum_count) {
            self.virtual_desktops.minimum_count = count;
        }
        if let Some(dispatch) = file.dispatch {
            if let Some(capacity) = dispatch.queue_capacity {
                self.dispatch.queue_capacity = capacity;
            }
            if let Some(capacity) = dispatch.subscriber_capacity {
                self.dispatch.subscriber_capacity = capacity;
            }
        }
        // A binding list replaces the defaults wholesale.
        if let Some(shortcuts) = file.shortcuts.filter(|s| !s.bindings.is_empty()) {
            self.shortcuts.bindings = shortcuts.bindings;
        }
    }

    /// Resolve every binding; the first invalid one aborts startup
    pub fn resolve_bindings(&self) -> Result<Vec<ResolvedBinding>, ConfigError> {
        self.shortcuts
            .bindings
            .iter()
            .enumerate()
            .map(|(index, binding)| {
                binding
                    .resolve()
                    .map_err(|e| ConfigError::InvalidBinding {
                        index,
                        keys: binding.keys.join(" + "),
                        source: Box::new(e),
                    })
            })
            .collect()
    }

    pub fn service_options(&self) -> ServiceOptions {
        ServiceOptions {
            queue_capacity: self.dispatch.queue_capacity,
            subscriber_capacity: self.dispatch.subscriber_capacity,
        }
    }

    /// Write the built-in defaults to `path` as commented YAML
    pub fn generate_default_file(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let body = serde_yaml::to_string(&Self::default())?;
        std::fs::write(path, format!("{FILE_HEADER}{body}")).map_err(|source| {
            ConfigError::Write {
                path: path.to_path_buf(),
                source,
            }
        })
    }
}

impl BindingConfig {
    pub fn resolve(&self) -> Result<ResolvedBinding, ConfigError> {
        if self.keys.is_empty() {
            return Err(ConfigError::EmptyKeys);
        }
        let binding = self
            .keys
            .iter()
            .map(|name| resolve_key(name))
            .collect::<Result<KeyBinding, _>>()?;
        let action = ActionKind::parse(&self.action, &self.params)?;

        Ok(ResolvedBinding {
            binding,
            action,
            direction: self.direction,
            exclusive: self.exclusive,
        })
    }
}

fn resolve_key(name: &str) -> Result<VirtualKey, ConfigError> {
    let key =
        VirtualKey::from_name(name).ok_or_else(|| ConfigError::UnknownKey(name.to_string()))?;
    if key.is_sideless_modifier() {
        return Err(ConfigError::SidelessModifier(name.to_string()));
    }
    Ok(key)
}

fn read_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    if ext != "yaml" && ext != "yml" {
        return Err(ConfigError::UnsupportedFormat(ext));
    }

    let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&data).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
