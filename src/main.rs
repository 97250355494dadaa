//! desk-chord: global key-chord daemon for virtual desktops
//!
//! Runs in the background and provides:
//! - A low-level keyboard hook that tracks which keys are held
//! - Exact-chord matching against configured shortcuts
//! - Desktop actions (switch, move window, create) run off the hook thread
//!
//! Key state lives only in memory; nothing is persisted between runs.

mod actions;
mod config;
mod desktop;
mod events;
mod hook;
mod keys;
mod lifecycle;
mod shortcut;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info, trace, warn};
use tracing_subscriber::EnvFilter;

use crate::actions::build_registrations;
use crate::config::{Config, LogLevel};
use crate::desktop::{ensure_minimum_desktops, DesktopManager, DryRunDesktop};
use crate::events::KeyEvent;
use crate::hook::{platform_capture, CaptureError, Subscription};
use crate::keys::KeyBinding;
use crate::lifecycle::ShutdownSignal;
use crate::shortcut::{ShortcutError, ShortcutService};

#[derive(Debug, Parser)]
#[command(name = "desk-chord", version, about)]
struct Cli {
    /// Configuration file (YAML)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// DEBUG, INFO, WARN or ERROR. RUST_LOG takes precedence.
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    /// Create desktops at startup until at least this many exist
    #[arg(long, value_name = "N")]
    min_desktops: Option<usize>,

    /// Write the default configuration to PATH and exit
    #[arg(long, value_name = "PATH")]
    generate_config: Option<PathBuf>,

    /// Log desktop operations instead of performing them
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.generate_config {
        Config::generate_default_file(path)?;
        println!("wrote default configuration to {}", path.display());
        return Ok(());
    }

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(minimum) = cli.min_desktops {
        config.virtual_desktops.minimum_count = minimum;
    }

    init_logging(config.logging.level);

    info!(version = env!("CARGO_PKG_VERSION"), "desk-chord starting");
    info!(
        level = %config.logging.level,
        minimum_desktops = config.virtual_desktops.minimum_count,
        bindings = config.shortcuts.bindings.len(),
        "configuration loaded"
    );

    let bindings = config
        .resolve_bindings()
        .context("invalid shortcut configuration")?;

    let desktops = open_desktops(cli.dry_run)?;
    ensure_minimum_desktops(desktops.as_ref(), config.virtual_desktops.minimum_count)
        .context("failed to create virtual desktops")?;

    let mut service = ShortcutService::new(platform_capture(), config.service_options());
    service.register(build_registrations(bindings, Arc::clone(&desktops)))?;

    // Subscribed before start so no early transition is missed.
    let events = service.subscribe();
    let diagnostics_id = events.id();
    let diagnostics = tokio::spawn(log_key_events(events));

    if let Err(e) = service.start() {
        if matches!(e, ShortcutError::Capture(CaptureError::Unsupported)) {
            error!("global key capture is only available on Windows");
        }
        return Err(e).context("failed to start shortcut service");
    }

    info!(bindings = service.binding_count(), "desk-chord running");

    ShutdownSignal::new().wait().await;
    info!("shutting down...");

    let held = service.pressed_keys();
    if !held.is_empty() {
        debug!(held = %KeyBinding::new(held), "keys still held at shutdown");
    }

    service.unsubscribe(diagnostics_id);
    if let Err(e) = diagnostics.await {
        error!(?e, "diagnostic subscriber failed");
    }

    let stopped = service.stop().await;
    if service.dropped_matches() > 0 {
        warn!(
            dropped = service.dropped_matches(),
            "shortcuts were dropped while the dispatch queue was full"
        );
    }
    stopped.context("failed to stop shortcut service")?;

    info!("desk-chord stopped");
    Ok(())
}

fn init_logging(level: LogLevel) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter())),
        )
        .init();
}

fn open_desktops(dry_run: bool) -> Result<Arc<dyn DesktopManager>> {
    if dry_run {
        info!("dry run: desktop operations are logged, not performed");
        return Ok(Arc::new(DryRunDesktop::new(1)));
    }

    #[cfg(windows)]
    {
        let accessor = crate::desktop::VirtualDesktopAccessor::load()
            .context("virtual desktops unavailable, try --dry-run")?;
        Ok(Arc::new(accessor))
    }
    #[cfg(not(windows))]
    {
        warn!("virtual desktops are only supported on Windows, falling back to dry run");
        Ok(Arc::new(DryRunDesktop::new(1)))
    }
}

/// Log every raw transition until the service closes the subscription
async fn log_key_events(mut events: Subscription<Arc<KeyEvent>>) {
    while let Some(event) = events.recv().await {
        debug!(%event, "key event");
        if tracing::enabled!(tracing::Level::TRACE) {
            match serde_json::to_string(event.as_ref()) {
                Ok(json) => trace!(event = %json, "key event json"),
                Err(e) => warn!(?e, "failed to serialize key event"),
            }
        }
    }
    debug!(subscriber = ?events.id(), "diagnostic subscriber closed");
}
