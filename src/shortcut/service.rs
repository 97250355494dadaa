//! Capture callback → key state → match → bounded dispatch → worker
//!
//! The capture callback runs on a thread the OS input pipeline waits on, so
//! everything it does is brief and non-blocking: one lock-protected state
//! update, a non-blocking fan-out, a linear match and a `try_send` onto the
//! dispatch queue. Matched actions run on a separate worker task.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::events::{KeyDirection, KeyEvent};
use crate::hook::{
    Broadcaster, CaptureError, CaptureSource, KeyCallback, KeyStateTracker, SubscriberId,
    Subscription, DEFAULT_SUBSCRIBER_CAPACITY,
};
use crate::keys::VirtualKey;

use super::registration::InFlight;
use super::{BindingMatcher, Registration};

/// Default depth of the dispatch queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Queue sizes for one service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceOptions {
    /// Matched shortcuts waiting for the worker
    pub queue_capacity: usize,
    /// Raw events buffered per diagnostic subscriber
    pub subscriber_capacity: usize,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
        }
    }
}

/// Errors reported by `start`, `stop` and `register`
#[derive(Debug, thiserror::Error)]
pub enum ShortcutError {
    #[error("shortcut service is already running")]
    AlreadyRunning,

    #[error("shortcut service is not running")]
    NotRunning,

    #[error(transparent)]
    Capture(#[from] CaptureError),
}

/// State shared between the service handle and the capture callback
struct Pipeline {
    tracker: KeyStateTracker,
    events: Broadcaster<Arc<KeyEvent>>,
    matcher: RwLock<BindingMatcher>,
    /// Dispatch queue of the active session; `None` while stopped
    session: RwLock<Option<mpsc::Sender<Arc<Registration>>>>,
    dropped: AtomicU64,
}

impl Pipeline {
    /// Process one raw transition. Never blocks on the worker.
    fn handle(&self, key: VirtualKey, direction: KeyDirection) {
        // Held for the whole transition so `stop` cannot reset the tracker
        // half way through.
        let session = self.session.read();
        let Some(dispatch) = session.as_ref() else {
            return;
        };

        let pressed = self.tracker.update(key, direction);
        let event = Arc::new(KeyEvent::new(pressed, key, direction));
        self.events.broadcast(Arc::clone(&event));

        let Some(registration) = self.matcher.read().match_event(&event) else {
            return;
        };

        match dispatch.try_send(registration) {
            Ok(()) => {}
            Err(TrySendError::Full(registration)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(shortcut = %registration, "dispatch queue full, dropping shortcut");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("dispatch worker gone, ignoring shortcut");
            }
        }
    }
}

/// Running worker of one capture session
struct Worker {
    shutdown_tx: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

/// Owns the capture hook, the binding registry and the dispatch worker
pub struct ShortcutService {
    pipeline: Arc<Pipeline>,
    capture: Box<dyn CaptureSource>,
    options: ServiceOptions,
    worker: Option<Worker>,
}

impl ShortcutService {
    pub fn new(capture: Box<dyn CaptureSource>, options: ServiceOptions) -> Self {
        Self {
            pipeline: Arc::new(Pipeline {
                tracker: KeyStateTracker::new(),
                events: Broadcaster::new(options.subscriber_capacity),
                matcher: RwLock::new(BindingMatcher::new()),
                session: RwLock::new(None),
                dropped: AtomicU64::new(0),
            }),
            capture,
            options,
            worker: None,
        }
    }

    /// Add registrations. Only allowed while stopped; order is the match
    /// priority.
    pub fn register(
        &self,
        registrations: impl IntoIterator<Item = Registration>,
    ) -> Result<(), ShortcutError> {
        if self.is_running() {
            return Err(ShortcutError::AlreadyRunning);
        }
        let mut matcher = self.pipeline.matcher.write();
        for registration in registrations {
            debug!(shortcut = %registration, "registered shortcut");
            matcher.register([registration]);
        }
        Ok(())
    }

    /// Spawn the worker and install the capture hook.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) -> Result<(), ShortcutError> {
        if self.worker.is_some() {
            return Err(ShortcutError::AlreadyRunning);
        }

        let (dispatch_tx, dispatch_rx) = mpsc::channel(self.options.queue_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        *self.pipeline.session.write() = Some(dispatch_tx);
        let handle = tokio::spawn(run_worker(dispatch_rx, shutdown_rx));

        let pipeline = Arc::clone(&self.pipeline);
        let callback: KeyCallback = Arc::new(move |key, direction| pipeline.handle(key, direction));

        if let Err(e) = self.capture.install(callback) {
            error!(?e, "failed to install key capture");
            self.pipeline.session.write().take();
            let _ = shutdown_tx.send(());
            return Err(e.into());
        }

        self.worker = Some(Worker {
            shutdown_tx,
            handle,
        });
        info!(
            bindings = self.pipeline.matcher.read().len(),
            queue_capacity = self.options.queue_capacity,
            "shortcut service started"
        );
        Ok(())
    }

    /// Stop matching, wait for in-flight actions, release the hook and clear
    /// all session state.
    ///
    /// A hook uninstall failure is returned, but subscriber queues and key
    /// state are cleared regardless.
    pub async fn stop(&mut self) -> Result<(), ShortcutError> {
        let worker = self.worker.take().ok_or(ShortcutError::NotRunning)?;

        self.pipeline.session.write().take();
        let _ = worker.shutdown_tx.send(());
        if let Err(e) = worker.handle.await {
            error!(?e, "dispatch worker failed");
        }

        let uninstalled = self.capture.uninstall();
        self.pipeline.events.close_all();
        self.pipeline.tracker.reset();

        match uninstalled {
            Ok(()) => {
                info!("shortcut service stopped");
                Ok(())
            }
            Err(e) => {
                error!(?e, "failed to uninstall key capture");
                Err(e.into())
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Observe every raw key event, independent of matching
    pub fn subscribe(&self) -> Subscription<Arc<KeyEvent>> {
        self.pipeline.events.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.pipeline.events.unsubscribe(id)
    }

    /// Keys currently held
    pub fn pressed_keys(&self) -> BTreeSet<VirtualKey> {
        self.pipeline.tracker.snapshot()
    }

    /// Matches discarded because the dispatch queue was full
    pub fn dropped_matches(&self) -> u64 {
        self.pipeline.dropped.load(Ordering::Relaxed)
    }

    pub fn binding_count(&self) -> usize {
        self.pipeline.matcher.read().len()
    }
}

/// Dequeue matched shortcuts and run each on the blocking pool without
/// waiting for it, so a slow action does not delay the next one.
async fn run_worker(
    mut queue: mpsc::Receiver<Arc<Registration>>,
    mut shutdown: broadcast::Receiver<()>,
) {
    debug!("dispatch worker started");
    let mut in_flight: JoinSet<(String, anyhow::Result<()>)> = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            _ = shutdown.recv() => break,

            next = queue.recv() => match next {
                Some(registration) => dispatch(&mut in_flight, registration),
                None => break,
            },

            Some(done) = in_flight.join_next() => report(done),
        }
    }

    queue.close();
    let mut discarded = 0usize;
    while queue.try_recv().is_ok() {
        discarded += 1;
    }
    if discarded > 0 {
        debug!(discarded, "discarded queued shortcuts on shutdown");
    }

    while let Some(done) = in_flight.join_next().await {
        report(done);
    }
    debug!("dispatch worker stopped");
}

fn dispatch(
    in_flight: &mut JoinSet<(String, anyhow::Result<()>)>,
    registration: Arc<Registration>,
) {
    let Some(run) = InFlight::begin(Arc::clone(&registration)) else {
        warn!(shortcut = %registration, "previous invocation still running, skipping");
        return;
    };

    info!(shortcut = %registration, "executing action");
    in_flight.spawn_blocking(move || {
        let label = run.registration().label().to_string();
        let result = run.execute();
        (label, result)
    });
}

fn report(done: Result<(String, anyhow::Result<()>), tokio::task::JoinError>) {
    match done {
        Ok((label, Ok(()))) => debug!(shortcut = %label, "action finished"),
        Ok((label, Err(e))) => error!(shortcut = %label, error = %e, "action failed"),
        Err(e) => error!(?e, "action task aborted"),
    }
}
