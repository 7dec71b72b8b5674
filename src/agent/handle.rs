use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{watch, Notify};
use tracing::info;

use crate::states::{CancellableWait, StateKind};

/// Thread-safe view of a running agent.
///
/// Outside callers (control surface, signal handlers) only ever read the
/// published state kind, request a probe or request a stop; they never touch
/// the state itself.
#[derive(Debug, Clone)]
pub struct AgentHandle {
    inner: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    kind: watch::Sender<StateKind>,
    stop: watch::Sender<bool>,
    probe_now: AtomicBool,
    probe: Notify,
    active_wait: Mutex<Option<CancellableWait>>,
}

impl AgentHandle {
    pub fn new(initial: StateKind) -> Self {
        let (kind, _) = watch::channel(initial);
        let (stop, _) = watch::channel(false);
        Self {
            inner: Arc::new(Shared {
                kind,
                stop,
                probe_now: AtomicBool::new(false),
                probe: Notify::new(),
                active_wait: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> StateKind {
        *self.inner.kind.borrow()
    }

    /// Ask for an update check as soon as possible. Returns the current state.
    pub fn probe_now(&self) -> StateKind {
        self.inner.probe_now.store(true, Ordering::SeqCst);
        if let Some(gate) = self.active_wait().as_ref() {
            gate.cancel(true);
        }
        self.inner.probe.notify_one();
        self.state()
    }

    /// Ask the daemon to leave its loop at the next state boundary.
    pub fn stop(&self) {
        info!("Stop requested");
        self.inner.stop.send_replace(true);
        if let Some(gate) = self.active_wait().as_ref() {
            gate.cancel(false);
        }
    }

    pub fn is_stopping(&self) -> bool {
        *self.inner.stop.borrow()
    }

    pub async fn stopped(&self) {
        let mut rx = self.inner.stop.subscribe();
        let _ = rx.wait_for(|stopping| *stopping).await;
    }

    pub(crate) fn publish(&self, kind: StateKind) {
        self.inner.kind.send_replace(kind);
    }

    /// Make `gate` the wait interrupted by probe and stop requests.
    pub(crate) fn register_wait(&self, gate: CancellableWait) {
        let mut slot = self.active_wait();
        if self.is_stopping() {
            gate.cancel(false);
        }
        *slot = Some(gate);
    }

    pub(crate) fn clear_wait(&self) {
        self.active_wait().take();
    }

    pub(crate) fn take_probe_now(&self) -> bool {
        self.inner.probe_now.swap(false, Ordering::SeqCst)
    }

    pub(crate) async fn probe_requested(&self) {
        self.inner.probe.notified().await;
    }

    fn active_wait(&self) -> MutexGuard<'_, Option<CancellableWait>> {
        self.inner
            .active_wait
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
