use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use crate::agent::Agent;

use super::{CancellableWait, State, Transition};

/// Waits for the poll interval before checking for updates.
#[derive(Debug)]
pub struct PollState {
    /// Seconds waited so far; written only by the countdown task.
    elapsed: Arc<AtomicU64>,
    /// Overrides the poll interval for one cycle when non-zero.
    extra_poll: u64,
    gate: CancellableWait,
}

impl Default for PollState {
    fn default() -> Self {
        Self::new()
    }
}

impl PollState {
    pub fn new() -> Self {
        Self::with_extra_poll(0)
    }

    pub fn with_extra_poll(extra_poll: u64) -> Self {
        Self {
            elapsed: Arc::new(AtomicU64::new(0)),
            extra_poll,
            gate: CancellableWait::new(),
        }
    }

    pub fn elapsed(&self) -> u64 {
        self.elapsed.load(Ordering::Acquire)
    }

    pub fn extra_poll(&self) -> u64 {
        self.extra_poll
    }

    pub fn cancel(&self, ok: bool) -> bool {
        self.gate.cancel(ok)
    }

    pub(super) async fn handle(mut self, agent: &Agent) -> Transition {
        let handle = agent.handle();

        // Register before looking at the probe flag so a concurrent probe
        // request either sets the flag we read or cancels this gate. A
        // cancel delivered before handling is kept.
        handle.register_wait(self.gate.clone());

        if handle.take_probe_now() {
            handle.clear_wait();
            info!("Probe requested, skipping poll wait");
            return self.expire();
        }

        let target = if self.extra_poll > 0 {
            self.extra_poll
        } else {
            agent.poll_interval().as_secs()
        };
        debug!(elapsed = self.elapsed(), target, "Waiting for next poll");

        let timer = tokio::spawn(countdown(self.elapsed.clone(), target, self.gate.clone()));
        let proceed = self.gate.wait().await;
        timer.abort();
        let _ = timer.await;
        handle.clear_wait();

        if proceed {
            handle.take_probe_now();
            return self.expire();
        }

        debug!(elapsed = self.elapsed(), "Poll wait interrupted");
        self.gate = CancellableWait::new();
        Transition::to(State::Poll(self))
    }

    fn expire(self) -> Transition {
        self.elapsed.store(0, Ordering::Release);
        debug!("Moving to UpdateCheck state");
        Transition::to(State::UpdateCheck)
    }
}

async fn countdown(elapsed: Arc<AtomicU64>, target: u64, gate: CancellableWait) {
    let mut ticker = time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    // `<` rather than `!=` so a zero target never spins
    while elapsed.load(Ordering::Acquire) < target {
        ticker.tick().await;
        elapsed.fetch_add(1, Ordering::AcqRel);
    }

    gate.cancel(true);
}
