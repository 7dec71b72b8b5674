use std::sync::Arc;
use tokio::sync::watch;

/// One-shot gate a state can block on while staying interruptible.
///
/// The first `cancel` wins and its `ok` value is what `wait` resolves to.
#[derive(Debug, Clone)]
pub struct CancellableWait {
    tx: Arc<watch::Sender<Option<bool>>>,
}

impl Default for CancellableWait {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellableWait {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Deliver `ok` to the waiter. Later calls are no-ops.
    pub fn cancel(&self, ok: bool) -> bool {
        self.tx.send_if_modified(|delivered| {
            if delivered.is_some() {
                return false;
            }
            *delivered = Some(ok);
            true
        });
        ok
    }

    pub fn is_delivered(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Block until `cancel` is called; returns the delivered value.
    pub async fn wait(&self) -> bool {
        let mut rx = self.tx.subscribe();
        let delivered = match rx.wait_for(Option::is_some).await {
            Ok(delivered) => *delivered == Some(true),
            // the sender lives in `self`, so the channel cannot close here
            Err(_) => false,
        };
        delivered
    }
}
