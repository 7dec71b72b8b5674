//! The capability the state machine uses to act on the outside world.

use async_trait::async_trait;

use crate::states::StateKind;
use crate::types::AgentError;

/// Everything the state machine needs from network, storage and installers.
///
/// [`Agent`](crate::agent::Agent) implements it for production; any other
/// implementation can be plugged in with `Agent::with_controller`.
#[async_trait]
pub trait Controller: Send + Sync {
    /// Whether an update is available and accepted for this device.
    async fn check_update(&self) -> bool;

    async fn fetch_update(&self) -> Result<(), AgentError>;

    /// Start installing the fetched update.
    async fn install_update(&self) -> Result<(), AgentError>;

    /// Wait for the running install to finish.
    async fn install_status(&self) -> Result<(), AgentError>;

    /// Mark the installed update as applied.
    async fn finalize_install(&self) -> Result<(), AgentError>;

    /// Best-effort notification; never influences a transition.
    async fn report(&self, state: StateKind, detail: Option<&str>);
}
