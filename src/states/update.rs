//! Handlers for the data-less states. Every outcome is decided by the
//! controller's answer.

use tracing::{debug, info, warn};

use crate::agent::Agent;

use super::{State, Transition};

pub(super) async fn idle(agent: &Agent) -> Transition {
    if !agent.polling_enabled() {
        debug!("Polling is disabled, waiting for a probe request");
        let handle = agent.handle();
        tokio::select! {
            _ = handle.probe_requested() => debug!("Probe requested while idle"),
            _ = handle.stopped() => {}
        }
    }

    Transition::to(State::poll())
}

pub(super) async fn check(agent: &Agent) -> Transition {
    if agent.controller().check_update().await {
        debug!("Update available, moving to UpdateFetch state");
        return Transition::to(State::UpdateFetch);
    }

    // No update: back to a regular poll. The extra poll interval is not
    // applied on this path.
    debug!("No update available, moving to Poll state");
    Transition::to(State::poll())
}

pub(super) async fn fetch(agent: &Agent) -> Transition {
    match agent.controller().fetch_update().await {
        Ok(()) => Transition::to(State::UpdateInstall),
        Err(err) => {
            warn!(error = %err, "Failed to fetch update, retrying");
            Transition::requeue(State::UpdateFetch)
        }
    }
}

pub(super) async fn install(agent: &Agent) -> Transition {
    match agent.controller().install_update().await {
        Ok(()) => Transition::to(State::Installing),
        Err(err) => {
            warn!(error = %err, "Failed to start install, retrying");
            Transition::requeue(State::UpdateInstall)
        }
    }
}

pub(super) async fn installing(agent: &Agent) -> Transition {
    match agent.controller().install_status().await {
        Ok(()) => Transition::to(State::Installed),
        Err(err) => Transition::to(State::error(Some(err))),
    }
}

pub(super) async fn installed(agent: &Agent) -> Transition {
    match agent.controller().finalize_install().await {
        Ok(()) => {
            info!("Update applied, waiting for reboot");
            Transition::to(State::WaitingForReboot)
        }
        Err(err) => Transition::to(State::error(Some(err))),
    }
}

pub(super) async fn waiting_for_reboot(agent: &Agent) -> Transition {
    agent.handle().stopped().await;
    Transition::to(State::WaitingForReboot)
}
