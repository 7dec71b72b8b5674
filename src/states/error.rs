use tracing::{error, warn};

use crate::agent::Agent;
use crate::types::AgentError;

use super::{PollState, State, Transition};

#[derive(Debug)]
pub struct ErrorState {
    cause: AgentError,
}

impl ErrorState {
    pub fn new(cause: Option<AgentError>) -> Self {
        let cause = cause.unwrap_or_else(|| AgentError::fatal(AgentError::Generic));
        Self { cause }
    }

    pub fn cause(&self) -> &AgentError {
        &self.cause
    }

    pub(super) async fn handle(self, agent: &Agent) -> Result<Transition, AgentError> {
        if self.cause.is_fatal() {
            error!(error = %self.cause, "Unrecoverable error");
            return Err(self.cause);
        }

        agent.discard_pending().await;

        let extra_poll = agent.extra_poll_interval().as_secs();
        warn!(
            error = %self.cause,
            extra_poll,
            "Update attempt abandoned, returning to Poll"
        );
        Ok(Transition::to(State::Poll(PollState::with_extra_poll(
            extra_poll,
        ))))
    }
}
