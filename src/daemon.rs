//! The run loop driving the agent's state machine.

use tracing::{debug, error, info};

use crate::agent::{Agent, AgentHandle};
use crate::firmware::{state_change_callback, CallbackDecision};
use crate::states::{State, Transition};

pub const EXIT_STOPPED: i32 = 0;
pub const EXIT_FATAL: i32 = 1;

pub struct Daemon {
    agent: Agent,
}

impl Daemon {
    pub fn new(agent: Agent) -> Self {
        Self { agent }
    }

    pub fn handle(&self) -> AgentHandle {
        self.agent.handle().clone()
    }

    /// Drive the agent until a stop is requested or a fatal error occurs.
    ///
    /// Returns the process exit code.
    pub async fn run(mut self) -> i32 {
        info!(state = %self.agent.state_kind(), "Starting update agent");

        loop {
            let mut state = self.agent.take_state();

            // Requeued states are handled back to back.
            loop {
                if self.agent.handle().is_stopping() {
                    info!(state = %state.id(), "Update agent stopped");
                    self.agent.set_state(state);
                    return EXIT_STOPPED;
                }

                let kind = state.id();
                if kind.is_update_step() {
                    let decision =
                        state_change_callback(&self.agent.config().metadata_path, kind.as_str())
                            .await;
                    match decision {
                        Ok(CallbackDecision::Continue) => {}
                        Ok(CallbackDecision::Cancel) => {
                            info!(state = %kind, "State change cancelled by callback");
                            self.agent.discard_pending().await;
                            self.agent.set_state(State::Idle);
                            break;
                        }
                        Err(err) => state = State::error(Some(err)),
                    }
                }

                self.enter(&state).await;

                match state.handle(&self.agent).await {
                    Ok(Transition {
                        next,
                        requeue: true,
                    }) => {
                        debug!(state = %next.id(), "Requeuing state");
                        state = next;
                    }
                    Ok(Transition { next, .. }) => {
                        self.agent.set_state(next);
                        break;
                    }
                    Err(err) => {
                        error!(error = %err, "Fatal error, terminating");
                        return EXIT_FATAL;
                    }
                }
            }

            tokio::task::yield_now().await;
        }
    }

    async fn enter(&self, state: &State) {
        let kind = state.id();
        self.agent.handle().publish(kind);

        let detail = match state {
            State::Error(error) => Some(error.cause().to_string()),
            _ => None,
        };
        self.agent
            .controller()
            .report(kind, detail.as_deref())
            .await;
    }
}
