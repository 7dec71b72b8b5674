//! Update lifecycle state machine.
//!
//! ```text
//! Idle -> Poll -> UpdateCheck -> UpdateFetch -> UpdateInstall -> Installing -> Installed -> WaitingForReboot
//!          ^  ^        |           ^     |        ^     |             |            |
//!          |  `--------'           `-----'        `-----'             v            v
//!          `--------------------------------------------------------- Error <------'
//! ```
//!
//! `UpdateFetch` and `UpdateInstall` retry themselves on failure and ask the
//! daemon to run them again right away. A fatal cause in `Error` stops the
//! daemon.

mod error;
mod kind;
mod poll;
mod update;
mod wait;

use tracing::debug;

use crate::agent::Agent;
use crate::types::AgentError;

pub use error::ErrorState;
pub use kind::StateKind;
pub use poll::PollState;
pub use wait::CancellableWait;

/// The phase the agent is currently in, with its phase-local data.
#[derive(Debug, Default)]
pub enum State {
    #[default]
    Idle,
    Poll(PollState),
    UpdateCheck,
    UpdateFetch,
    UpdateInstall,
    Installing,
    Installed,
    WaitingForReboot,
    Error(ErrorState),
}

/// Result of handling a state.
#[derive(Debug)]
pub struct Transition {
    pub next: State,
    /// Handle `next` again immediately, without yielding to the daemon loop.
    pub requeue: bool,
}

impl Transition {
    pub fn to(next: State) -> Self {
        Self {
            next,
            requeue: false,
        }
    }

    pub fn requeue(next: State) -> Self {
        Self {
            next,
            requeue: true,
        }
    }
}

impl State {
    pub fn poll() -> Self {
        State::Poll(PollState::new())
    }

    /// Error state for `cause`; no cause at all is treated as fatal.
    pub fn error(cause: Option<AgentError>) -> Self {
        State::Error(ErrorState::new(cause))
    }

    pub fn id(&self) -> StateKind {
        match self {
            State::Idle => StateKind::Idle,
            State::Poll(_) => StateKind::Poll,
            State::UpdateCheck => StateKind::UpdateCheck,
            State::UpdateFetch => StateKind::UpdateFetch,
            State::UpdateInstall => StateKind::UpdateInstall,
            State::Installing => StateKind::Installing,
            State::Installed => StateKind::Installed,
            State::WaitingForReboot => StateKind::WaitingForReboot,
            State::Error(_) => StateKind::Error,
        }
    }

    /// Interrupt the state's wait, if it has one. Returns `ok`.
    pub fn cancel(&self, ok: bool) -> bool {
        match self {
            State::Poll(poll) => poll.cancel(ok),
            _ => ok,
        }
    }

    /// Run the state against `agent`.
    ///
    /// `Err` is only returned by an error state carrying a fatal cause.
    pub async fn handle(self, agent: &Agent) -> Result<Transition, AgentError> {
        debug!(state = %self.id(), "Handling state");
        let transition = match self {
            State::Idle => update::idle(agent).await,
            State::Poll(poll) => poll.handle(agent).await,
            State::UpdateCheck => update::check(agent).await,
            State::UpdateFetch => update::fetch(agent).await,
            State::UpdateInstall => update::install(agent).await,
            State::Installing => update::installing(agent).await,
            State::Installed => update::installed(agent).await,
            State::WaitingForReboot => update::waiting_for_reboot(agent).await,
            State::Error(error) => return error.handle(agent).await,
        };
        Ok(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    use crate::agent::tests::test_agent;
    use crate::controller::testing::ScriptedController;

    async fn step(state: State, controller: ScriptedController) -> Transition {
        let agent = test_agent().with_controller(Arc::new(controller));
        state.handle(&agent).await.unwrap()
    }

    #[test]
    fn id_is_stable() {
        let states = vec![
            State::Idle,
            State::poll(),
            State::UpdateCheck,
            State::UpdateFetch,
            State::UpdateInstall,
            State::Installing,
            State::Installed,
            State::WaitingForReboot,
            State::error(None),
        ];
        for (state, kind) in states.iter().zip(StateKind::ALL) {
            assert_eq!(state.id(), kind);
            assert_eq!(state.id(), kind);
        }
    }

    #[test]
    fn cancel_returns_flag() {
        assert!(State::UpdateCheck.cancel(true));
        assert!(!State::Installed.cancel(false));
        assert!(State::poll().cancel(true));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_poll_goes_straight_to_check() {
        let agent = test_agent()
            .with_controller(Arc::new(ScriptedController::new()))
            .with_poll_interval(Duration::from_secs(3600));

        let state = State::poll();
        assert!(state.cancel(true));

        let started = Instant::now();
        let next = state.handle(&agent).await.unwrap();
        assert_eq!(next.next.id(), StateKind::UpdateCheck);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn interrupted_poll_gets_a_fresh_gate() {
        let agent = test_agent()
            .with_controller(Arc::new(ScriptedController::new()))
            .with_poll_interval(Duration::from_secs(3600));

        let state = State::poll();
        state.cancel(false);

        let next = state.handle(&agent).await.unwrap();
        assert_eq!(next.next.id(), StateKind::Poll);

        // the interrupted wait does not leak into the next one
        let started = Instant::now();
        let next = next.next.handle(&agent).await.unwrap();
        assert_eq!(next.next.id(), StateKind::UpdateCheck);
        assert!(started.elapsed() >= Duration::from_secs(3599));
    }

    #[tokio::test]
    async fn update_check_with_update() {
        let next = step(State::UpdateCheck, ScriptedController::new().update_available()).await;
        assert_eq!(next.next.id(), StateKind::UpdateFetch);
        assert!(!next.requeue);
    }

    #[tokio::test]
    async fn update_check_without_update() {
        let next = step(State::UpdateCheck, ScriptedController::new()).await;
        assert_eq!(next.next.id(), StateKind::Poll);
        assert!(!next.requeue);
        match next.next {
            State::Poll(poll) => assert_eq!(poll.extra_poll(), 0),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn update_fetch_success() {
        let next = step(State::UpdateFetch, ScriptedController::new()).await;
        assert_eq!(next.next.id(), StateKind::UpdateInstall);
        assert!(!next.requeue);
    }

    #[tokio::test]
    async fn update_fetch_failure_retries() {
        let next = step(State::UpdateFetch, ScriptedController::new().fetch_failures(1)).await;
        assert_eq!(next.next.id(), StateKind::UpdateFetch);
        assert!(next.requeue);
    }

    #[tokio::test]
    async fn update_install_transitions() {
        let next = step(State::UpdateInstall, ScriptedController::new()).await;
        assert_eq!(next.next.id(), StateKind::Installing);

        let next = step(State::UpdateInstall, ScriptedController::new().install_failures(1)).await;
        assert_eq!(next.next.id(), StateKind::UpdateInstall);
        assert!(next.requeue);
    }

    #[tokio::test]
    async fn installing_transitions() {
        let next = step(State::Installing, ScriptedController::new()).await;
        assert_eq!(next.next.id(), StateKind::Installed);

        let controller =
            ScriptedController::new().install_status_error(AgentError::Install("disk".into()));
        let next = step(State::Installing, controller).await;
        assert_eq!(next.next.id(), StateKind::Error);
    }

    #[tokio::test]
    async fn installed_transitions() {
        let next = step(State::Installed, ScriptedController::new()).await;
        assert_eq!(next.next.id(), StateKind::WaitingForReboot);

        let controller = ScriptedController::new().finalize_error(AgentError::Generic);
        let next = step(State::Installed, controller).await;
        assert_eq!(next.next.id(), StateKind::Error);
    }

    #[tokio::test]
    async fn idle_moves_to_poll_when_polling_enabled() {
        let next = step(State::Idle, ScriptedController::new()).await;
        assert_eq!(next.next.id(), StateKind::Poll);
    }

    #[tokio::test]
    async fn idle_waits_for_probe_when_polling_disabled() {
        let mut agent = test_agent().with_controller(Arc::new(ScriptedController::new()));
        agent.config_mut().polling_enabled = false;
        let handle = agent.handle().clone();

        let waiter = tokio::spawn(async move { State::Idle.handle(&agent).await.unwrap() });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        handle.probe_now();
        let next = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next.next.id(), StateKind::Poll);
    }

    #[tokio::test]
    async fn waiting_for_reboot_holds_until_stop() {
        let agent = test_agent().with_controller(Arc::new(ScriptedController::new()));
        agent.handle().stop();

        let next = State::WaitingForReboot.handle(&agent).await.unwrap();
        assert_eq!(next.next.id(), StateKind::WaitingForReboot);
    }

    #[tokio::test]
    async fn recoverable_error_returns_to_poll() {
        let agent = test_agent()
            .with_controller(Arc::new(ScriptedController::new()))
            .with_extra_poll_interval(Duration::from_secs(42));

        let next = State::error(Some(AgentError::Server("503".into())))
            .handle(&agent)
            .await
            .unwrap();
        match next.next {
            State::Poll(poll) => assert_eq!(poll.extra_poll(), 42),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn fatal_error_terminates() {
        let agent = test_agent().with_controller(Arc::new(ScriptedController::new()));
        let cause = AgentError::fatal(AgentError::Install("partition".into()));

        let result = State::error(Some(cause)).handle(&agent).await;
        assert!(matches!(result, Err(AgentError::Fatal(_))));
    }

    #[tokio::test]
    async fn missing_cause_is_fatal() {
        let state = State::error(None);
        match &state {
            State::Error(error) => assert!(error.cause().is_fatal()),
            other => panic!("unexpected {other:?}"),
        }

        let agent = test_agent().with_controller(Arc::new(ScriptedController::new()));
        assert!(state.handle(&agent).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn poll_waits_for_interval() {
        let agent = test_agent()
            .with_controller(Arc::new(ScriptedController::new()))
            .with_poll_interval(Duration::from_secs(2));

        let started = Instant::now();
        let next = State::poll().handle(&agent).await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(2));
        assert_eq!(next.next.id(), StateKind::UpdateCheck);
        assert!(!next.requeue);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_with_zero_interval_completes() {
        let agent = test_agent()
            .with_controller(Arc::new(ScriptedController::new()))
            .with_poll_interval(Duration::ZERO);

        let next = tokio::time::timeout(Duration::from_secs(1), State::poll().handle(&agent))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next.next.id(), StateKind::UpdateCheck);
    }

    #[tokio::test(start_paused = true)]
    async fn extra_poll_overrides_interval_once() {
        let agent = test_agent()
            .with_controller(Arc::new(ScriptedController::new()))
            .with_poll_interval(Duration::from_secs(3600));

        let started = Instant::now();
        let next = State::Poll(PollState::with_extra_poll(5))
            .handle(&agent)
            .await
            .unwrap();

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(5));
        assert!(elapsed < Duration::from_secs(3600));
        assert_eq!(next.next.id(), StateKind::UpdateCheck);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_now_cuts_poll_short() {
        let agent = Arc::new(
            test_agent()
                .with_controller(Arc::new(ScriptedController::new()))
                .with_poll_interval(Duration::from_secs(3600)),
        );
        let handle = agent.handle().clone();

        let started = Instant::now();
        let polling = tokio::spawn({
            let agent = agent.clone();
            async move { State::poll().handle(&agent).await.unwrap() }
        });
        tokio::time::sleep(Duration::from_secs(3)).await;
        handle.probe_now();

        let next = polling.await.unwrap();
        assert_eq!(next.next.id(), StateKind::UpdateCheck);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn pending_probe_skips_wait() {
        let agent = test_agent()
            .with_controller(Arc::new(ScriptedController::new()))
            .with_poll_interval(Duration::from_secs(3600));
        agent.handle().probe_now();

        let next = tokio::time::timeout(Duration::from_secs(5), State::poll().handle(&agent))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next.next.id(), StateKind::UpdateCheck);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_keeps_poll_progress() {
        let agent = Arc::new(
            test_agent()
                .with_controller(Arc::new(ScriptedController::new()))
                .with_poll_interval(Duration::from_secs(60)),
        );
        let handle = agent.handle().clone();

        let polling = tokio::spawn({
            let agent = agent.clone();
            async move { State::poll().handle(&agent).await.unwrap() }
        });
        tokio::time::sleep(Duration::from_millis(3500)).await;
        handle.stop();

        let next = polling.await.unwrap();
        match next.next {
            State::Poll(poll) => assert_eq!(poll.elapsed(), 3),
            other => panic!("unexpected {other:?}"),
        }
    }
}
