//! The long-lived agent context driven by the daemon.

mod handle;
mod update;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::checksum::{ChecksumVerifier, Sha256Checker};
use crate::client::ApiClient;
use crate::config::{Config, RuntimeSettings};
use crate::controller::Controller;
use crate::firmware::FirmwareMetadata;
use crate::installer::{Installer, ModeInstaller};
use crate::reporter::{ReportClient, Reporter};
use crate::states::{State, StateKind};
use crate::types::AgentError;
use crate::update_package::UpdatePackage;

pub use handle::AgentHandle;

const NO_BUILD_TIME: &str = "No build time provided";

/// Update attempt in flight.
#[derive(Default)]
struct PendingUpdate {
    package: Option<UpdatePackage>,
    install_job: Option<JoinHandle<Result<(), AgentError>>>,
}

pub struct Agent {
    state: State,
    handle: AgentHandle,
    controller: Option<Arc<dyn Controller>>,
    config: Config,
    poll_interval: Duration,
    extra_poll_interval: Duration,
    version: String,
    build_time: String,
    firmware: FirmwareMetadata,
    runtime: Mutex<RuntimeSettings>,
    api: ApiClient,
    reporter: Arc<dyn Reporter>,
    checker: Arc<dyn ChecksumVerifier>,
    installer: Arc<dyn Installer>,
    pending: Mutex<PendingUpdate>,
}

impl Agent {
    /// Build an agent in `Idle` with the production collaborators.
    pub fn new(
        config: Config,
        firmware: FirmwareMetadata,
        runtime: RuntimeSettings,
    ) -> Result<Self, AgentError> {
        let api = ApiClient::new(&config.server_address)?;
        let checker: Arc<dyn ChecksumVerifier> = Arc::new(Sha256Checker);
        let handle = AgentHandle::new(StateKind::Idle);

        // an install from the previous run asked for a probe right away
        if runtime.polling.now {
            handle.probe_now();
        }

        Ok(Self {
            state: State::Idle,
            handle,
            controller: None,
            poll_interval: config.poll_interval(),
            extra_poll_interval: config.extra_poll_interval(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            build_time: option_env!("FOTA_BUILD_TIME")
                .unwrap_or(NO_BUILD_TIME)
                .to_string(),
            config,
            firmware,
            runtime: Mutex::new(runtime),
            reporter: Arc::new(ReportClient::new(api.clone())),
            installer: Arc::new(ModeInstaller::new(checker.clone())),
            checker,
            api,
            pending: Mutex::new(PendingUpdate::default()),
        })
    }

    /// Use `controller` instead of the agent's own implementation.
    pub fn with_controller(mut self, controller: Arc<dyn Controller>) -> Self {
        self.controller = Some(controller);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_extra_poll_interval(mut self, interval: Duration) -> Self {
        self.extra_poll_interval = interval;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_installer(mut self, installer: Arc<dyn Installer>) -> Self {
        self.installer = installer;
        self
    }

    pub fn with_checker(mut self, checker: Arc<dyn ChecksumVerifier>) -> Self {
        self.checker = checker;
        self
    }

    /// Move to `Poll` unless polling is disabled in the configuration.
    pub fn start_polling(&mut self) {
        if self.config.polling_enabled {
            self.set_state(State::poll());
        }
    }

    pub fn controller(&self) -> &dyn Controller {
        match &self.controller {
            Some(controller) => controller.as_ref(),
            None => self,
        }
    }

    pub fn handle(&self) -> &AgentHandle {
        &self.handle
    }

    pub fn state_kind(&self) -> StateKind {
        self.state.id()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn extra_poll_interval(&self) -> Duration {
        self.extra_poll_interval
    }

    pub fn polling_enabled(&self) -> bool {
        self.config.polling_enabled
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn build_time(&self) -> &str {
        &self.build_time
    }

    pub fn firmware(&self) -> &FirmwareMetadata {
        &self.firmware
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    #[cfg(test)]
    pub(crate) fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub(crate) fn take_state(&mut self) -> State {
        std::mem::take(&mut self.state)
    }

    pub(crate) fn set_state(&mut self, state: State) {
        self.handle.publish(state.id());
        self.state = state;
    }
}
