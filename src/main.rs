use std::net::SocketAddr;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use fota_agent::config::{Config, RuntimeSettings};
use fota_agent::daemon::{Daemon, EXIT_FATAL};
use fota_agent::firmware::FirmwareMetadata;
use fota_agent::server::{self, AppState};
use fota_agent::{Agent, AgentError};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (agent, listen_address) = match startup().await {
        Ok(started) => started,
        Err(err) => {
            error!(error = %err, "Failed to start update agent");
            std::process::exit(EXIT_FATAL);
        }
    };

    let control = AppState::from_agent(&agent);
    tokio::spawn(async move {
        if let Err(err) = server::run(control, listen_address).await {
            warn!(error = %err, "Control surface stopped");
        }
    });

    let daemon = Daemon::new(agent);
    let handle = daemon.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.stop();
        }
    });

    std::process::exit(daemon.run().await);
}

async fn startup() -> Result<(Agent, SocketAddr), AgentError> {
    let config = Config::load().await?;
    let listen_address: SocketAddr = config.listen_address.parse().map_err(|err| {
        AgentError::Config(format!("invalid listen address {}: {err}", config.listen_address))
    })?;

    let firmware = FirmwareMetadata::load(&config.metadata_path).await?;
    info!(
        product = %firmware.product_uid,
        version = %firmware.version,
        hardware = %firmware.hardware,
        "Loaded firmware metadata"
    );

    let runtime = RuntimeSettings::load(&config.runtime_settings_path).await?;

    let mut agent = Agent::new(config, firmware, runtime)?;
    agent.start_polling();
    Ok((agent, listen_address))
}
