use std::env;
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

use crate::types::AgentError;

use super::{paths, Config};

impl Config {
    /// Load configuration from the discovered config.json.
    /// A missing file yields defaults, a broken one is a startup error.
    pub async fn load() -> Result<Self, AgentError> {
        let config = Self::load_from(&paths::get_config_path()).await?;
        info!(
            server = %config.server_address,
            poll_interval = config.poll_interval_secs,
            polling = config.polling_enabled,
            "Loaded configuration"
        );
        Ok(config)
    }

    pub async fn load_from(path: &Path) -> Result<Self, AgentError> {
        let mut config = if path.exists() {
            let contents = fs::read_to_string(path)
                .await
                .map_err(|err| AgentError::Config(format!("Failed to read config file: {err}")))?;

            serde_json::from_str::<Config>(&contents).map_err(|err| {
                AgentError::Config(format!("Failed to parse {}: {err}", path.display()))
            })?
        } else {
            warn!(path = %path.display(), "Config file not found, using defaults");
            Self::default()
        };

        if let Ok(address) = env::var("FOTA_SERVER_ADDRESS") {
            let trimmed = address.trim();
            if !trimmed.is_empty() {
                config.server_address = trimmed.to_string();
            }
        }

        Ok(config)
    }
}
