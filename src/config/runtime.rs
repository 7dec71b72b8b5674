use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::types::AgentError;

/// Settings the agent mutates while running and keeps across reboots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSettings {
    #[serde(default)]
    pub polling: PollingSettings,

    #[serde(default)]
    pub update: UpdateSettings,

    #[serde(skip)]
    path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PollingSettings {
    #[serde(default)]
    pub last: Option<DateTime<Utc>>,

    #[serde(default)]
    pub retries: u32,

    /// Extra interval requested by the update server, in seconds.
    #[serde(default)]
    pub extra_interval_secs: Option<u64>,

    /// Probe as soon as the agent reaches the poll state again.
    #[serde(default)]
    pub now: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateSettings {
    #[serde(default)]
    pub applied_package_uid: Option<String>,
}

impl RuntimeSettings {
    /// Load settings from `path`; a missing file gives defaults bound to it.
    pub async fn load(path: &Path) -> Result<Self, AgentError> {
        let mut settings = if path.exists() {
            let contents = fs::read_to_string(path).await.map_err(|err| {
                AgentError::Config(format!("Failed to read runtime settings: {err}"))
            })?;
            serde_json::from_str::<RuntimeSettings>(&contents).map_err(|err| {
                AgentError::Config(format!("Failed to parse runtime settings: {err}"))
            })?
        } else {
            debug!(path = %path.display(), "Runtime settings not found, using defaults");
            Self::default()
        };

        settings.path = Some(path.to_path_buf());
        Ok(settings)
    }

    pub async fn save(&self) -> Result<(), AgentError> {
        let Some(path) = self.path.as_deref() else {
            warn!("Runtime settings have no backing file, skipping save");
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents).await?;
        debug!(path = %path.display(), "Saved runtime settings");
        Ok(())
    }
}
