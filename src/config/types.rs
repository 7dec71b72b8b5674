use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the update agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_server_address")]
    pub server_address: String,

    #[serde(default = "default_true")]
    pub polling_enabled: bool,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_extra_poll_interval")]
    pub extra_poll_interval_secs: u64,

    #[serde(default)]
    pub read_only: bool,

    #[serde(default = "default_runtime_settings_path")]
    pub runtime_settings_path: PathBuf,

    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    #[serde(default = "default_metadata_path")]
    pub metadata_path: PathBuf,

    #[serde(default = "default_listen_address")]
    pub listen_address: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_address: default_server_address(),
            polling_enabled: true,
            poll_interval_secs: default_poll_interval(),
            extra_poll_interval_secs: default_extra_poll_interval(),
            read_only: false,
            runtime_settings_path: default_runtime_settings_path(),
            download_dir: default_download_dir(),
            metadata_path: default_metadata_path(),
            listen_address: default_listen_address(),
        }
    }
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn extra_poll_interval(&self) -> Duration {
        Duration::from_secs(self.extra_poll_interval_secs)
    }
}

fn default_true() -> bool {
    true
}

fn default_server_address() -> String {
    "http://localhost:8080".to_string()
}

fn default_poll_interval() -> u64 {
    60 * 60
}

fn default_extra_poll_interval() -> u64 {
    5 * 60
}

fn default_runtime_settings_path() -> PathBuf {
    PathBuf::from("/data/fota/runtime_settings.json")
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("/tmp/fota/download")
}

fn default_metadata_path() -> PathBuf {
    PathBuf::from("/usr/share/fota")
}

fn default_listen_address() -> String {
    "127.0.0.1:8081".to_string()
}
