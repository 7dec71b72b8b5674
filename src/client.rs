//! HTTP client for the update server.

pub(crate) mod api;
mod download;
mod types;

pub use api::ApiClient;
pub use download::{download_to_path, DEFAULT_USER_AGENT, DOWNLOAD_TIMEOUT_SECS};
pub use types::{DownloadProgress, DownloadProgressSender, ProbeResponse, ReportPayload};
