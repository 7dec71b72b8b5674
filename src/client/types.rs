//! Wire-level data exchanged with the update server.

use serde::Serialize;
use tokio::sync::mpsc::Sender;

use crate::states::StateKind;
use crate::update_package::UpdatePackage;

/// Outcome of probing the update server.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeResponse {
    NoUpdate,
    /// Server asked to come back after this many seconds.
    ExtraPoll(u64),
    Update(UpdatePackage),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReportPayload {
    pub status: StateKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_uid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DownloadProgress {
    pub downloaded_bytes: u64,
    pub total_bytes: Option<u64>,
}

impl DownloadProgress {
    pub fn percent(&self) -> Option<u8> {
        self.total_bytes.map(|total| {
            if total == 0 {
                100
            } else {
                let percent = (self.downloaded_bytes.saturating_mul(100)) / total;
                percent.min(100) as u8
            }
        })
    }
}

pub type DownloadProgressSender = Sender<DownloadProgress>;
