//! Best-effort state reports sent to the update server.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::client::{ApiClient, ReportPayload};
use crate::states::StateKind;
use crate::types::AgentError;

#[async_trait]
pub trait Reporter: Send + Sync {
    async fn report(
        &self,
        state: StateKind,
        package_uid: Option<&str>,
        detail: Option<&str>,
    ) -> Result<(), AgentError>;
}

/// Reports states to the update server over HTTP.
pub struct ReportClient {
    api: ApiClient,
}

impl ReportClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Reporter for ReportClient {
    async fn report(
        &self,
        state: StateKind,
        package_uid: Option<&str>,
        detail: Option<&str>,
    ) -> Result<(), AgentError> {
        // Only states that belong to an update attempt are of interest to the server.
        if package_uid.is_none() && state != StateKind::Error {
            debug!(state = %state, "No package in flight, skipping report");
            return Ok(());
        }

        self.api
            .report(&ReportPayload {
                status: state,
                package_uid: package_uid.map(str::to_string),
                error_message: detail.map(str::to_string),
            })
            .await
    }
}

/// Send a report and swallow any failure.
pub async fn report_best_effort(
    reporter: &dyn Reporter,
    state: StateKind,
    package_uid: Option<&str>,
    detail: Option<&str>,
) {
    if let Err(err) = reporter.report(state, package_uid, detail).await {
        warn!(state = %state, error = %err, "Failed to report state");
    }
}
