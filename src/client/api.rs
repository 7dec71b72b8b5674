use reqwest::{Client, StatusCode};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::firmware::FirmwareMetadata;
use crate::types::AgentError;
use crate::update_package::UpdatePackage;

use super::download::{download_to_path, DEFAULT_USER_AGENT, DOWNLOAD_TIMEOUT_SECS};
use super::types::{DownloadProgressSender, ProbeResponse, ReportPayload};

const REQUEST_TIMEOUT_SECS: u64 = 30;
const EXTRA_POLL_HEADER: &str = "Add-Extra-Poll";
const RETRIES_HEADER: &str = "Api-Retries";

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(server_address: &str) -> Result<Self, AgentError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(DEFAULT_USER_AGENT)
            .build()
            .map_err(AgentError::Http)?;

        Ok(Self {
            http,
            base_url: server_address.trim_end_matches('/').to_string(),
        })
    }

    /// Ask the server whether an update exists for this device.
    pub async fn probe(
        &self,
        firmware: &FirmwareMetadata,
        retries: u32,
    ) -> Result<ProbeResponse, AgentError> {
        let response = self
            .http
            .post(self.url("/upgrades"))
            .header(RETRIES_HEADER, retries.to_string())
            .json(firmware)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(ProbeResponse::NoUpdate),
            StatusCode::OK => {
                if let Some(extra) = response
                    .headers()
                    .get(EXTRA_POLL_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.trim().parse::<u64>().ok())
                {
                    debug!(seconds = extra, "Server requested an extra poll");
                    return Ok(ProbeResponse::ExtraPoll(extra));
                }

                let body = response.bytes().await?;
                Ok(ProbeResponse::Update(UpdatePackage::parse(&body)?))
            }
            status => Err(AgentError::Server(format!("/upgrades returned {status}"))),
        }
    }

    pub async fn download_object(
        &self,
        product_uid: &str,
        package_uid: &str,
        sha256sum: &str,
        destination: &Path,
        progress_tx: Option<DownloadProgressSender>,
    ) -> Result<u64, AgentError> {
        let path = format!("/products/{product_uid}/packages/{package_uid}/objects/{sha256sum}");
        download_to_path(
            self.http.get(self.url(&path)),
            destination,
            progress_tx,
            Some(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS)),
        )
        .await
    }

    pub async fn report(&self, payload: &ReportPayload) -> Result<(), AgentError> {
        let response = self.http.post(self.url("/report")).json(payload).send().await?;

        if !response.status().is_success() {
            return Err(AgentError::Server(format!(
                "/report returned {}",
                response.status()
            )));
        }

        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}
