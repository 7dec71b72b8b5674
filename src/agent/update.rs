//! Production [`Controller`] backed by the update server, the download
//! directory and the install backends.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::checksum::ChecksumVerifier;
use crate::client::{DownloadProgress, ProbeResponse};
use crate::config::RuntimeSettings;
use crate::controller::Controller;
use crate::installer::Installer;
use crate::reporter::report_best_effort;
use crate::states::StateKind;
use crate::types::AgentError;
use crate::update_package::UpdatePackage;

use super::Agent;

#[async_trait]
impl Controller for Agent {
    async fn check_update(&self) -> bool {
        self.discard_pending().await;

        let mut runtime = self.runtime.lock().await;
        runtime.polling.now = false;

        let probe = self.api.probe(&self.firmware, runtime.polling.retries).await;
        runtime.polling.last = Some(Utc::now());

        let available = match probe {
            Err(err) => {
                runtime.polling.retries = runtime.polling.retries.saturating_add(1);
                warn!(error = %err, retries = runtime.polling.retries, "Probe failed");
                false
            }
            Ok(response) => {
                runtime.polling.retries = 0;
                runtime.polling.extra_interval_secs = None;
                match response {
                    ProbeResponse::NoUpdate => {
                        debug!("Server has no update for this device");
                        false
                    }
                    ProbeResponse::ExtraPoll(seconds) => {
                        info!(seconds, "Delaying the probing as requested by the server");
                        runtime.polling.extra_interval_secs = Some(seconds);
                        false
                    }
                    ProbeResponse::Update(package) => self.accept(package, &runtime).await,
                }
            }
        };

        self.persist(&runtime).await;
        available
    }

    async fn fetch_update(&self) -> Result<(), AgentError> {
        let package = self.pending_package().await?;
        let download_dir = &self.config.download_dir;
        fs::create_dir_all(download_dir).await?;
        prune_download_dir(download_dir, &package).await?;

        for object in package.objects() {
            let destination = download_dir.join(&object.sha256sum);
            if fs::try_exists(&destination).await?
                && self.verify(&destination, &object.sha256sum).await?
            {
                debug!(object = %object.filename, "Object already downloaded");
                continue;
            }

            let partial = tempfile::NamedTempFile::new_in(download_dir)?;
            let (progress_tx, progress_rx) = mpsc::channel(32);
            let logger = tokio::spawn(log_progress(object.filename.clone(), progress_rx));

            info!(object = %object.filename, size = object.size, "Downloading object");
            let downloaded = self
                .api
                .download_object(
                    &self.firmware.product_uid,
                    package.package_uid(),
                    &object.sha256sum,
                    partial.path(),
                    Some(progress_tx),
                )
                .await;
            let _ = logger.await;
            downloaded?;

            if !self.verify(partial.path(), &object.sha256sum).await? {
                return Err(AgentError::Checksum {
                    path: object.filename.clone(),
                    expected: object.sha256sum.clone(),
                });
            }
            partial
                .persist(&destination)
                .map_err(|err| AgentError::Io(err.error))?;
        }

        Ok(())
    }

    async fn install_update(&self) -> Result<(), AgentError> {
        let mut pending = self.pending.lock().await;
        let package = pending
            .package
            .clone()
            .ok_or(AgentError::NoPendingUpdate)?;

        if pending
            .install_job
            .as_ref()
            .is_some_and(|job| !job.is_finished())
        {
            return Err(AgentError::Install("an install is already running".into()));
        }

        info!(package = %package.package_uid(), version = %package.version(), "Installing update");
        let job = install_objects(
            package,
            self.config.download_dir.clone(),
            self.installer.clone(),
            self.checker.clone(),
        );
        pending.install_job = Some(tokio::spawn(job));
        Ok(())
    }

    async fn install_status(&self) -> Result<(), AgentError> {
        let job = self
            .pending
            .lock()
            .await
            .install_job
            .take()
            .ok_or(AgentError::NoPendingUpdate)?;

        // A crashed install job leaves the targets in an unknown state.
        job.await.map_err(|err| {
            AgentError::fatal(AgentError::Install(format!("install task aborted: {err}")))
        })?
    }

    async fn finalize_install(&self) -> Result<(), AgentError> {
        let package = self
            .pending
            .lock()
            .await
            .package
            .take()
            .ok_or(AgentError::NoPendingUpdate)?;

        let mut runtime = self.runtime.lock().await;
        runtime.update.applied_package_uid = Some(package.package_uid().to_string());
        // probe again after reboot to finish the update cycle
        runtime.polling.now = true;

        if self.config.read_only {
            debug!("Skipping install settings save, read-only mode enabled");
        } else {
            runtime.save().await?;
        }

        info!(package = %package.package_uid(), "Update installed successfully");
        Ok(())
    }

    async fn report(&self, state: StateKind, detail: Option<&str>) {
        let package_uid = self
            .pending
            .lock()
            .await
            .package
            .as_ref()
            .map(|package| package.package_uid().to_string());

        report_best_effort(
            self.reporter.as_ref(),
            state,
            package_uid.as_deref(),
            detail,
        )
        .await;
    }
}

impl Agent {
    /// Forget the package of an abandoned update attempt.
    pub(crate) async fn discard_pending(&self) {
        let mut pending = self.pending.lock().await;
        if let Some(package) = pending.package.take() {
            debug!(package = %package.package_uid(), "Discarding pending update");
        }
        pending.install_job = None;
    }

    async fn accept(&self, package: UpdatePackage, runtime: &RuntimeSettings) -> bool {
        if let Err(err) = package.compatible_with(&self.firmware) {
            warn!(error = %err, "Ignoring update package");
            return false;
        }

        if runtime.update.applied_package_uid.as_deref() == Some(package.package_uid()) {
            info!("Not applying the update package. Same package has already been installed.");
            return false;
        }

        if !package.is_newer_than(&self.firmware.version) {
            info!(
                current = %self.firmware.version,
                offered = %package.version(),
                "Update package is not newer than the running firmware"
            );
            return false;
        }

        info!(package = %package.package_uid(), version = %package.version(), "Update available");
        self.pending.lock().await.package = Some(package);
        true
    }

    async fn pending_package(&self) -> Result<UpdatePackage, AgentError> {
        self.pending
            .lock()
            .await
            .package
            .clone()
            .ok_or(AgentError::NoPendingUpdate)
    }

    async fn persist(&self, runtime: &RuntimeSettings) {
        if self.config.read_only {
            debug!("Skipping runtime settings save, read-only mode enabled");
            return;
        }
        if let Err(err) = runtime.save().await {
            warn!(error = %err, "Failed to save runtime settings");
        }
    }

    async fn verify(&self, path: &Path, expected: &str) -> Result<bool, AgentError> {
        verify_blocking(self.checker.clone(), path.to_path_buf(), expected.to_string()).await
    }
}

async fn verify_blocking(
    checker: Arc<dyn ChecksumVerifier>,
    path: PathBuf,
    expected: String,
) -> Result<bool, AgentError> {
    tokio::task::spawn_blocking(move || checker.verify(&path, &expected))
        .await
        .map_err(|err| AgentError::Install(format!("checksum task failed: {err}")))?
}

async fn install_objects(
    package: UpdatePackage,
    download_dir: PathBuf,
    installer: Arc<dyn Installer>,
    checker: Arc<dyn ChecksumVerifier>,
) -> Result<(), AgentError> {
    for object in package.objects() {
        let source = download_dir.join(&object.sha256sum);
        if !verify_blocking(checker.clone(), source.clone(), object.sha256sum.clone()).await? {
            return Err(AgentError::Checksum {
                path: source.display().to_string(),
                expected: object.sha256sum.clone(),
            });
        }
        installer.install(object, &source).await?;
    }
    Ok(())
}

/// Remove files left over from other packages.
async fn prune_download_dir(dir: &Path, package: &UpdatePackage) -> Result<(), AgentError> {
    let wanted: HashSet<&str> = package
        .objects()
        .iter()
        .map(|object| object.sha256sum.as_str())
        .collect();

    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let name = entry.file_name();
        if !wanted.contains(name.to_string_lossy().as_ref()) {
            debug!(path = %entry.path().display(), "Pruning leftover download");
            fs::remove_file(entry.path()).await?;
        }
    }
    Ok(())
}

async fn log_progress(object: String, mut progress_rx: mpsc::Receiver<DownloadProgress>) {
    let mut last_logged = None;
    while let Some(progress) = progress_rx.recv().await {
        let Some(percent) = progress.percent() else {
            continue;
        };
        let bucket = percent / 10;
        if last_logged != Some(bucket) {
            last_logged = Some(bucket);
            debug!(object = %object, percent, "Download progress");
        }
    }
}
