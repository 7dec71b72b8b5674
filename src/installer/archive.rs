//! Archive based install modes.

use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tar::Archive;
use zip::ZipArchive;

use crate::types::AgentError;

/// Unpack a gzip compressed tarball into `target_dir`.
pub async fn extract_tarball(source: &Path, target_dir: &Path) -> Result<(), AgentError> {
    let source = source.to_path_buf();
    let target_dir = target_dir.to_path_buf();
    run_blocking(move || {
        fs::create_dir_all(&target_dir)?;
        let mut archive = Archive::new(GzDecoder::new(File::open(&source)?));
        archive.unpack(&target_dir)?;
        Ok(())
    })
    .await
}

pub async fn extract_zip(source: &Path, target_dir: &Path) -> Result<(), AgentError> {
    let source = source.to_path_buf();
    let target_dir: PathBuf = target_dir.to_path_buf();
    run_blocking(move || {
        fs::create_dir_all(&target_dir)?;
        let mut archive = ZipArchive::new(File::open(&source)?)
            .map_err(|err| AgentError::Install(format!("invalid zip archive: {err}")))?;
        archive
            .extract(&target_dir)
            .map_err(|err| AgentError::Install(format!("zip extraction failed: {err}")))
    })
    .await
}

async fn run_blocking<F>(job: F) -> Result<(), AgentError>
where
    F: FnOnce() -> Result<(), AgentError> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|err| AgentError::Install(format!("extraction task failed: {err}")))?
}
