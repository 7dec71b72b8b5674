//! Install backends for update objects.

mod archive;
mod copy;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::checksum::ChecksumVerifier;
use crate::types::AgentError;
use crate::update_package::{InstallMode, UpdateObject};

pub use archive::{extract_tarball, extract_zip};
pub use copy::install_copy;

#[async_trait]
pub trait Installer: Send + Sync {
    /// Install one downloaded object found at `source`.
    async fn install(&self, object: &UpdateObject, source: &Path) -> Result<(), AgentError>;
}

/// Dispatches each object to the backend named by its install mode.
pub struct ModeInstaller {
    checker: Arc<dyn ChecksumVerifier>,
}

impl ModeInstaller {
    pub fn new(checker: Arc<dyn ChecksumVerifier>) -> Self {
        Self { checker }
    }
}

#[async_trait]
impl Installer for ModeInstaller {
    async fn install(&self, object: &UpdateObject, source: &Path) -> Result<(), AgentError> {
        info!(
            object = %object.filename,
            mode = ?object.mode,
            target = %object.target_path,
            "Installing object"
        );

        match object.mode {
            InstallMode::Copy => install_copy(object, source, self.checker.clone()).await,
            InstallMode::Tarball => extract_tarball(source, Path::new(&object.target_path)).await,
            InstallMode::Zip => extract_zip(source, Path::new(&object.target_path)).await,
        }
    }
}
