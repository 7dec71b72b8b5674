use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::info;

use crate::checksum::ChecksumVerifier;
use crate::types::AgentError;
use crate::update_package::UpdateObject;

/// Copy `source` over the object's target path.
///
/// With install-if-different set, a target already matching the object's
/// digest is left untouched.
pub async fn install_copy(
    object: &UpdateObject,
    source: &Path,
    checker: Arc<dyn ChecksumVerifier>,
) -> Result<(), AgentError> {
    let target = PathBuf::from(&object.target_path);

    if object.install_if_different && target.exists() {
        let expected = object.sha256sum.clone();
        let probe = target.clone();
        let same = tokio::task::spawn_blocking(move || checker.verify(&probe, &expected))
            .await
            .map_err(|err| AgentError::Install(format!("checksum task failed: {err}")))??;
        if same {
            info!(target = %target.display(), "Target already up to date, skipping copy");
            return Ok(());
        }
    }

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::copy(source, &target).await?;
    Ok(())
}
