//! Hook scripts shipped in the firmware metadata directory.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tokio::fs;
use tokio::process::Command;
use tracing::error;

use crate::types::AgentError;

const STATE_CHANGE_CALLBACK: &str = "state-change-callback";

/// What the state-change callback decided for the state about to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackDecision {
    Continue,
    Cancel,
}

/// Read a metadata entry: executables are run and their stdout used,
/// plain files are read as-is. A missing entry yields an empty string.
pub async fn run_hook(path: &Path) -> Result<String, AgentError> {
    let metadata = match fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(String::new()),
        Err(err) => return Err(err.into()),
    };

    if metadata.permissions().mode() & 0o111 == 0 {
        let contents = fs::read_to_string(path).await?;
        return Ok(contents.trim().to_string());
    }

    execute(path, None).await
}

/// Run `<metadata_dir>/state-change-callback <state>` when it exists.
///
/// The callback prints `cancel` to abort the transition or nothing to let it
/// proceed; anything else is an error.
pub async fn state_change_callback(
    metadata_dir: &Path,
    state: &str,
) -> Result<CallbackDecision, AgentError> {
    let callback = metadata_dir.join(STATE_CHANGE_CALLBACK);
    if !fs::try_exists(&callback).await? {
        return Ok(CallbackDecision::Continue);
    }

    match execute(&callback, Some(state)).await?.as_str() {
        "cancel" => Ok(CallbackDecision::Cancel),
        "" => Ok(CallbackDecision::Continue),
        other => Err(AgentError::Metadata(format!(
            "Invalid output {other:?} from state-change-callback for state `{state}`"
        ))),
    }
}

async fn execute(path: &Path, arg: Option<&str>) -> Result<String, AgentError> {
    let mut command = Command::new(path);
    command.args(arg);
    let output = command.output().await?;
    let stderr = String::from_utf8_lossy(&output.stderr);
    for line in stderr.lines().filter(|line| !line.trim().is_empty()) {
        error!(hook = %path.display(), "{line}");
    }

    if !output.status.success() {
        return Err(AgentError::Metadata(format!(
            "Hook `{}` failed with status {}",
            path.display(),
            output.status
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
