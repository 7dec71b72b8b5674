use thiserror::Error;

/// Errors raised by the agent and its collaborators.
///
/// Whether an error stops the process is decided by [`AgentError::is_fatal`];
/// intermediate states only ever see success/failure pairs.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Firmware metadata error: {0}")]
    Metadata(String),

    #[error("Update server error: {0}")]
    Server(String),

    #[error("Incompatible update package: {0}")]
    Incompatible(String),

    #[error("Checksum mismatch for {path}: expected {expected}")]
    Checksum { path: String, expected: String },

    #[error("Install failed: {0}")]
    Install(String),

    #[error("No update package pending")]
    NoPendingUpdate,

    #[error("generic error")]
    Generic,

    #[error("Fatal: {0}")]
    Fatal(#[source] Box<AgentError>),
}

impl AgentError {
    /// Wrap any error so that the error state terminates the daemon.
    pub fn fatal(err: AgentError) -> Self {
        match err {
            AgentError::Fatal(_) => err,
            other => AgentError::Fatal(Box::new(other)),
        }
    }

    /// Fatal errors stop the process; everything else sends the agent back
    /// to polling.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AgentError::Fatal(_) | AgentError::Config(_) | AgentError::Metadata(_)
        )
    }
}
