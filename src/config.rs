//! Static agent configuration and persisted runtime settings.

mod loader;
mod paths;
mod runtime;
mod types;

pub use runtime::{PollingSettings, RuntimeSettings, UpdateSettings};
pub use types::Config;
