//! Firmware metadata of the running device.

mod hook;
mod metadata;

pub use hook::{run_hook, state_change_callback, CallbackDecision};
pub use metadata::{FirmwareMetadata, MetadataValue};
