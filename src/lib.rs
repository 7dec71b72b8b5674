//! Firmware-over-the-air update agent.
//!
//! The [`daemon::Daemon`] drives the update lifecycle in [`states`] against an
//! [`agent::Agent`], which reaches the outside world through the
//! [`controller::Controller`] seam.

pub mod agent;
pub mod checksum;
pub mod client;
pub mod config;
pub mod controller;
pub mod daemon;
pub mod firmware;
pub mod installer;
pub mod reporter;
pub mod server;
pub mod states;
pub mod types;
pub mod update_package;

pub use agent::{Agent, AgentHandle};
pub use controller::Controller;
pub use daemon::Daemon;
pub use types::AgentError;
