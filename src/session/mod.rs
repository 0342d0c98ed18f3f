//! Device session management
//!
//! This module handles:
//! - Opening a device link and a command source per device
//! - Running the producer, reader and dispatch loop for each session
//! - Running independent sessions for every discovered device

mod device;
mod manager;

pub use device::SessionConfig;
pub use manager::{SessionManager, SessionOutcome};
