//! Flow-controlled command streaming
//!
//! This module handles:
//! - Reading and sanitizing the command source into a bounded queue
//! - Republishing device responses on a bounded stream
//! - Writing one command at a time, each gated on an `ok` from the device

mod dispatcher;
mod producer;
mod reader;

pub use dispatcher::{DispatchSummary, Dispatcher};
pub use producer::spawn_producer;
pub use reader::spawn_reader;
