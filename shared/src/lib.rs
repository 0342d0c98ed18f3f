//! G-code Streaming Shared Types
//!
//! This crate provides the command type, line sanitizer, response codec and
//! error types shared by the streamer and the device simulator.

pub mod codec;
pub mod error;
pub mod response;
pub mod sanitize;

use std::fmt;

pub use error::SessionError;
pub use response::Response;
pub use sanitize::{sanitize, sanitize_line, Sanitized, SkipReason};

/// Protocol parameters for the streaming session
pub mod protocol {
    /// Maximum number of sanitized commands buffered ahead of the device
    pub const COMMAND_QUEUE_CAPACITY: usize = 50;

    /// Maximum number of device response lines buffered ahead of the dispatcher
    pub const ACK_STREAM_CAPACITY: usize = 5;

    /// Substring that marks a response line as an acknowledgement
    pub const ACK_TOKEN: &str = "ok";

    /// Start of a G-code comment
    pub const COMMENT_MARKER: char = ';';

    /// Line terminator appended to every command
    pub const LINE_TERMINATOR: char = '\n';

    /// Report current temperatures
    pub const STATUS_QUERY: &str = "M105\n";

    /// Ask the firmware to report temperatures every 2 seconds
    pub const TEMPERATURE_AUTO_REPORT: &str = "M155 S2\n";

    /// Commands written once per session before streaming starts
    pub const HANDSHAKE: [&str; 2] = [STATUS_QUERY, TEMPERATURE_AUTO_REPORT];

    /// Default serial baud rate for printer firmware
    pub const DEFAULT_BAUD_RATE: u32 = 115_200;

    /// Longest response line accepted from a device
    pub const MAX_RESPONSE_LINE: usize = 4096;
}

/// One sanitized, transmittable G-code line.
///
/// Always trimmed, comment-free and terminated by exactly one newline.
/// Only the sanitizer builds these.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Command(String);

impl Command {
    /// Sanitize a raw line into a command, `None` if it should be skipped
    pub fn parse(line: &str) -> Option<Self> {
        sanitize_line(line)
    }

    /// Build from text that is already trimmed, non-empty and comment-free
    pub(crate) fn from_code(code: &str) -> Self {
        let mut line = String::with_capacity(code.len() + 1);
        line.push_str(code);
        line.push(protocol::LINE_TERMINATOR);
        Self(line)
    }

    /// The command with its trailing newline, as written to the device
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wire bytes for this command
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// The command text without the line terminator
    pub fn code(&self) -> &str {
        &self.0[..self.0.len() - 1]
    }

    /// Wire length in bytes, terminator included
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false: a command carries at least one character and the terminator
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl AsRef<[u8]> for Command {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}
