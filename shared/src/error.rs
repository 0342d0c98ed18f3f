//! Streaming session errors
//!
//! Every failure a session can hit is returned as one of these values; the
//! owner of the session decides whether to carry on with other devices or
//! stop the process.

use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::codec::CodecError;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to open command source {path}: {source}")]
    SourceOpen {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read command source: {0}")]
    SourceRead(#[source] io::Error),

    #[error("Failed to connect to {device}: {reason}")]
    Connect { device: String, reason: String },

    #[error("Device read error: {0}")]
    TransportRead(#[source] io::Error),

    #[error("Device closed the connection")]
    TransportClosed,

    #[error("Response stream closed while waiting for acknowledgement of {command:?}")]
    AckStreamClosed { command: String },

    #[error("No acknowledgement for {command:?} within {timeout:?}")]
    AckTimeout { command: String, timeout: Duration },

    #[error("Session cancelled")]
    Cancelled,

    #[error("Response decode error: {0}")]
    Codec(#[from] CodecError),
}

impl SessionError {
    /// True for failures of the device link rather than the command source
    pub fn is_device_failure(&self) -> bool {
        matches!(
            self,
            SessionError::Connect { .. }
                | SessionError::TransportRead(_)
                | SessionError::TransportClosed
                | SessionError::AckStreamClosed { .. }
                | SessionError::AckTimeout { .. }
                | SessionError::Codec(_)
        )
    }
}
