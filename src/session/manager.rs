//! Runs one independent session per device

use super::device::{DeviceSession, SessionConfig, SessionReport};
use crate::transport::TransportConnector;
use futures::future::join_all;
use gstream_shared::SessionError;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Result of one device's session
#[derive(Debug)]
pub struct SessionOutcome {
    pub device: String,
    pub result: Result<SessionReport, SessionError>,
}

impl SessionOutcome {
    /// Whether this outcome should stop the process
    ///
    /// Failing to open the source or the device only ends that device's
    /// session. Read failures on either side are fatal.
    pub fn is_fatal(&self) -> bool {
        match &self.result {
            Ok(_) => false,
            Err(SessionError::SourceOpen { .. }) | Err(SessionError::Connect { .. }) => false,
            Err(_) => true,
        }
    }
}

/// Streams one source file to every device
pub struct SessionManager {
    source: PathBuf,
    config: SessionConfig,
    cancel: CancellationToken,
}

impl SessionManager {
    pub fn new(source: impl Into<PathBuf>, config: SessionConfig, cancel: CancellationToken) -> Self {
        Self {
            source: source.into(),
            config,
            cancel,
        }
    }

    /// Run a session per connector concurrently and collect every outcome
    ///
    /// The first fatal outcome cancels every other session still running.
    pub async fn run_all<C>(&self, connectors: Vec<C>) -> Vec<SessionOutcome>
    where
        C: TransportConnector,
    {
        if connectors.is_empty() {
            info!("No devices to stream to");
            return Vec::new();
        }

        let sessions: Vec<DeviceSession<C>> = connectors
            .into_iter()
            .map(|c| DeviceSession::new(c, self.config.clone(), self.cancel.child_token()))
            .collect();

        let runs = sessions.iter().map(|session| async move {
            let device = session.device().to_string();
            let result = session.run_file(&self.source).await;
            match result {
                Err(SessionError::Cancelled) => info!("[{}] Session cancelled", device),
                Err(ref e) if e.is_device_failure() => error!("[{}] Device failed: {}", device, e),
                Err(ref e) => error!("[{}] Session failed: {}", device, e),
                Ok(_) => {}
            }

            let outcome = SessionOutcome { device, result };
            if outcome.is_fatal() && !self.cancel.is_cancelled() {
                warn!("[{}] Fatal error, stopping remaining sessions", outcome.device);
                self.cancel.cancel();
            }
            outcome
        });

        join_all(runs).await
    }
}
