//! One streaming session: a command source, a device link and the three
//! tasks that move commands between them

use crate::config::StreamerConfig;
use crate::stream::{spawn_producer, spawn_reader, DispatchSummary, Dispatcher};
use crate::transport::{TransportConnector, TransportStream};
use gstream_shared::{protocol, SessionError};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Per-session settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub queue_capacity: usize,
    pub ack_capacity: usize,
    pub ack_timeout: Option<Duration>,
    pub handshake: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: protocol::COMMAND_QUEUE_CAPACITY,
            ack_capacity: protocol::ACK_STREAM_CAPACITY,
            ack_timeout: None,
            handshake: true,
        }
    }
}

impl From<&StreamerConfig> for SessionConfig {
    fn from(config: &StreamerConfig) -> Self {
        Self {
            queue_capacity: config.queue_capacity,
            ack_capacity: config.ack_capacity,
            ack_timeout: config.ack_timeout,
            handshake: config.handshake,
        }
    }
}

/// Outcome of a completed session
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub device: String,
    pub dispatch: DispatchSummary,
    pub elapsed: Duration,
}

/// A device plus the settings to stream to it
pub struct DeviceSession<C> {
    connector: C,
    config: SessionConfig,
    cancel: CancellationToken,
}

impl<C> DeviceSession<C>
where
    C: TransportConnector,
{
    pub fn new(connector: C, config: SessionConfig, cancel: CancellationToken) -> Self {
        Self {
            connector,
            config,
            cancel,
        }
    }

    pub fn device(&self) -> &str {
        self.connector.name()
    }

    /// Open the device, then the G-code file, and stream the file to it
    pub async fn run_file(&self, path: &Path) -> Result<SessionReport, SessionError> {
        let device = self.device().to_string();
        info!("[{}] Starting session", device);

        let transport = self
            .connector
            .connect()
            .await
            .map_err(|e| SessionError::Connect {
                device: device.clone(),
                reason: e.to_string(),
            })?;

        let source = tokio::fs::File::open(path)
            .await
            .map_err(|source| SessionError::SourceOpen {
                path: path.display().to_string(),
                source,
            })?;

        stream_session(&device, transport, source, &self.config, self.cancel.clone()).await
    }
}

/// Stream `source` over an already open `transport`
///
/// Splits the transport between the reader task (read half) and the dispatch
/// loop (write half), writes the handshake, then runs the dispatch loop to
/// completion. The transport is reassembled and shut down afterwards.
pub async fn stream_session<T, S>(
    device: &str,
    transport: T,
    source: S,
    config: &SessionConfig,
    cancel: CancellationToken,
) -> Result<SessionReport, SessionError>
where
    T: TransportStream,
    S: AsyncRead + Unpin + Send + 'static,
{
    let started = Instant::now();
    let (read_half, write_half) = tokio::io::split(transport);

    let reader = spawn_reader(device, read_half, config.ack_capacity);
    let mut dispatcher = Dispatcher::new(device, write_half, reader.responses)
        .with_ack_timeout(config.ack_timeout)
        .with_cancellation(cancel);

    if config.handshake {
        dispatcher.handshake(&protocol::HANDSHAKE).await;
    }

    let producer = spawn_producer(source, config.queue_capacity);
    let result = dispatcher.run(producer.commands, producer.completion).await;
    producer.task.abort();
    if result.is_err() {
        let progress = dispatcher.summary();
        warn!(
            "[{}] Stopped after {} commands ({} acknowledged)",
            device, progress.commands_sent, progress.acks_received
        );
    }

    reader.cancel.cancel();
    let reader_result = match reader.task.await {
        Ok(exit) => {
            let mut transport = exit.reader.unsplit(dispatcher.into_writer());
            if let Err(e) = transport.shutdown().await {
                debug!("[{}] Transport shutdown: {}", device, e);
            }
            exit.result
        }
        Err(e) => {
            warn!("[{}] Reader task failed: {}", device, e);
            Ok(())
        }
    };

    let dispatch = match (result, reader_result) {
        // The reader knows why the response stream went away
        (Err(SessionError::AckStreamClosed { .. }), Err(reader_err)) => return Err(reader_err),
        (result, _) => result?,
    };

    let report = SessionReport {
        device: device.to_string(),
        dispatch,
        elapsed: started.elapsed(),
    };
    info!(
        "[{}] Session finished in {:.1}s: {} commands, {} responses discarded",
        device,
        report.elapsed.as_secs_f64(),
        report.dispatch.commands_sent,
        report.dispatch.responses_discarded
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

    /// Emulated printer: records every line and answers `ok`
    async fn fake_printer(stream: DuplexStream, replies: usize) -> Vec<String> {
        let (read, mut write) = tokio::io::split(stream);
        let mut lines = BufReader::new(read).lines();
        let mut received = Vec::new();

        while received.len() < replies {
            let Some(line) = lines.next_line().await.unwrap() else {
                break;
            };
            received.push(line);
            write.write_all(b"ok\n").await.unwrap();
        }
        received
    }

    fn no_handshake() -> SessionConfig {
        SessionConfig {
            handshake: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_session_config_from_streamer_config() {
        let streamer = StreamerConfig {
            queue_capacity: 10,
            ack_timeout: Some(Duration::from_secs(3)),
            ..Default::default()
        };
        let config = SessionConfig::from(&streamer);
        assert_eq!(config.queue_capacity, 10);
        assert_eq!(config.ack_capacity, 5);
        assert_eq!(config.ack_timeout, Some(Duration::from_secs(3)));
        assert!(config.handshake);
    }

    #[tokio::test]
    async fn test_streams_file_order_to_device() {
        let (host, device) = tokio::io::duplex(256);
        let printer = tokio::spawn(fake_printer(device, 3));

        let source: &[u8] = b"G28\n; home first\nG1 X10 Y10 ; move\n\nM84\n";
        let report = stream_session("fake", host, source, &no_handshake(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(printer.await.unwrap(), vec!["G28", "G1 X10 Y10", "M84"]);
        assert_eq!(report.dispatch.commands_sent, 3);
        assert_eq!(report.dispatch.acks_received, 3);
        assert_eq!(report.dispatch.producer.lines_read, 5);
        assert_eq!(report.device, "fake");
    }

    #[tokio::test]
    async fn test_handshake_precedes_commands() {
        let (host, device) = tokio::io::duplex(256);
        let printer = tokio::spawn(fake_printer(device, 3));

        let source: &[u8] = b"G28\n";
        let config = SessionConfig::default();
        stream_session("fake", host, source, &config, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(printer.await.unwrap(), vec!["M105", "M155 S2", "G28"]);
    }

    #[tokio::test]
    async fn test_device_disconnect_surfaces_reader_error() {
        let (host, device) = tokio::io::duplex(256);
        let printer = tokio::spawn(async move {
            let mut lines = BufReader::new(device).lines();
            // Take one command, then vanish without answering
            lines.next_line().await.unwrap()
        });

        let source: &[u8] = b"G28\nM84\n";
        let result =
            stream_session("fake", host, source, &no_handshake(), CancellationToken::new()).await;

        assert_eq!(printer.await.unwrap().as_deref(), Some("G28"));
        assert!(matches!(result, Err(SessionError::TransportClosed)));
    }

    #[tokio::test]
    async fn test_run_file_missing_source() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let _conn = listener.accept().await;
            tokio::time::sleep(Duration::from_secs(1)).await;
        });

        let session = DeviceSession::new(
            crate::transport::TcpConnector::new(addr),
            no_handshake(),
            CancellationToken::new(),
        );
        let result = session.run_file(Path::new("/nonexistent/hook.gcode")).await;
        assert!(matches!(result, Err(SessionError::SourceOpen { .. })));
    }

    #[tokio::test]
    async fn test_run_file_over_tcp() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "; generated").unwrap();
        writeln!(file, "G21").unwrap();
        writeln!(file, "G90 ; absolute").unwrap();
        file.flush().unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let printer = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read, mut write) = socket.into_split();
            let mut lines = BufReader::new(read).lines();
            let mut received = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                received.push(line);
                write.write_all(b"ok\n").await.unwrap();
            }
            received
        });

        let session = DeviceSession::new(
            crate::transport::TcpConnector::new(addr),
            no_handshake(),
            CancellationToken::new(),
        );
        let report = session.run_file(file.path()).await.unwrap();
        assert_eq!(report.dispatch.commands_sent, 2);

        // Session shutdown closes the socket, ending the printer loop
        assert_eq!(printer.await.unwrap(), vec!["G21", "G90"]);
    }
}
