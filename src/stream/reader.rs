//! Acknowledgement reader - republishes device response lines
//!
//! The reader runs for the whole session. It stops when:
//! - the session cancels it (normal shutdown, the read half is handed back)
//! - the device link fails or closes (the error is handed back)
//! - the consumer drops the response stream

use bytes::BytesMut;
use gstream_shared::codec::LineDecoder;
use gstream_shared::SessionError;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

const READ_CHUNK: usize = 1024;

/// How the reader task ended, with the read half it owned
pub struct ReaderExit<R> {
    pub reader: R,
    pub result: Result<(), SessionError>,
}

/// Handles returned by [`spawn_reader`]
pub struct ReaderHandle<R> {
    /// Response lines in arrival order, terminators stripped
    pub responses: mpsc::Receiver<String>,
    pub task: JoinHandle<ReaderExit<R>>,
    /// Cancel to stop the reader and get the read half back
    pub cancel: CancellationToken,
}

/// Spawn a reader task publishing into a stream of at most `capacity` lines
pub fn spawn_reader<R>(device: impl Into<String>, reader: R, capacity: usize) -> ReaderHandle<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, responses) = mpsc::channel(capacity);
    let cancel = CancellationToken::new();
    let device = device.into();
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        let mut reader = reader;
        let result = read_loop(&device, &mut reader, &tx, &token).await;
        if let Err(ref e) = result {
            error!("[{}] {}", device, e);
        }
        ReaderExit { reader, result }
    });

    ReaderHandle {
        responses,
        task,
        cancel,
    }
}

/// Main reader loop - reads chunks and publishes complete lines
async fn read_loop<R>(
    device: &str,
    reader: &mut R,
    tx: &mpsc::Sender<String>,
    cancel: &CancellationToken,
) -> Result<(), SessionError>
where
    R: AsyncRead + Unpin,
{
    let mut decoder = LineDecoder::new();
    let mut read_buf = BytesMut::with_capacity(READ_CHUNK);

    loop {
        read_buf.clear();

        let n = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("[{}] Reader cancelled", device);
                return Ok(());
            }
            read = reader.read_buf(&mut read_buf) => read.map_err(SessionError::TransportRead)?,
        };

        if n == 0 {
            return Err(SessionError::TransportClosed);
        }

        decoder.extend(&read_buf);

        while let Some(line) = decoder.decode_next()? {
            if line.trim().is_empty() {
                continue;
            }
            trace!("[{}] << {}", device, line);

            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                sent = tx.send(line) => {
                    if sent.is_err() {
                        debug!("[{}] Response stream dropped, reader exiting", device);
                        return Ok(());
                    }
                }
            }
        }
    }
}
