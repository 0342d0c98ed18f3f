//! Command producer - reads a G-code source into the bounded command queue

use gstream_shared::{sanitize, Command, Sanitized, SessionError};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// What the producer did with its source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerSummary {
    /// Lines read from the source
    pub lines_read: u64,
    /// Commands handed to the queue
    pub commands_queued: u64,
    /// Blank and comment lines dropped
    pub lines_skipped: u64,
}

/// One-shot completion signal carrying the producer's outcome
pub type Completion = oneshot::Receiver<Result<ProducerSummary, SessionError>>;

/// Handles returned by [`spawn_producer`]
pub struct ProducerHandle {
    /// Sanitized commands in source order; closes once the source is exhausted
    pub commands: mpsc::Receiver<Command>,
    /// Fires exactly once, after the queue sender has been dropped
    pub completion: Completion,
    pub task: JoinHandle<()>,
}

/// Spawn a task that streams `source` into a queue of at most `capacity` commands
pub fn spawn_producer<R>(source: R, capacity: usize) -> ProducerHandle
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (queue_tx, commands) = mpsc::channel(capacity);
    let (done_tx, completion) = oneshot::channel();

    let task = tokio::spawn(async move {
        // The queue sender is dropped inside produce, so the queue closes
        // before the completion signal is delivered
        let result = produce(source, queue_tx).await;
        if let Err(ref e) = result {
            error!("[PRODUCER] {}", e);
        }
        let _ = done_tx.send(result);
    });

    ProducerHandle {
        commands,
        completion,
        task,
    }
}

/// Read `source` line by line, queueing every sanitized command
///
/// Lines are decoded lossily, so stray non-UTF-8 bytes (Latin-1 slicer
/// comments, for instance) never abort the stream. Awaits while the queue is
/// full. Returns early without error if the consumer has gone away.
pub async fn produce<R>(
    source: R,
    queue: mpsc::Sender<Command>,
) -> Result<ProducerSummary, SessionError>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(source);
    let mut raw = Vec::new();
    let mut summary = ProducerSummary::default();

    loop {
        raw.clear();
        let n = reader
            .read_until(b'\n', &mut raw)
            .await
            .map_err(SessionError::SourceRead)?;
        if n == 0 {
            break;
        }
        summary.lines_read += 1;

        let line = String::from_utf8_lossy(strip_terminator(&raw));
        match sanitize(&line) {
            Sanitized::Command(command) => {
                if queue.send(command).await.is_err() {
                    debug!("[PRODUCER] Command queue closed, stopping early");
                    return Ok(summary);
                }
                summary.commands_queued += 1;
            }
            Sanitized::Skip(_) => summary.lines_skipped += 1,
        }
    }

    debug!(
        "[PRODUCER] Source exhausted: {} lines, {} commands",
        summary.lines_read, summary.commands_queued
    );
    Ok(summary)
}

fn strip_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
