//! Dispatch loop - writes one command at a time, gated on device acknowledgements
//!
//! The loop keeps a single state, awaiting work. Each iteration it either:
//! - receives the producer's completion signal and records it
//! - takes the next queued command, writes it and waits for an `ok`
//! - observes the end of the queue and finishes the session
//!
//! At most one command is unacknowledged at any time. There is no
//! correlation id between a command and its `ok`; pairing relies entirely on
//! this ordering, so pipelining would need sequence numbers first.

use crate::stream::producer::{Completion, ProducerSummary};
use gstream_shared::response::{is_acknowledgement, Response};
use gstream_shared::{Command, SessionError};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Counters for one dispatch run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Commands written without error
    pub commands_sent: u64,
    /// Commands whose write failed (still awaited)
    pub write_failures: u64,
    /// `ok` responses consumed
    pub acks_received: u64,
    /// Responses logged and dropped while waiting
    pub responses_discarded: u64,
    /// Producer outcome once the source was exhausted
    pub producer: ProducerSummary,
}

/// Drives the command queue against the device
pub struct Dispatcher<W> {
    device: String,
    writer: W,
    responses: mpsc::Receiver<String>,
    ack_timeout: Option<Duration>,
    cancel: CancellationToken,
    summary: DispatchSummary,
}

impl<W> Dispatcher<W>
where
    W: AsyncWrite + Unpin,
{
    /// Create a dispatcher owning the write side of the device link
    pub fn new(device: impl Into<String>, writer: W, responses: mpsc::Receiver<String>) -> Self {
        Self {
            device: device.into(),
            writer,
            responses,
            ack_timeout: None,
            cancel: CancellationToken::new(),
            summary: DispatchSummary::default(),
        }
    }

    /// Fail a command that is not acknowledged within `timeout`
    ///
    /// Without this a device that never answers stalls the session forever.
    pub fn with_ack_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Stop waiting as soon as `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn summary(&self) -> &DispatchSummary {
        &self.summary
    }

    /// Give back the write half
    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Write setup lines without queueing or waiting for acknowledgement
    ///
    /// Their responses arrive on the normal stream, so an early `ok` may be
    /// taken as the acknowledgement of the first queued command.
    pub async fn handshake(&mut self, lines: &[&str]) {
        for line in lines {
            debug!("[{}] >> {}", self.device, line.trim_end());
            if let Err(e) = self.write(line.as_bytes()).await {
                warn!("[{}] Handshake write failed: {}", self.device, e);
            }
        }
    }

    /// Run until the queue ends, returning the session counters
    pub async fn run(
        &mut self,
        mut commands: mpsc::Receiver<Command>,
        mut completion: Completion,
    ) -> Result<DispatchSummary, SessionError> {
        let mut producer: Option<ProducerSummary> = None;

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => return Err(SessionError::Cancelled),

                outcome = &mut completion, if producer.is_none() => {
                    let summary = completion_outcome(outcome)?;
                    info!(
                        "[{}] Finished processing file ({} commands queued)",
                        self.device, summary.commands_queued
                    );
                    producer = Some(summary);
                }

                next = commands.recv() => match next {
                    Some(command) => self.dispatch(command).await?,
                    None => break,
                },
            }
        }

        // The queue only ends after the producer dropped its sender, and the
        // producer signals completion right after that
        let producer = match producer {
            Some(summary) => summary,
            None => completion_outcome(completion.await)?,
        };

        self.summary.producer = producer;
        info!(
            "[{}] Stream complete: {} sent, {} acknowledged",
            self.device, self.summary.commands_sent, self.summary.acks_received
        );
        Ok(self.summary)
    }

    /// Write one command and wait for its acknowledgement
    async fn dispatch(&mut self, command: Command) -> Result<(), SessionError> {
        debug!("[{}] >> {}", self.device, command);

        match self.write(command.as_bytes()).await {
            Ok(()) => self.summary.commands_sent += 1,
            Err(e) => {
                // Best effort: the command may be partially or fully lost
                warn!("[{}] Failed to write {:?}: {}", self.device, command.code(), e);
                self.summary.write_failures += 1;
            }
        }

        self.wait_for_ok(&command).await
    }

    /// Consume responses until one contains `ok`
    async fn wait_for_ok(&mut self, command: &Command) -> Result<(), SessionError> {
        let deadline = self.ack_timeout.map(|timeout| Instant::now() + timeout);

        loop {
            let response = tokio::select! {
                biased;

                _ = self.cancel.cancelled() => return Err(SessionError::Cancelled),

                response = self.responses.recv() => response,

                _ = expire(deadline) => {
                    return Err(SessionError::AckTimeout {
                        command: command.code().to_string(),
                        timeout: self.ack_timeout.unwrap_or_default(),
                    });
                }
            };

            let Some(line) = response else {
                return Err(SessionError::AckStreamClosed {
                    command: command.code().to_string(),
                });
            };

            if is_acknowledgement(&line) {
                debug!("[{}] << {}", self.device, line);
                self.summary.acks_received += 1;
                return Ok(());
            }

            self.summary.responses_discarded += 1;
            match Response::classify(&line) {
                Response::Error => warn!("[{}] << {}", self.device, line),
                Response::Temperature => info!("[{}] << {}", self.device, line),
                _ => debug!("[{}] << {}", self.device, line),
            }
        }
    }

    async fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes).await?;
        self.writer.flush().await
    }
}

fn completion_outcome(
    outcome: Result<Result<ProducerSummary, SessionError>, tokio::sync::oneshot::error::RecvError>,
) -> Result<ProducerSummary, SessionError> {
    match outcome {
        Ok(result) => result,
        Err(_) => Err(SessionError::SourceRead(io::Error::other(
            "command producer stopped without signalling completion",
        ))),
    }
}

/// Resolve at `deadline`, or never when there is none
async fn expire(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
