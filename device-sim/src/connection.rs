//! One emulated printer per TCP connection

use crate::config::SimConfig;
use crate::printer::Printer;
use anyhow::Result;
use gstream_shared::codec::LineDecoder;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Outgoing lines are queued here and written by a single task
const OUTBOX_CAPACITY: usize = 64;

/// Serve one connection until the peer disconnects
pub async fn serve<S>(socket: S, addr: SocketAddr, config: SimConfig) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut reader, mut writer) = tokio::io::split(socket);
    let (outbox, mut outgoing) = mpsc::channel::<String>(OUTBOX_CAPACITY);

    let writer_task = tokio::spawn(async move {
        while let Some(mut line) = outgoing.recv().await {
            line.push('\n');
            if let Err(e) = writer.write_all(line.as_bytes()).await {
                debug!("[{}] Write failed: {}", addr, e);
                break;
            }
        }
    });

    let mut printer = Printer::new();
    let mut decoder = LineDecoder::new();
    let mut buf = vec![0u8; 4096];
    let mut reports: Option<Interval> = None;
    let mut period: Option<Duration> = None;

    let result: Result<()> = loop {
        tokio::select! {
            read = reader.read(&mut buf) => {
                let n = match read {
                    Ok(0) => {
                        info!("[{}] Client disconnected after {} commands", addr, printer.lines_handled());
                        break Ok(());
                    }
                    Ok(n) => n,
                    Err(e) => {
                        warn!("[{}] Read error: {}", addr, e);
                        break Err(e.into());
                    }
                };
                decoder.extend(&buf[..n]);

                let mut closed = false;
                while let Some(line) = decoder.decode_next()? {
                    let replies = printer.handle_line(&line);
                    if replies.is_empty() {
                        continue;
                    }
                    debug!("[{}] <- {}", addr, line.trim());
                    if !config.ack_delay.is_zero() {
                        tokio::time::sleep(config.ack_delay).await;
                    }
                    for reply in replies {
                        if outbox.send(reply).await.is_err() {
                            closed = true;
                        }
                    }
                }
                if closed {
                    break Ok(());
                }

                if printer.auto_report() != period {
                    period = printer.auto_report();
                    reports = period.map(report_interval);
                    debug!("[{}] Auto-report period: {:?}", addr, period);
                }
            }
            _ = next_report(&mut reports) => {
                printer.tick();
                if outbox.send(printer.temperature_report()).await.is_err() {
                    break Ok(());
                }
            }
        }
    };

    drop(outbox);
    let _ = writer_task.await;
    result
}

fn report_interval(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

async fn next_report(reports: &mut Option<Interval>) {
    match reports {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};

    fn addr() -> SocketAddr {
        "127.0.0.1:9".parse().unwrap()
    }

    #[tokio::test]
    async fn test_acks_each_command() {
        let (client, device) = tokio::io::duplex(256);
        let server = tokio::spawn(serve(device, addr(), SimConfig::default()));

        let (read, mut write) = tokio::io::split(client);
        let mut lines = BufReader::new(read).lines();

        write.write_all(b"G28\n\n; comment\nM105\n").await.unwrap();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("ok"));
        assert_eq!(
            lines.next_line().await.unwrap().as_deref(),
            Some("ok T:21.0 /0.0 B:21.0 /0.0")
        );

        drop(write);
        drop(lines);
        server.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_report_after_m155() {
        let (client, device) = tokio::io::duplex(256);
        tokio::spawn(serve(device, addr(), SimConfig::default()));

        let (read, mut write) = tokio::io::split(client);
        let mut lines = BufReader::new(read).lines();

        write.write_all(b"M155 S2\n").await.unwrap();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("ok"));

        let report = lines.next_line().await.unwrap().unwrap();
        assert!(report.starts_with("T:"), "unexpected report {report:?}");
        assert!(!report.contains("ok"));
    }
}
