mod config;
mod session;
mod stream;
mod transport;

use config::StreamerConfig;
use session::{SessionConfig, SessionManager, SessionOutcome};
use tokio_util::sync::CancellationToken;
use transport::{DiscoveryConfig, SerialDiscovery, TcpConnector};

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = StreamerConfig::from_env();
    info!("G-code streamer starting");
    info!("  Source: {}", config.source_path.display());

    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping sessions");
            cancel_on_signal.cancel();
        }
    });

    let manager = SessionManager::new(
        config.source_path.clone(),
        SessionConfig::from(&config),
        cancel,
    );

    let outcomes = match &config.tcp_address {
        Some(address) => {
            info!("  Device: tcp://{}", address);
            manager.run_all(vec![TcpConnector::new(address.clone())]).await
        }
        None => {
            let discovery = SerialDiscovery::new(DiscoveryConfig {
                ports: config.ports.clone(),
                baud_rate: config.baud_rate,
            });

            let devices = match discovery.discover() {
                Ok(devices) => devices,
                Err(e) => {
                    error!("{}", e);
                    Vec::new()
                }
            };

            for device in &devices {
                info!(
                    "  Device: {} ({}, {} baud)",
                    device.port_name,
                    device.description,
                    device.connector.baud_rate()
                );
            }

            let connectors: Vec<_> = devices.into_iter().map(|d| d.connector).collect();
            manager.run_all(connectors).await
        }
    };

    for outcome in &outcomes {
        match &outcome.result {
            Ok(report) => info!(
                "[{}] Streamed {} commands in {:.1}s",
                report.device,
                report.dispatch.commands_sent,
                report.elapsed.as_secs_f64()
            ),
            Err(e) => warn!("[{}] Not completed: {}", outcome.device, e),
        }
    }

    if outcomes.iter().any(SessionOutcome::is_fatal) {
        std::process::exit(1);
    }
}
