mod config;
mod connection;
mod printer;

use config::SimConfig;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = SimConfig::from_env();
    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!("Device simulator listening on {}", config.listen_addr);
    if !config.ack_delay.is_zero() {
        info!("  Ack delay: {:?}", config.ack_delay);
    }

    loop {
        let (socket, addr) = listener.accept().await?;
        info!("Connection from: {}", addr);
        socket.set_nodelay(true)?;

        let config = config.clone();
        tokio::spawn(async move {
            if let Err(e) = connection::serve(socket, addr, config).await {
                error!("[{}] Session ended with error: {}", addr, e);
            }
        });
    }
}
