use std::sync::Arc;

use chat_server::Server;
use chat_server::cli::Cli;
use clap::Parser;
use tokio::net::UdpSocket;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let storage = Arc::new(chat_storage::Storage::open(&cli.db).expect("failed to open storage"));
    storage
        .integrity_check()
        .expect("database integrity check failed");

    let bind_addr = cli.bind_addr();
    let socket = UdpSocket::bind(&bind_addr)
        .await
        .expect("failed to bind UDP socket");
    tracing::info!(addr = %bind_addr, "chat server listening");

    let mut endpoint = chat_endpoint::Endpoint::new(socket);
    if cli.simulate_loss {
        tracing::info!(rate = cli.loss_rate, "packet-loss simulation enabled");
        endpoint = endpoint.with_packet_loss_simulation(cli.loss_rate, cli.loss_seed);
    }

    let server = Arc::new(Server::new(Arc::new(endpoint), storage));

    tokio::select! {
        result = server.clone().run() => {
            if let Err(err) = result {
                tracing::error!(%err, "receive loop exited with error");
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutting down");
        }
    }
}

fn init_tracing(log_level: Option<&str>) {
    let level = log_level
        .map(str::to_owned)
        .or_else(|| std::env::var("RUST_LOG").ok())
        .or_else(|| std::env::var("LOG_LEVEL").ok())
        .unwrap_or_else(|| "info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .init();
}

/// Waits for SIGTERM or Ctrl-C (SIGINT) and returns to trigger graceful shutdown.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { tracing::info!("received Ctrl+C, shutting down"); },
        _ = terminate => { tracing::info!("received SIGTERM, shutting down"); },
    }
}
