use std::sync::Arc;

use chat_client::{ChatClient, InboundMessage};
use chat_client::cli::Cli;
use clap::Parser;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let remote = cli
        .remote_addr()
        .parse()
        .expect("host:port did not parse as a socket address");
    let (client, connection_lost) = ChatClient::bind(remote).await.expect("failed to bind UDP socket");
    let client = Arc::new(client);
    tracing::info!(local = ?client.local_addr(), %remote, "chat client starting");

    let (tx, rx) = mpsc::unbounded_channel::<InboundMessage>();
    tokio::spawn(client.clone().listen(tx));
    tokio::spawn(print_inbound(rx));

    match client.connect(cli.username.as_deref()).await {
        Ok(ack) if ack.is_success() => tracing::info!("server_connected"),
        Ok(ack) => tracing::warn!(status = ack.status, error = ?ack.error, "SYN rejected"),
        Err(err) => {
            tracing::error!(%err, "failed to connect to server");
            return;
        }
    }

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    tokio::select! {
        result = read_and_send_lines(&mut lines, &client, &cli.group, cli.username.as_deref()) => {
            if let Err(err) = result {
                tracing::error!(%err, "stdin read loop exited");
            }
        }
        () = connection_lost.wait() => {
            tracing::warn!("connection to server lost");
        }
    }
}

async fn print_inbound(mut rx: mpsc::UnboundedReceiver<InboundMessage>) {
    while let Some(message) = rx.recv().await {
        println!("{:?}", message.body);
    }
}

async fn read_and_send_lines(
    lines: &mut tokio::io::Lines<BufReader<tokio::io::Stdin>>,
    client: &Arc<ChatClient>,
    group: &str,
    username: Option<&str>,
) -> std::io::Result<()> {
    while let Some(text) = lines.next_line().await? {
        let body = json!({
            "type": "CHT",
            "text": text,
            "group": group,
            "username": username.unwrap_or("root"),
        });
        match client.send_message(body).await {
            Ok(ack) if !ack.is_success() => {
                tracing::warn!(status = ack.status, error = ?ack.error, "chat send rejected");
            }
            Err(err) => tracing::warn!(%err, "chat send failed"),
            Ok(_) => {}
        }
    }
    Ok(())
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
