use std::path::PathBuf;

use clap::Parser;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;

/// udp-chat server: dispatches reliable requests and fans chat messages out
/// to group subscribers.
#[derive(Debug, Parser)]
#[command(name = "chat-server")]
pub struct Cli {
    /// Host to bind to (spec §6: defaults `127.0.0.1`; with one positional
    /// argument only the host is set).
    pub host: Option<String>,
    /// Port to bind to (default `5000`).
    pub port: Option<u16>,
    /// SQLite database path.
    #[arg(long, default_value = "./udp_chat.sqlite3")]
    pub db: PathBuf,
    /// Drop a fraction of inbound datagrams before processing, to exercise
    /// retransmission paths.
    #[arg(long)]
    pub simulate_loss: bool,
    /// Fraction of inbound datagrams to drop when `--simulate-loss` is set.
    #[arg(long, default_value_t = 0.2)]
    pub loss_rate: f64,
    /// Seed for the packet-loss simulator, for reproducible runs.
    #[arg(long, default_value_t = 0)]
    pub loss_seed: u64,
    /// Log level, falls back to `RUST_LOG`/`LOG_LEVEL` env if unset.
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Cli {
    pub fn bind_addr(&self) -> String {
        let host = self.host.as_deref().unwrap_or(DEFAULT_HOST);
        let port = self.port.unwrap_or(DEFAULT_PORT);
        format!("{host}:{port}")
    }
}
