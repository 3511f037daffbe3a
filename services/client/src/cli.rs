use clap::Parser;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;

/// udp-chat client: opens a reliable session against a `chat-server` and
/// sends typed chat messages from the terminal.
#[derive(Debug, Parser)]
#[command(name = "chat-client")]
pub struct Cli {
    /// Server host to connect to (spec §6: defaults `127.0.0.1`; with one
    /// positional argument only the host is set).
    pub host: Option<String>,
    /// Server port to connect to (default `5000`).
    pub port: Option<u16>,
    /// Username carried in the initial SYN (spec §4.2/§4.5).
    #[arg(long)]
    pub username: Option<String>,
    /// Group the terminal front-end sends typed lines to.
    #[arg(long, default_value = "default")]
    pub group: String,
    /// Log level, falls back to `RUST_LOG`/`LOG_LEVEL` env if unset.
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Cli {
    pub fn remote_addr(&self) -> String {
        let host = self.host.as_deref().unwrap_or(DEFAULT_HOST);
        let port = self.port.unwrap_or(DEFAULT_PORT);
        format!("{host}:{port}")
    }
}
