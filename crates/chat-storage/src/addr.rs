use std::net::SocketAddr;

/// Parse a stored `"host:port"` string into a [`SocketAddr`].
///
/// Splits on the *last* `:` so IPv6 literals wrapped as `host:port` are not
/// special-cased wrong; rejects a missing host or port, and relies on `u16`
/// parsing to enforce the `[1, 65535]` range (port `0` is rejected
/// explicitly since `u16` alone would accept it).
pub fn parse_addr(raw: &str) -> Option<SocketAddr> {
    let idx = raw.rfind(':')?;
    let (host, port) = (&raw[..idx], &raw[idx + 1..]);
    if host.is_empty() || port.is_empty() {
        return None;
    }
    let port: u16 = port.parse().ok()?;
    if port == 0 {
        return None;
    }
    format!("{host}:{port}").parse().ok()
}
