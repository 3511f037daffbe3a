use chat_protocol::{Frame, Header};
use serde_json::Value;
use std::net::SocketAddr;
use tokio::net::UdpSocket;

/// A bare UDP socket that speaks the wire frame directly, with none of
/// `chat-endpoint`'s retransmission/ACK-matching machinery — useful for
/// integration tests that need to play an unreliable or malicious peer
/// (dropping datagrams, sending out-of-order, withholding an ACK) against a
/// real `chat-server`/`chat-client` endpoint.
pub struct MockPeer {
    socket: UdpSocket,
}

impl MockPeer {
    pub async fn bind() -> std::io::Result<Self> {
        Ok(Self {
            socket: UdpSocket::bind("127.0.0.1:0").await?,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub async fn send_frame(&self, header: Header, body: Option<Value>, to: SocketAddr) -> std::io::Result<()> {
        let frame = Frame::new(header, body);
        self.socket.send_to(&frame.encode(), to).await?;
        Ok(())
    }

    pub async fn send_raw(&self, bytes: &[u8], to: SocketAddr) -> std::io::Result<()> {
        self.socket.send_to(bytes, to).await?;
        Ok(())
    }

    pub async fn recv_frame(&self) -> std::io::Result<(Frame, SocketAddr)> {
        let mut buf = [0u8; 64 * 1024];
        loop {
            let (n, from) = self.socket.recv_from(&mut buf).await?;
            match Frame::decode(&buf[..n]) {
                Ok(frame) => return Ok((frame, from)),
                Err(_) => continue,
            }
        }
    }

    /// Wait for an inbound frame up to `timeout`, returning `None` if none
    /// arrives — used to assert that a server did *not* retransmit/send.
    pub async fn recv_frame_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> std::io::Result<Option<(Frame, SocketAddr)>> {
        match tokio::time::timeout(timeout, self.recv_frame()).await {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        }
    }
}
