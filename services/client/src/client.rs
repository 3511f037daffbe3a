//! The chat client (C5, spec §4.5): opens a reliable session against a
//! `chat-server`, correlates responses via `chat-endpoint`, and ACKs inbound
//! server-pushed frames (`CHT`, `MSG_RBA`, `GRP_ADD`) on the caller's behalf.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use chat_endpoint::{Endpoint, EndpointError, Inbound};
use chat_protocol::{AckBody, Frame, RequestBody};
use serde_json::Value;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// A frame the server pushed to this client without a matching outstanding
/// request — a chat broadcast copy or a system notification. The listener
/// loop has already ACKed these (spec §4.2's "piggy-backed ACK") by the time
/// they reach the caller through [`ChatClient::listen`]'s channel.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub seqn: i32,
    pub from: SocketAddr,
    pub body: RequestBody,
}

/// Resolves once the client's endpoint reports a terminal timeout (spec
/// §4.5: "reports connection loss"). Spec §4.5 also notes that a reconnect
/// is performed by constructing a new endpoint — old outstanding requests
/// are discarded with it, so this type carries no reconnect logic itself.
pub struct ConnectionLost {
    rx: oneshot::Receiver<()>,
}

impl ConnectionLost {
    pub async fn wait(self) {
        let _ = self.rx.await;
    }
}

pub struct ChatClient {
    endpoint: Arc<Endpoint>,
    remote: SocketAddr,
}

impl ChatClient {
    /// Bind a fresh local UDP socket with `remote` as its configured peer
    /// and wire a [`ConnectionLost`] signal to the endpoint's default
    /// timeout hook.
    pub async fn bind(remote: SocketAddr) -> std::io::Result<(Self, ConnectionLost)> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let (lost_tx, lost_rx) = oneshot::channel();
        let lost_tx = Mutex::new(Some(lost_tx));
        let endpoint = Endpoint::new(socket).with_timeout_hook(move |peer| {
            debug!(%peer, "endpoint timeout hook fired, signalling connection lost");
            if let Some(tx) = lost_tx.lock().unwrap().take() {
                let _ = tx.send(());
            }
        });
        Ok((
            ChatClient {
                endpoint: Arc::new(endpoint),
                remote,
            },
            ConnectionLost { rx: lost_rx },
        ))
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.endpoint.local_addr()
    }

    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    /// Issue the session-opening SYN (spec §4.2: `SEQN=0 SYN=1`, body
    /// `{"username"?}`). Its completion is this client's `server_connected`
    /// notification.
    pub async fn connect(&self, username: Option<&str>) -> Result<AckBody, EndpointError> {
        let body = username.map(|u| serde_json::json!({ "username": u }));
        let handle = self.endpoint.send_syn(body, self.remote).await?;
        handle.wait().await
    }

    /// Release this session's state on the server (spec §4.2: `FIN=1`).
    pub async fn disconnect(&self) -> Result<AckBody, EndpointError> {
        let handle = self.endpoint.send_fin(self.remote).await?;
        handle.wait().await
    }

    /// Send a typed request body to the server, awaiting its ACK.
    pub async fn send_message(&self, body: Value) -> Result<AckBody, EndpointError> {
        let handle = self.endpoint.send_message(Some(body), self.remote).await?;
        handle.wait().await
    }

    /// Run the receive loop until the socket errors: decode inbound frames,
    /// complete matching ACKs via `chat-endpoint`, ACK server-pushed bodies
    /// the spec calls out (`CHT`/`MSG_RBA`/`GRP_ADD`), and forward every
    /// inbound request body to `on_message`. Intended to be spawned as its
    /// own task (`tokio::spawn(client.clone().listen(tx))`).
    pub async fn listen(self: Arc<Self>, on_message: mpsc::UnboundedSender<InboundMessage>) {
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let (n, from) = match self.endpoint.recv_datagram(&mut buf).await {
                Ok(Some(pair)) => pair,
                Ok(None) => continue,
                Err(err) => {
                    warn!(%err, "client socket error, stopping listener");
                    return;
                }
            };
            match self.endpoint.handle_inbound(&buf[..n], from).await {
                Ok(Inbound::AckMatched) => {}
                Ok(Inbound::AckUnmatched) => debug!(%from, "dropping unmatched ACK"),
                Ok(Inbound::Frame(frame)) => self.handle_frame(frame, from, &on_message).await,
                Err(err) => debug!(%err, %from, "dropping malformed datagram"),
            }
        }
    }

    async fn handle_frame(
        &self,
        frame: Frame,
        from: SocketAddr,
        on_message: &mpsc::UnboundedSender<InboundMessage>,
    ) {
        let seqn = frame.header.seqn;
        let Some(value) = frame.body.clone() else {
            return;
        };
        let Ok(body) = serde_json::from_value::<RequestBody>(value) else {
            debug!(%from, seqn, "unrecognized inbound body, not ACKing");
            return;
        };
        if matches!(
            body,
            RequestBody::Cht(_) | RequestBody::MsgRba(_) | RequestBody::GrpAdd(_)
        ) {
            if let Err(err) = self.endpoint.send_ack(seqn, from, None).await {
                warn!(%err, %from, "failed to ACK inbound push");
            }
        }
        let _ = on_message.send(InboundMessage { seqn, from, body });
    }
}
