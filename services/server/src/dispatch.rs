//! The chat server's dispatch table (spec §4.4) and group broadcast
//! algorithm.

use std::net::SocketAddr;
use std::sync::Arc;

use chat_endpoint::{Endpoint, Inbound};
use chat_protocol::{AckBody, ChtBody, RequestBody};
use chat_storage::{Storage, StorageError};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

/// The SYN handshake body: `{"username"?}` (spec §4.2).
#[derive(Debug, Deserialize)]
struct SynBody {
    username: Option<String>,
}

pub struct Server {
    endpoint: Arc<Endpoint>,
    storage: Arc<Storage>,
}

impl Server {
    pub fn new(endpoint: Arc<Endpoint>, storage: Arc<Storage>) -> Self {
        Server { endpoint, storage }
    }

    /// The receive loop: reads datagrams (subject to packet-loss simulation)
    /// and dispatches each to its own task so one slow handler never blocks
    /// another peer's traffic.
    pub async fn run(self: Arc<Self>) -> std::io::Result<()> {
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            match self.endpoint.recv_datagram(&mut buf).await {
                Ok(Some((n, from))) => {
                    let server = self.clone();
                    let bytes = buf[..n].to_vec();
                    tokio::spawn(async move { server.handle_datagram(&bytes, from).await });
                }
                Ok(None) => continue,
                Err(err) => warn!(%err, "UDP recv error"),
            }
        }
    }

    async fn handle_datagram(&self, bytes: &[u8], from: SocketAddr) {
        match self.endpoint.handle_inbound(bytes, from).await {
            Ok(Inbound::AckMatched) => {}
            Ok(Inbound::AckUnmatched) => debug!(%from, "dropping unmatched ACK"),
            Ok(Inbound::Frame(frame)) => {
                let seqn = frame.header.seqn;

                if frame.header.syn {
                    if let Some(username) = frame
                        .body
                        .clone()
                        .and_then(|v| serde_json::from_value::<SynBody>(v).ok())
                        .and_then(|syn| syn.username)
                    {
                        // Best-effort: an anonymous SYN (or one naming an
                        // unknown user) still succeeds.
                        if let Err(err) = self.storage.update_user_address(&username, &from.to_string()) {
                            debug!(%err, %username, "SYN address update ignored");
                        }
                    }
                }
                if frame.header.fin {
                    info!(%from, "session released");
                }

                let ack_body = match frame.body.clone() {
                    None => AckBody::ok(None),
                    Some(value) => match serde_json::from_value::<RequestBody>(value) {
                        Ok(body) => self.dispatch(body, seqn, from).await,
                        Err(_) => AckBody::client_error("Unrecognised message type"),
                    },
                };

                let response = serde_json::to_value(&ack_body).expect("AckBody always serializes");
                if let Err(err) = self.endpoint.send_ack(seqn, from, Some(response)).await {
                    warn!(%err, %from, "failed to send ACK");
                }
            }
            Err(err) => debug!(%err, %from, "dropping malformed datagram"),
        }
    }

    async fn dispatch(&self, body: RequestBody, inbound_seqn: i32, from: SocketAddr) -> AckBody {
        match body {
            RequestBody::Cht(cht) => self.handle_cht(cht, inbound_seqn, from).await,
            RequestBody::GrpAdd(add) => {
                let result = self.storage.new_group(&add.group, Some(&add.username), None);
                match result {
                    Ok(_) => {
                        for member in &add.members {
                            if let Err(err) = self.storage.new_member(member, &add.group) {
                                warn!(%err, %member, group = %add.group, "failed to add group member");
                            }
                        }
                        AckBody::ok(Some(json!({ "group": add.group })))
                    }
                    Err(err) => storage_error_to_ack(err),
                }
            }
            RequestBody::GrpSub(sub) => match self.storage.new_member(&sub.username, &sub.group) {
                Ok(()) => AckBody::ok(Some(json!({}))),
                Err(err) => storage_error_to_ack(err),
            },
            RequestBody::GrpHst(hst) => match self.storage.group_history(&hst.username) {
                Ok(groups) => AckBody::ok(Some(json!(groups))),
                Err(err) => storage_error_to_ack(err),
            },
            RequestBody::MsgHst(hst) => match self.storage.message_history(&hst.group) {
                Ok(messages) => AckBody::ok(Some(json!(messages))),
                Err(err) => storage_error_to_ack(err),
            },
            RequestBody::UsrAdd(add) => match self.storage.new_user(&add.username, &add.password, None) {
                Ok(created) => {
                    if created {
                        if let Err(err) = self.storage.new_member(&add.username, "default") {
                            warn!(%err, username = %add.username, "failed to subscribe new user to default group");
                        }
                    }
                    AckBody::ok(Some(json!({ "created_user": created })))
                }
                Err(err) => storage_error_to_ack(err),
            },
            RequestBody::UsrLogin(login) => {
                match self
                    .storage
                    .user_login(&login.username, &login.password, Some(&from.to_string()))
                {
                    Ok(valid) => AckBody::ok(Some(json!({
                        "credentials_valid": valid,
                        "username": login.username,
                    }))),
                    Err(err) => storage_error_to_ack(err),
                }
            }
            RequestBody::UsrLst(_) => match self.storage.user_list() {
                Ok(users) => AckBody::ok(Some(json!(users))),
                Err(err) => storage_error_to_ack(err),
            },
            RequestBody::MsgRba(_) => AckBody::client_error("Unrecognised message type"),
        }
    }

    async fn handle_cht(&self, body: ChtBody, inbound_seqn: i32, _from: SocketAddr) -> AckBody {
        let time_sent = body
            .time_sent
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        match self.storage.new_message(&body.group, &body.username, &body.text, time_sent) {
            Ok(_id) => {
                self.broadcast_chat(body, inbound_seqn);
                AckBody::ok(Some(json!({})))
            }
            Err(err) => storage_error_to_ack(err),
        }
    }

    /// Group broadcast (spec §4.4, the hardest detail): resolve the current
    /// address set, then fan out one independent reliable send per
    /// recipient with a fresh outer SEQN (so every ACK is distinctly
    /// correlatable) while preserving the originator's SEQN inside the body
    /// as `msg_seqn` (design note (b)). Each recipient's timeout
    /// deregisters only that address — it never fails the original CHT.
    fn broadcast_chat(&self, body: ChtBody, inbound_seqn: i32) {
        let addrs = match self.storage.addresses_for_group(&body.group) {
            Ok(addrs) => addrs,
            Err(err) => {
                warn!(%err, group = %body.group, "failed to resolve broadcast targets");
                return;
            }
        };

        let mut copy = body;
        copy.msg_seqn = Some(inbound_seqn);
        let payload = serde_json::to_value(&RequestBody::Cht(copy)).expect("ChtBody always serializes");

        info!(recipients = addrs.len(), "broadcasting chat message");
        for addr in addrs {
            let endpoint = self.endpoint.clone();
            let storage = self.storage.clone();
            let payload = payload.clone();
            tokio::spawn(async move {
                let hook: Arc<dyn Fn(SocketAddr) + Send + Sync> = Arc::new(move |peer| {
                    if let Err(err) = storage.deregister_address(peer) {
                        warn!(%err, %peer, "failed to deregister timed-out subscriber");
                    }
                });
                match endpoint.send_broadcast(Some(payload), addr, hook).await {
                    Ok(handle) => {
                        let _ = handle.wait().await;
                    }
                    Err(err) => warn!(%err, %addr, "broadcast send failed"),
                }
            });
        }
    }
}

fn storage_error_to_ack(err: StorageError) -> AckBody {
    match err {
        StorageError::NotFound(msg) => AckBody::client_error(msg),
        StorageError::Exists(msg) => AckBody::client_error(msg),
        other => AckBody::server_error(other.to_string()),
    }
}
