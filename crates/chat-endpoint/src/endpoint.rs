//! The reliable endpoint (spec §4.2): sequence numbers, ACK correlation,
//! exponential-backoff retransmission, and the SYN/FIN session flags, shared
//! by `chat-server` and `chat-client`.
//!
//! The outstanding-request table lives behind a single `tokio::sync::Mutex`
//! — nothing touches it except through `Endpoint`'s own methods — which is
//! how the "single cooperative event loop" requirement of spec §5 is met in
//! async Rust without a literal single OS thread.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chat_protocol::{AckBody, Frame, FrameError, Header};
use rand::{Rng, SeedableRng, rngs::SmallRng};
use serde_json::Value;
use tokio::net::UdpSocket;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, warn};

/// Default retransmission backoff for ordinary requests (spec §4.2: `d0 = 0.5s`).
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(500);
/// Initial backoff used for group broadcast copies (spec §4.4): fan-out
/// traffic should not be retransmitted as aggressively as direct requests.
pub const BROADCAST_INITIAL_DELAY: Duration = Duration::from_secs(2);
/// Cumulative retransmission budget before a request fails with `TimedOut`.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(5);
/// Default cap on the outstanding-request table (spec §5).
pub const DEFAULT_MAX_OUTSTANDING: usize = 10_000;

type TimeoutHook = Arc<dyn Fn(SocketAddr) + Send + Sync>;

struct Outstanding {
    wire_bytes: Vec<u8>,
    peer: SocketAddr,
    completion: oneshot::Sender<Result<AckBody, EndpointError>>,
}

/// What an inbound datagram turned out to be, the Rust-idiomatic replacement
/// for spec §4.2's `on_datagram(bytes, from) -> bool`: every `Ok` variant is
/// the literal contract's `true`, `Err(FrameError)` is its `false`/drop case.
#[derive(Debug)]
pub enum Inbound {
    /// An ACK that matched an outstanding request; the request has already
    /// been completed and its retransmission task cancelled.
    AckMatched,
    /// An ACK with no matching outstanding entry — a late duplicate after
    /// timeout, or an ACK for a session the endpoint no longer tracks.
    AckUnmatched,
    /// A non-ACK frame (a request, a SYN, a FIN) for the caller to dispatch.
    Frame(Frame),
}

use crate::error::EndpointError;

/// A completion handle for a single outstanding request, resolving to the
/// matching ACK body or a `TimedOut` failure — the future/promise bound to
/// its `SEQN` called for in spec §9.
pub struct RequestHandle {
    seqn: i32,
    rx: oneshot::Receiver<Result<AckBody, EndpointError>>,
}

impl RequestHandle {
    pub fn seqn(&self) -> i32 {
        self.seqn
    }

    pub async fn wait(self) -> Result<AckBody, EndpointError> {
        self.rx.await.unwrap_or(Err(EndpointError::ConnectionClosed))
    }
}

pub struct Endpoint {
    socket: Arc<UdpSocket>,
    outstanding: Arc<Mutex<HashMap<(SocketAddr, i32), Outstanding>>>,
    next_seqn: Mutex<i32>,
    max_outstanding: usize,
    default_timeout_hook: Option<TimeoutHook>,
    loss: Option<Mutex<(SmallRng, f64)>>,
}

impl Endpoint {
    pub fn new(socket: UdpSocket) -> Self {
        Endpoint {
            socket: Arc::new(socket),
            outstanding: Arc::new(Mutex::new(HashMap::new())),
            next_seqn: Mutex::new(0),
            max_outstanding: DEFAULT_MAX_OUTSTANDING,
            default_timeout_hook: None,
            loss: None,
        }
    }

    pub fn with_max_outstanding(mut self, max_outstanding: usize) -> Self {
        self.max_outstanding = max_outstanding;
        self
    }

    /// Install a hook invoked (with the peer address) whenever a request
    /// with no per-call override times out. The server wires this to
    /// `deregister_address`; the client wires it to its `connection_lost`
    /// signal.
    pub fn with_timeout_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(SocketAddr) + Send + Sync + 'static,
    {
        self.default_timeout_hook = Some(Arc::new(hook));
        self
    }

    /// Enable inbound packet-loss simulation (spec §4.2, A5): a seeded
    /// `SmallRng` drops the given fraction of inbound datagrams before they
    /// reach [`Endpoint::recv_datagram`]'s caller.
    pub fn with_packet_loss_simulation(mut self, rate: f64, seed: u64) -> Self {
        self.loss = Some(Mutex::new((SmallRng::seed_from_u64(seed), rate)));
        self
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn outstanding_len(&self) -> usize {
        // Best-effort snapshot; only used for diagnostics/tests, never for
        // the overload check itself (that always takes the lock).
        self.outstanding.try_lock().map(|t| t.len()).unwrap_or(0)
    }

    /// Send an ordinary request, expecting an ACK back from `peer`.
    pub async fn send_message(
        &self,
        body: Option<Value>,
        peer: SocketAddr,
    ) -> Result<RequestHandle, EndpointError> {
        self.send_with_flags(body, peer, false, false, DEFAULT_INITIAL_DELAY, None)
            .await
    }

    /// Send the session-opening SYN (spec §4.2: `SEQN=0`, `SYN=1`). Since the
    /// SEQN counter starts at zero and this is always the first packet an
    /// endpoint sends, no special-casing of the counter is needed.
    pub async fn send_syn(
        &self,
        body: Option<Value>,
        peer: SocketAddr,
    ) -> Result<RequestHandle, EndpointError> {
        self.send_with_flags(body, peer, true, false, DEFAULT_INITIAL_DELAY, None)
            .await
    }

    /// Send a session-closing FIN. Still ACK'd like any other request (spec
    /// §4.2: "no explicit ACK semantic change").
    pub async fn send_fin(&self, peer: SocketAddr) -> Result<RequestHandle, EndpointError> {
        self.send_with_flags(None, peer, false, true, DEFAULT_INITIAL_DELAY, None)
            .await
    }

    /// Send one copy of a group broadcast to a single recipient, with the
    /// longer initial backoff spec §4.4 calls for and a per-recipient
    /// timeout hook (the server passes one that deregisters `peer`).
    pub async fn send_broadcast(
        &self,
        body: Option<Value>,
        peer: SocketAddr,
        on_timed_out: TimeoutHook,
    ) -> Result<RequestHandle, EndpointError> {
        self.send_with_flags(
            body,
            peer,
            false,
            false,
            BROADCAST_INITIAL_DELAY,
            Some(on_timed_out),
        )
        .await
    }

    /// Fire-and-forget ACK, piggy-backed or server-originated. Not tracked
    /// in the outstanding table — ACKs are never themselves ACK'd.
    pub async fn send_ack(
        &self,
        seqn: i32,
        peer: SocketAddr,
        body: Option<Value>,
    ) -> Result<(), EndpointError> {
        let frame = Frame::new(Header::ack_for(seqn), body);
        self.socket.send_to(&frame.encode(), peer).await?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn send_with_flags(
        &self,
        body: Option<Value>,
        peer: SocketAddr,
        syn: bool,
        fin: bool,
        initial_delay: Duration,
        on_timed_out: Option<TimeoutHook>,
    ) -> Result<RequestHandle, EndpointError> {
        {
            let table = self.outstanding.lock().await;
            if table.len() >= self.max_outstanding {
                return Err(EndpointError::Overloaded);
            }
        }

        let mut next_seqn = self.next_seqn.lock().await;
        let seqn = *next_seqn;
        let header = Header {
            seqn,
            ack: false,
            syn,
            fin,
        };
        let frame = Frame::new(header, body);
        let bytes = frame.encode();
        *next_seqn = next_seqn.wrapping_add(bytes.len() as i32);
        drop(next_seqn);

        let (tx, rx) = oneshot::channel();
        let key = (peer, seqn);
        {
            let mut table = self.outstanding.lock().await;
            table.insert(
                key,
                Outstanding {
                    wire_bytes: bytes.clone(),
                    peer,
                    completion: tx,
                },
            );
        }
        self.socket.send_to(&bytes, peer).await?;

        let hook = on_timed_out.or_else(|| self.default_timeout_hook.clone());
        spawn_retransmit(
            self.socket.clone(),
            self.outstanding.clone(),
            key,
            initial_delay,
            hook,
        );

        Ok(RequestHandle { seqn, rx })
    }

    /// Process an inbound datagram already read from the socket. `Err`
    /// covers spec §4.1's "drop silently" case; every `Ok` variant is a
    /// frame the endpoint accepted.
    pub async fn handle_inbound(
        &self,
        bytes: &[u8],
        from: SocketAddr,
    ) -> Result<Inbound, FrameError> {
        let frame = Frame::decode(bytes)?;
        if !frame.header.ack {
            return Ok(Inbound::Frame(frame));
        }

        let key = (from, frame.header.seqn);
        let entry = {
            let mut table = self.outstanding.lock().await;
            table.remove(&key)
        };
        match entry {
            Some(entry) => {
                let ack_body = frame
                    .body
                    .and_then(|v| serde_json::from_value::<AckBody>(v).ok())
                    .unwrap_or_else(|| AckBody::ok(None));
                let _ = entry.completion.send(Ok(ack_body));
                Ok(Inbound::AckMatched)
            }
            None => Ok(Inbound::AckUnmatched),
        }
    }

    /// Receive one datagram, applying packet-loss simulation if enabled.
    /// Returns `Ok(None)` for a datagram simulated as dropped — the caller
    /// should simply loop back and call this again.
    pub async fn recv_datagram(
        &self,
        buf: &mut [u8],
    ) -> std::io::Result<Option<(usize, SocketAddr)>> {
        let (n, from) = self.socket.recv_from(buf).await?;
        if self.should_drop().await {
            debug!(%from, "simulated packet loss: dropping inbound datagram");
            return Ok(None);
        }
        Ok(Some((n, from)))
    }

    async fn should_drop(&self) -> bool {
        let Some(loss) = &self.loss else {
            return false;
        };
        let mut guard = loss.lock().await;
        let (rng, rate) = &mut *guard;
        rng.r#gen::<f64>() < *rate
    }

    /// Cancel every outstanding request with `ConnectionClosed` (spec §5).
    pub async fn close(&self) {
        let mut table = self.outstanding.lock().await;
        for (_, entry) in table.drain() {
            let _ = entry.completion.send(Err(EndpointError::ConnectionClosed));
        }
    }
}

fn spawn_retransmit(
    socket: Arc<UdpSocket>,
    outstanding: Arc<Mutex<HashMap<(SocketAddr, i32), Outstanding>>>,
    key: (SocketAddr, i32),
    initial_delay: Duration,
    on_timed_out: Option<TimeoutHook>,
) {
    tokio::spawn(async move {
        let mut delay = initial_delay;
        let mut elapsed = Duration::ZERO;
        loop {
            tokio::time::sleep(delay).await;
            elapsed += delay;

            let mut table = outstanding.lock().await;
            let Some(entry) = table.get(&key) else {
                // Already completed via a matching ACK; idempotent no-op.
                return;
            };

            if elapsed >= MAX_TIMEOUT {
                let entry = table.remove(&key).expect("checked present above");
                drop(table);
                let _ = entry.completion.send(Err(EndpointError::TimedOut));
                if let Some(hook) = on_timed_out {
                    hook(key.0);
                }
                return;
            }

            let wire_bytes = entry.wire_bytes.clone();
            let peer = entry.peer;
            drop(table);
            if let Err(err) = socket.send_to(&wire_bytes, peer).await {
                warn!(%peer, %err, "retransmit send failed");
            }
            delay = (delay * 2).min(MAX_TIMEOUT);
        }
    });
}
