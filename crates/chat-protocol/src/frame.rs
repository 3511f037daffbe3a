//! On-wire frame: a fixed 7-byte header followed by an optional JSON body.
//!
//! ```text
//! offset 0 : int32   SEQN   (big-endian, signed)
//! offset 4 : uint8   ACK    (0|1)
//! offset 5 : uint8   SYN    (0|1)
//! offset 6 : uint8   FIN    (0|1)
//! offset 7 : bytes   JSON body, UTF-8, empty allowed
//! ```

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

pub const HEADER_LEN: usize = 7;

/// The fixed binary header shared by every packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub seqn: i32,
    pub ack: bool,
    pub syn: bool,
    pub fin: bool,
}

impl Header {
    pub fn new(seqn: i32) -> Self {
        Header {
            seqn,
            ack: false,
            syn: false,
            fin: false,
        }
    }

    pub fn ack_for(seqn: i32) -> Self {
        Header {
            seqn,
            ack: true,
            syn: false,
            fin: false,
        }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.write_i32::<BigEndian>(self.seqn).expect("Vec write is infallible");
        out.write_u8(self.ack as u8).expect("Vec write is infallible");
        out.write_u8(self.syn as u8).expect("Vec write is infallible");
        out.write_u8(self.fin as u8).expect("Vec write is infallible");
    }

    fn decode(cursor: &mut Cursor<&[u8]>) -> Result<Self, FrameError> {
        let seqn = cursor.read_i32::<BigEndian>().map_err(|_| FrameError::TooShort)?;
        let ack = cursor.read_u8().map_err(|_| FrameError::TooShort)? != 0;
        let syn = cursor.read_u8().map_err(|_| FrameError::TooShort)? != 0;
        let fin = cursor.read_u8().map_err(|_| FrameError::TooShort)? != 0;
        Ok(Header { seqn, ack, syn, fin })
    }
}

/// A fully decoded packet: header plus an optional JSON body value.
///
/// An absent body is represented as `None`, distinct from an empty JSON
/// object `{}` — the wire format treats a zero-length trailing payload as
/// "no body" (see spec §3: "absent body ⇔ empty payload").
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub header: Header,
    pub body: Option<serde_json::Value>,
}

impl Frame {
    pub fn new(header: Header, body: Option<serde_json::Value>) -> Self {
        Frame { header, body }
    }

    /// Serialize to wire bytes. The codec does not validate semantic body
    /// fields (`type`, `username`, ...); that belongs to the dispatcher.
    pub fn encode(&self) -> Vec<u8> {
        let body_bytes = match &self.body {
            Some(v) => serde_json::to_vec(v).expect("serde_json::Value always serializes"),
            None => Vec::new(),
        };
        let mut out = Vec::with_capacity(HEADER_LEN + body_bytes.len());
        self.header.encode(&mut out);
        out.extend_from_slice(&body_bytes);
        out
    }

    /// Peel the fixed header prefix, then parse the remainder as JSON if
    /// non-empty. Fails with `FrameError` when the buffer is shorter than
    /// the header or the trailing bytes are not valid JSON/UTF-8 — callers
    /// must drop such datagrams silently (spec §4.1).
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < HEADER_LEN {
            return Err(FrameError::TooShort);
        }
        let mut cursor = Cursor::new(bytes);
        let header = Header::decode(&mut cursor)?;
        let rest = &bytes[HEADER_LEN..];
        let body = if rest.is_empty() {
            None
        } else {
            Some(serde_json::from_slice(rest).map_err(FrameError::InvalidJson)?)
        };
        Ok(Frame { header, body })
    }

    /// The byte length this frame occupies on the wire, used to assign the
    /// next outgoing SEQN (spec invariant 1: "a sender increments by the
    /// serialized byte length of each transmitted packet").
    pub fn wire_len(&self) -> usize {
        self.encode().len()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("datagram shorter than the {HEADER_LEN}-byte header")]
    TooShort,
    #[error("invalid JSON body: {0}")]
    InvalidJson(#[source] serde_json::Error),
}
