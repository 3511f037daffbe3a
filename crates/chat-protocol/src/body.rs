//! Typed request/response body shapes, keyed by the wire `type` field.
//!
//! The frame codec (`frame.rs`) treats the body as opaque JSON; this module
//! is the semantic layer consumed by the dispatcher (services/server) and
//! the client. An inbound body whose `type` is absent or unrecognized fails
//! to parse here and the caller responds with `status=400`.

use serde::{Deserialize, Serialize};

fn default_group() -> String {
    "default".to_owned()
}

fn default_username() -> String {
    "root".to_owned()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChtBody {
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(default = "default_username")]
    pub username: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_sent: Option<String>,
    /// Set by the server on each broadcast copy to the originator's inbound
    /// SEQN (spec §9(b)); absent on the sender's original request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_seqn: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrpAddBody {
    pub group: String,
    pub username: String,
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrpSubBody {
    pub group: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrpHstBody {
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsgHstBody {
    pub group: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsrAddBody {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsrLoginBody {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UsrLstBody {}

/// Server -> client "read by all" notification. Advisory only — see
/// SPEC_FULL.md §3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsgRbaBody {
    pub group: String,
    pub msg_seqn: i32,
}

/// The tagged union of every recognized request/notification body.
///
/// Deserializing a JSON object whose `type` is missing or doesn't match one
/// of these variants returns `Err`; the dispatcher maps that to the
/// "Unrecognised message type" `status=400` response from spec §4.4.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RequestBody {
    #[serde(rename = "CHT")]
    Cht(ChtBody),
    #[serde(rename = "GRP_SUB")]
    GrpSub(GrpSubBody),
    #[serde(rename = "GRP_ADD")]
    GrpAdd(GrpAddBody),
    #[serde(rename = "GRP_HST")]
    GrpHst(GrpHstBody),
    #[serde(rename = "MSG_HST")]
    MsgHst(MsgHstBody),
    #[serde(rename = "USR_LOGIN")]
    UsrLogin(UsrLoginBody),
    #[serde(rename = "USR_ADD")]
    UsrAdd(UsrAddBody),
    #[serde(rename = "USR_LST")]
    UsrLst(UsrLstBody),
    #[serde(rename = "MSG_RBA")]
    MsgRba(MsgRbaBody),
}

/// The body carried by every ACK packet (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AckBody {
    pub status: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
}

impl AckBody {
    pub fn ok(response: Option<serde_json::Value>) -> Self {
        AckBody {
            status: 200,
            error: None,
            response,
        }
    }

    pub fn client_error(message: impl Into<String>) -> Self {
        AckBody {
            status: 400,
            error: Some(message.into()),
            response: None,
        }
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        AckBody {
            status: 500,
            error: Some(message.into()),
            response: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}
