use serde::Serialize;

/// One entry of `GRP_HST`'s response: a group the user belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupHistoryEntry {
    pub name: String,
    pub date_created: String,
}

/// One entry of `MSG_HST`'s response: a single persisted chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageHistoryEntry {
    pub username: String,
    pub text: String,
    pub date_sent: String,
}
