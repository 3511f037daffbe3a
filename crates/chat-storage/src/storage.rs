use std::net::SocketAddr;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::addr::parse_addr;
use crate::error::{StorageError, StorageResult};
use crate::models::{GroupHistoryEntry, MessageHistoryEntry};

const SCHEMA_SQL: &str = include_str!("storage/schema.sql");

/// Reserved account created on bootstrap; mirrors the original
/// implementation's unusable placeholder `root` credential.
const ROOT_USERNAME: &str = "root";
const DEFAULT_GROUP: &str = "default";

/// SQLite-backed implementation of the storage port (spec §4.3).
///
/// `rusqlite::Connection` is `Send` but not `Sync`; the dispatcher shares one
/// `Storage` across every connection's async task via `Arc`, so the
/// connection lives behind a plain `Mutex` rather than requiring an
/// `&mut self` everywhere. Calls are short-lived single statements, so
/// lock contention is not a real cost.
pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        let storage = Self { conn: Mutex::new(conn) };
        storage.apply_pragmas()?;
        storage.apply_schema()?;
        storage.bootstrap()?;
        Ok(storage)
    }

    fn apply_pragmas(&self) -> StorageResult<()> {
        self.conn
            .lock()
            .unwrap()
            .execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Ok(())
    }

    fn apply_schema(&self) -> StorageResult<()> {
        self.conn.lock().unwrap().execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    pub fn integrity_check(&self) -> StorageResult<()> {
        let r: String = self
            .conn
            .lock()
            .unwrap()
            .pragma_query_value(None, "integrity_check", |row| row.get(0))?;
        if r != "ok" {
            return Err(StorageError::IntegrityCheckFailed(r));
        }
        Ok(())
    }

    fn bootstrap(&self) -> StorageResult<()> {
        if self.user_id(ROOT_USERNAME)?.is_none() {
            let blob = chat_crypto::hash_new_password("");
            self.conn.lock().unwrap().execute(
                "INSERT INTO users (username, password_blob, address) VALUES (?1, ?2, NULL)",
                params![ROOT_USERNAME, blob],
            )?;
        }
        if self.group_id(DEFAULT_GROUP)?.is_none() {
            self.conn.lock().unwrap().execute(
                "INSERT INTO groups (name, password, date_created) VALUES (?1, NULL, ?2)",
                params![DEFAULT_GROUP, Utc::now().to_rfc3339()],
            )?;
        }
        Ok(())
    }

    fn user_id(&self, username: &str) -> StorageResult<Option<i64>> {
        Ok(self
            .conn
            .lock()
            .unwrap()
            .query_row(
                "SELECT id FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn group_id(&self, name: &str) -> StorageResult<Option<i64>> {
        Ok(self
            .conn
            .lock()
            .unwrap()
            .query_row(
                "SELECT id FROM groups WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn require_user_id(&self, username: &str) -> StorageResult<i64> {
        self.user_id(username)?
            .ok_or_else(|| StorageError::NotFound(format!("user {username:?}")))
    }

    fn require_group_id(&self, name: &str) -> StorageResult<i64> {
        self.group_id(name)?
            .ok_or_else(|| StorageError::NotFound(format!("group {name:?}")))
    }

    /// Returns `true` iff a new row was created.
    pub fn new_user(&self, username: &str, password: &str, address: Option<&str>) -> StorageResult<bool> {
        if self.user_id(username)?.is_some() {
            return Ok(false);
        }
        let blob = chat_crypto::hash_new_password(password);
        self.conn.lock().unwrap().execute(
            "INSERT INTO users (username, password_blob, address) VALUES (?1, ?2, ?3)",
            params![username, blob, address],
        )?;
        Ok(true)
    }

    /// Constant-time password check; updates the stored address on success.
    pub fn user_login(&self, username: &str, password: &str, address: Option<&str>) -> StorageResult<bool> {
        let blob: String = self
            .conn
            .lock()
            .unwrap()
            .query_row(
                "SELECT password_blob FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| StorageError::NotFound(format!("user {username:?}")))?;
        let valid = chat_crypto::verify_password(&blob, password)?;
        if valid {
            self.conn.lock().unwrap().execute(
                "UPDATE users SET address = ?2 WHERE username = ?1",
                params![username, address],
            )?;
        }
        Ok(valid)
    }

    pub fn user_list(&self) -> StorageResult<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT username FROM users ORDER BY username")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Fails with [`StorageError::Exists`] if the group name is taken.
    /// Inserts a Member row for `creator` if present.
    pub fn new_group(&self, name: &str, creator: Option<&str>, password: Option<&str>) -> StorageResult<i64> {
        if self.group_id(name)?.is_some() {
            return Err(StorageError::Exists(format!("group {name:?}")));
        }
        self.conn.lock().unwrap().execute(
            "INSERT INTO groups (name, password, date_created) VALUES (?1, ?2, ?3)",
            params![name, password, Utc::now().to_rfc3339()],
        )?;
        let group_id = self.group_id(name)?.expect("just inserted");
        if let Some(creator) = creator {
            self.new_member(creator, name)?;
        }
        Ok(group_id)
    }

    /// Idempotent: a second subscription for the same `(user, group)` pair
    /// is a no-op, enforced by the `members` table's uniqueness constraint.
    pub fn new_member(&self, username: &str, group_name: &str) -> StorageResult<()> {
        let user_id = self.require_user_id(username)?;
        let group_id = self.require_group_id(group_name)?;
        self.conn.lock().unwrap().execute(
            "INSERT OR IGNORE INTO members (user_id, group_id) VALUES (?1, ?2)",
            params![user_id, group_id],
        )?;
        Ok(())
    }

    pub fn group_names(&self) -> StorageResult<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT name FROM groups ORDER BY name")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn group_history(&self, username: &str) -> StorageResult<Vec<GroupHistoryEntry>> {
        let user_id = self.require_user_id(username)?;
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT g.name, g.date_created FROM groups g \
             JOIN members m ON m.group_id = g.id \
             WHERE m.user_id = ?1 ORDER BY g.name",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(GroupHistoryEntry {
                name: row.get(0)?,
                date_created: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn message_history(&self, group_name: &str) -> StorageResult<Vec<MessageHistoryEntry>> {
        let group_id = self.require_group_id(group_name)?;
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT u.username, msg.text, msg.date_sent FROM messages msg \
             JOIN users u ON u.id = msg.user_id \
             WHERE msg.group_id = ?1 ORDER BY msg.id",
        )?;
        let rows = stmt.query_map(params![group_id], |row| {
            Ok(MessageHistoryEntry {
                username: row.get(0)?,
                text: row.get(1)?,
                date_sent: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Fails with [`StorageError::NotFound`] if `group_name` or `username`
    /// is unknown. Does **not** create the group or subscribe the user.
    pub fn new_message(
        &self,
        group_name: &str,
        username: &str,
        text: &str,
        time_sent: DateTime<Utc>,
    ) -> StorageResult<i64> {
        let group_id = self.require_group_id(group_name)?;
        let user_id = self.require_user_id(username)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO messages (group_id, user_id, text, date_sent) VALUES (?1, ?2, ?3, ?4)",
            params![group_id, user_id, text, time_sent.to_rfc3339()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Addresses of every current member of `group_name`. Entries whose
    /// stored address is absent or fails to parse are skipped and logged.
    pub fn addresses_for_group(&self, group_name: &str) -> StorageResult<Vec<SocketAddr>> {
        let group_id = self.require_group_id(group_name)?;
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT u.username, u.address FROM users u \
             JOIN members m ON m.user_id = u.id \
             WHERE m.group_id = ?1",
        )?;
        let rows = stmt.query_map(params![group_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
        })?;
        let mut addrs = Vec::new();
        for row in rows {
            let (username, address) = row?;
            let Some(address) = address else { continue };
            match parse_addr(&address) {
                Some(addr) => addrs.push(addr),
                None => tracing::warn!(%username, %address, "skipping unparsable member address"),
            }
        }
        Ok(addrs)
    }

    pub fn update_user_address(&self, username: &str, addr: &str) -> StorageResult<()> {
        self.require_user_id(username)?;
        self.conn.lock().unwrap().execute(
            "UPDATE users SET address = ?2 WHERE username = ?1",
            params![username, addr],
        )?;
        Ok(())
    }

    /// Called from `on_timed_out` during group broadcast: clears the
    /// address of whichever user was last registered under `addr`, so the
    /// stale subscriber drops out of future `addresses_for_group` results.
    pub fn deregister_address(&self, addr: SocketAddr) -> StorageResult<()> {
        self.conn.lock().unwrap().execute(
            "UPDATE users SET address = NULL WHERE address = ?1",
            params![addr.to_string()],
        )?;
        Ok(())
    }
}
