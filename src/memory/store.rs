//! Per-scope persistence: memory blocks, block history, and conversation messages.
//!
//! A [`ScopeStore`] is a cheap, clonable handle over one scope's SQLite database.
//! Every mutation runs inside a transaction and writes an audit-log row. Block
//! payloads are stored as opaque JSON; decoding them against their type is the
//! façade's job. The store has no notion of embeddings.

use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::memory::now_timestamp;
use crate::memory::types::{BlockType, BlockVersion, ConversationMessage, Role, Scope, StoredBlock};

/// Result of [`ScopeStore::save_block`].
#[derive(Debug, Clone)]
pub struct SaveOutcome {
    /// The block as it is now stored.
    pub block: StoredBlock,
    /// Version before this save, or `None` if the block was created.
    pub previous_version: Option<u32>,
    /// `false` when the saved content was identical to the current content.
    pub changed: bool,
}

impl SaveOutcome {
    pub fn is_new(&self) -> bool {
        self.previous_version.is_none()
    }
}

/// Result of [`ScopeStore::import_block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    Created,
    Updated,
    Unchanged,
}

#[derive(Clone)]
pub struct ScopeStore {
    scope: Scope,
    path: Option<PathBuf>,
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for ScopeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeStore")
            .field("scope", &self.scope)
            .field("path", &self.path)
            .finish()
    }
}

const BLOCK_COLUMNS: &str = "id, type, content, version, created_at, updated_at";

impl ScopeStore {
    /// Open (or create) the store file for `scope` at `path`.
    pub fn open(scope: Scope, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = crate::db::open_database(path)?;
        tracing::info!(scope = %scope, path = %path.display(), "scope store opened");
        Ok(Self {
            scope,
            path: Some(path.to_path_buf()),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a throwaway store backed by an in-memory database.
    pub fn open_in_memory(scope: Scope) -> Result<Self> {
        Ok(Self {
            scope,
            path: None,
            conn: Arc::new(Mutex::new(crate::db::open_in_memory()?)),
        })
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Database file path; `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Lock the underlying connection. Never hold the guard across an `.await`.
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::Store(format!("{} store lock poisoned: {e}", self.scope)))
    }

    // ── Blocks ────────────────────────────────────────────────────────────────

    /// Upsert the block of `block_type`: creates it at version 1, or replaces
    /// its content and bumps the version. Saving identical content is a no-op.
    pub fn save_block(&self, block_type: BlockType, content: &Value) -> Result<SaveOutcome> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let outcome = match select_block_by_type(&tx, self.scope, block_type)? {
            Some(current) if current.content == *content => SaveOutcome {
                previous_version: Some(current.version),
                block: current,
                changed: false,
            },
            Some(current) => {
                let previous = current.version;
                let block = update_block(&tx, current, content)?;
                write_audit_log(
                    &tx,
                    "update",
                    &block.id,
                    Some(&serde_json::json!({"type": block_type, "version": block.version})),
                )?;
                SaveOutcome {
                    block,
                    previous_version: Some(previous),
                    changed: true,
                }
            }
            None => {
                let now = now_timestamp();
                let block = StoredBlock {
                    id: uuid::Uuid::now_v7().to_string(),
                    block_type,
                    scope: self.scope,
                    content: content.clone(),
                    version: 1,
                    created_at: now.clone(),
                    updated_at: now,
                };
                insert_block(&tx, &block)?;
                write_audit_log(
                    &tx,
                    "create",
                    &block.id,
                    Some(&serde_json::json!({"type": block_type})),
                )?;
                SaveOutcome {
                    block,
                    previous_version: None,
                    changed: true,
                }
            }
        };

        tx.commit()?;
        Ok(outcome)
    }

    pub fn get_block(&self, block_type: BlockType) -> Result<Option<StoredBlock>> {
        let conn = self.lock()?;
        select_block_by_type(&conn, self.scope, block_type)
    }

    pub fn get_block_by_id(&self, id: &str) -> Result<Option<StoredBlock>> {
        let conn = self.lock()?;
        let scope = self.scope;
        let block = conn
            .query_row(
                &format!("SELECT {BLOCK_COLUMNS} FROM memory_blocks WHERE id = ?1"),
                params![id],
                |row| row_to_block(row, scope),
            )
            .optional()?;
        Ok(block)
    }

    /// All current blocks in this scope, oldest first.
    pub fn get_all_blocks(&self) -> Result<Vec<StoredBlock>> {
        let conn = self.lock()?;
        let scope = self.scope;
        let mut stmt = conn.prepare(&format!(
            "SELECT {BLOCK_COLUMNS} FROM memory_blocks ORDER BY created_at, rowid"
        ))?;
        let blocks = stmt
            .query_map([], |row| row_to_block(row, scope))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(blocks)
    }

    /// Hard delete by id; history and derived rows cascade. Returns the deleted block.
    pub fn delete_block(&self, id: &str) -> Result<StoredBlock> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let scope = self.scope;

        let block = tx
            .query_row(
                &format!("SELECT {BLOCK_COLUMNS} FROM memory_blocks WHERE id = ?1"),
                params![id],
                |row| row_to_block(row, scope),
            )
            .optional()?
            .ok_or_else(|| Error::not_found("block", id))?;

        write_audit_log(
            &tx,
            "delete",
            id,
            Some(&serde_json::json!({"type": block.block_type, "version": block.version})),
        )?;
        tx.execute("DELETE FROM memory_blocks WHERE id = ?1", params![id])?;
        tx.commit()?;

        Ok(block)
    }

    /// Every recorded version of the current block of `block_type`, oldest first.
    pub fn block_history(&self, block_type: BlockType) -> Result<Vec<BlockVersion>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT v.block_id, v.version, v.content, v.recorded_at \
             FROM block_versions v JOIN memory_blocks b ON b.id = v.block_id \
             WHERE b.type = ?1 ORDER BY v.version",
        )?;
        let versions = stmt
            .query_map(params![block_type.as_str()], |row| {
                let content: String = row.get(2)?;
                Ok(BlockVersion {
                    block_id: row.get(0)?,
                    version: row.get(1)?,
                    content: parse_content(&content),
                    recorded_at: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(versions)
    }

    /// Upsert an exported block. A block absent from this scope is inserted
    /// with its exported id, version, and timestamps; an existing block of the
    /// same type is updated like [`save_block`](Self::save_block).
    pub fn import_block(&self, block: &StoredBlock) -> Result<ImportOutcome> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let outcome = match select_block_by_type(&tx, self.scope, block.block_type)? {
            Some(current) if current.content == block.content => ImportOutcome::Unchanged,
            Some(current) => {
                let updated = update_block(&tx, current, &block.content)?;
                write_audit_log(
                    &tx,
                    "import",
                    &updated.id,
                    Some(&serde_json::json!({"type": block.block_type, "version": updated.version})),
                )?;
                ImportOutcome::Updated
            }
            None => {
                let mut imported = block.clone();
                imported.scope = self.scope;
                imported.version = imported.version.max(1);
                insert_block(&tx, &imported)?;
                write_audit_log(
                    &tx,
                    "import",
                    &imported.id,
                    Some(&serde_json::json!({"type": block.block_type, "version": imported.version})),
                )?;
                ImportOutcome::Created
            }
        };

        tx.commit()?;
        Ok(outcome)
    }

    // ── Messages ──────────────────────────────────────────────────────────────

    pub fn add_message(
        &self,
        agent_id: &str,
        role: Role,
        content: &str,
        metadata: Option<Map<String, Value>>,
    ) -> Result<ConversationMessage> {
        let message = ConversationMessage {
            id: uuid::Uuid::now_v7().to_string(),
            agent_id: agent_id.to_string(),
            role,
            content: content.to_string(),
            timestamp: now_timestamp(),
            metadata,
        };
        let metadata_json = message
            .metadata
            .as_ref()
            .map(|m| serde_json::to_string(m))
            .transpose()?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO messages (id, agent_id, role, content, timestamp, metadata) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.id,
                message.agent_id,
                message.role.as_str(),
                message.content,
                message.timestamp,
                metadata_json,
            ],
        )?;
        Ok(message)
    }

    /// Most recent messages for `agent_id`, newest first, at most `limit`.
    pub fn get_messages(
        &self,
        agent_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ConversationMessage>> {
        let conn = self.lock()?;
        // SQLite treats a negative LIMIT as unbounded.
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = conn.prepare(
            "SELECT id, agent_id, role, content, timestamp, metadata FROM messages \
             WHERE agent_id = ?1 ORDER BY timestamp DESC, rowid DESC LIMIT ?2",
        )?;
        let messages = stmt
            .query_map(params![agent_id, limit], |row| {
                let role: String = row.get(2)?;
                let metadata: Option<String> = row.get(5)?;
                Ok(ConversationMessage {
                    id: row.get(0)?,
                    agent_id: row.get(1)?,
                    role: role.parse().map_err(|_| {
                        rusqlite::Error::InvalidColumnType(2, "role".into(), rusqlite::types::Type::Text)
                    })?,
                    content: row.get(3)?,
                    timestamp: row.get(4)?,
                    metadata: metadata.and_then(|s| serde_json::from_str(&s).ok()),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(messages)
    }

    /// Delete every message of `agent_id`. Returns how many were removed.
    pub fn clear_messages(&self, agent_id: &str) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let removed = tx.execute("DELETE FROM messages WHERE agent_id = ?1", params![agent_id])?;
        write_audit_log(
            &tx,
            "clear",
            agent_id,
            Some(&serde_json::json!({"messages": removed})),
        )?;
        tx.commit()?;
        Ok(removed)
    }

    pub fn message_count(&self, agent_id: &str) -> Result<u64> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE agent_id = ?1",
            params![agent_id],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }

    /// Distinct agent ids with at least one message.
    pub fn agents(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT DISTINCT agent_id FROM messages ORDER BY agent_id")?;
        let agents = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(agents)
    }

    /// Close the connection. If other handles still share it, this handle is
    /// dropped and the connection closes with the last one.
    pub fn close(self) -> Result<()> {
        let scope = self.scope;
        match Arc::try_unwrap(self.conn) {
            Ok(mutex) => {
                let conn = mutex
                    .into_inner()
                    .map_err(|e| Error::Store(format!("{scope} store lock poisoned: {e}")))?;
                conn.close().map_err(|(_, e)| Error::from(e))?;
                tracing::info!(scope = %scope, "scope store closed");
            }
            Err(_) => {
                tracing::debug!(scope = %scope, "scope store still shared, dropping handle");
            }
        }
        Ok(())
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn select_block_by_type(
    conn: &Connection,
    scope: Scope,
    block_type: BlockType,
) -> Result<Option<StoredBlock>> {
    let block = conn
        .query_row(
            &format!("SELECT {BLOCK_COLUMNS} FROM memory_blocks WHERE type = ?1"),
            params![block_type.as_str()],
            |row| row_to_block(row, scope),
        )
        .optional()?;
    Ok(block)
}

fn insert_block(tx: &Transaction, block: &StoredBlock) -> Result<()> {
    let content = serde_json::to_string(&block.content)?;
    tx.execute(
        &format!("INSERT INTO memory_blocks ({BLOCK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
        params![
            block.id,
            block.block_type.as_str(),
            content,
            block.version,
            block.created_at,
            block.updated_at,
        ],
    )?;
    record_version(tx, &block.id, block.version, &content)?;
    Ok(())
}

fn update_block(tx: &Transaction, current: StoredBlock, content: &Value) -> Result<StoredBlock> {
    let serialized = serde_json::to_string(content)?;
    let block = StoredBlock {
        version: current.version + 1,
        updated_at: now_timestamp(),
        content: content.clone(),
        ..current
    };
    tx.execute(
        "UPDATE memory_blocks SET content = ?1, version = ?2, updated_at = ?3 WHERE id = ?4",
        params![serialized, block.version, block.updated_at, block.id],
    )?;
    record_version(tx, &block.id, block.version, &serialized)?;
    Ok(block)
}

fn record_version(tx: &Transaction, block_id: &str, version: u32, content: &str) -> Result<()> {
    tx.execute(
        "INSERT OR REPLACE INTO block_versions (block_id, version, content, recorded_at) \
         VALUES (?1, ?2, ?3, ?4)",
        params![block_id, version, content, now_timestamp()],
    )?;
    Ok(())
}

fn row_to_block(row: &Row<'_>, scope: Scope) -> rusqlite::Result<StoredBlock> {
    let block_type: String = row.get(1)?;
    let content: String = row.get(2)?;
    Ok(StoredBlock {
        id: row.get(0)?,
        block_type: block_type.parse().map_err(|_| {
            rusqlite::Error::InvalidColumnType(1, "type".into(), rusqlite::types::Type::Text)
        })?,
        scope,
        content: parse_content(&content),
        version: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Decode stored JSON; corrupt payloads degrade to an empty object.
fn parse_content(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "malformed block content in store, treating as empty");
        Value::Object(Map::new())
    })
}

/// Write an entry to the memory_log audit table.
pub(crate) fn write_audit_log(
    conn: &Connection,
    operation: &str,
    target_id: &str,
    details: Option<&Value>,
) -> Result<()> {
    let details_json = details.map(|d| d.to_string());
    conn.execute(
        "INSERT INTO memory_log (operation, target_id, details, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![operation, target_id, details_json, now_timestamp()],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_store() -> ScopeStore {
        ScopeStore::open_in_memory(Scope::Project).unwrap()
    }

    #[test]
    fn test_save_creates_block_at_version_1() {
        let store = test_store();
        let outcome = store
            .save_block(BlockType::Persona, &json!({"name": "Ada"}))
            .unwrap();

        assert!(outcome.is_new());
        assert!(outcome.changed);
        assert_eq!(outcome.block.version, 1);
        assert_eq!(outcome.block.scope, Scope::Project);
        assert_eq!(outcome.block.created_at, outcome.block.updated_at);
    }

    #[test]
    fn test_save_same_type_updates_in_place() {
        let store = test_store();
        let first = store
            .save_block(BlockType::Persona, &json!({"name": "Ada"}))
            .unwrap();
        let second = store
            .save_block(BlockType::Persona, &json!({"name": "Grace"}))
            .unwrap();

        assert_eq!(second.block.id, first.block.id);
        assert_eq!(second.block.version, 2);
        assert_eq!(second.previous_version, Some(1));
        assert_eq!(store.get_all_blocks().unwrap().len(), 1);
        assert_eq!(
            store.get_block(BlockType::Persona).unwrap().unwrap().content,
            json!({"name": "Grace"})
        );
    }

    #[test]
    fn test_save_identical_content_is_noop() {
        let store = test_store();
        store
            .save_block(BlockType::User, &json!({"tools": ["git"]}))
            .unwrap();
        let again = store
            .save_block(BlockType::User, &json!({"tools": ["git"]}))
            .unwrap();

        assert!(!again.changed);
        assert_eq!(again.block.version, 1);
        assert_eq!(store.block_history(BlockType::User).unwrap().len(), 1);
    }

    #[test]
    fn test_history_tracks_every_version() {
        let store = test_store();
        for name in ["a", "b", "c"] {
            store
                .save_block(BlockType::Persona, &json!({"name": name}))
                .unwrap();
        }
        let history = store.block_history(BlockType::Persona).unwrap();
        let versions: Vec<u32> = history.iter().map(|v| v.version).collect();
        assert_eq!(versions, vec![1, 2, 3]);
        assert_eq!(history[0].content, json!({"name": "a"}));
    }

    #[test]
    fn test_delete_block_and_not_found() {
        let store = test_store();
        let saved = store
            .save_block(BlockType::Corrections, &json!([]))
            .unwrap();

        let deleted = store.delete_block(&saved.block.id).unwrap();
        assert_eq!(deleted.block_type, BlockType::Corrections);
        assert!(store.get_block(BlockType::Corrections).unwrap().is_none());
        assert!(store.block_history(BlockType::Corrections).unwrap().is_empty());

        let err = store.delete_block(&saved.block.id).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_import_preserves_identity_and_is_idempotent() {
        let source = test_store();
        let saved = source
            .save_block(BlockType::Project, &json!({"name": "x"}))
            .unwrap()
            .block;

        let target = ScopeStore::open_in_memory(Scope::Project).unwrap();
        assert_eq!(target.import_block(&saved).unwrap(), ImportOutcome::Created);
        assert_eq!(target.import_block(&saved).unwrap(), ImportOutcome::Unchanged);

        let imported = target.get_block(BlockType::Project).unwrap().unwrap();
        assert_eq!(imported, saved);

        let mut changed = saved.clone();
        changed.content = json!({"name": "y"});
        assert_eq!(target.import_block(&changed).unwrap(), ImportOutcome::Updated);
        assert_eq!(target.get_block(BlockType::Project).unwrap().unwrap().version, 2);
    }

    #[test]
    fn test_messages_newest_first_and_bounded() {
        let store = test_store();
        for i in 0..5 {
            store
                .add_message("agent-1", Role::User, &format!("message {i}"), None)
                .unwrap();
        }
        store
            .add_message("agent-2", Role::Assistant, "other agent", None)
            .unwrap();

        let recent = store.get_messages("agent-1", Some(3)).unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].content, "message 4");
        assert_eq!(recent[2].content, "message 2");

        let all = store.get_messages("agent-1", None).unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(store.agents().unwrap(), vec!["agent-1", "agent-2"]);
    }

    #[test]
    fn test_message_metadata_round_trip() {
        let store = test_store();
        let mut meta = Map::new();
        meta.insert("tool".into(), json!("grep"));
        store
            .add_message("agent", Role::System, "ran a tool", Some(meta.clone()))
            .unwrap();
        let messages = store.get_messages("agent", None).unwrap();
        assert_eq!(messages[0].metadata, Some(meta));
        assert_eq!(messages[0].role, Role::System);
    }

    #[test]
    fn test_clear_messages_only_touches_one_agent() {
        let store = test_store();
        store.add_message("a", Role::User, "one", None).unwrap();
        store.add_message("a", Role::User, "two", None).unwrap();
        store.add_message("b", Role::User, "three", None).unwrap();

        assert_eq!(store.clear_messages("a").unwrap(), 2);
        assert_eq!(store.message_count("a").unwrap(), 0);
        assert_eq!(store.message_count("b").unwrap(), 1);
    }

    #[test]
    fn test_audit_log_written() {
        let store = test_store();
        let saved = store
            .save_block(BlockType::Persona, &json!({"name": "Ada"}))
            .unwrap();
        let conn = store.lock().unwrap();
        let op: String = conn
            .query_row(
                "SELECT operation FROM memory_log WHERE target_id = ?1",
                params![saved.block.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(op, "create");
    }
}
