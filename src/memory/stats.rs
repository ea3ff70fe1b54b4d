use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::memory::store::ScopeStore;
use crate::memory::types::{BlockType, Scope};

/// Per-scope storage statistics.
#[derive(Debug, Serialize)]
pub struct StoreStats {
    pub scope: Scope,
    pub total_blocks: u64,
    pub by_type: BTreeMap<String, u64>,
    /// Versions recorded across all current blocks.
    pub block_versions: u64,
    pub messages: u64,
    pub agents: u64,
    pub embeddings: u64,
    pub audit_entries: u64,
    pub db_size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

/// Compute statistics for one scope store.
pub fn store_stats(store: &ScopeStore) -> Result<StoreStats> {
    let db_size_bytes = store
        .path()
        .and_then(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .unwrap_or(0);

    let conn = store.lock()?;
    let by_type = count_by_type(&conn)?;

    Ok(StoreStats {
        scope: store.scope(),
        total_blocks: by_type.values().sum(),
        by_type,
        block_versions: count(&conn, "SELECT COUNT(*) FROM block_versions")?,
        messages: count(&conn, "SELECT COUNT(*) FROM messages")?,
        agents: count(&conn, "SELECT COUNT(DISTINCT agent_id) FROM messages")?,
        embeddings: count(&conn, "SELECT COUNT(*) FROM block_embeddings")?,
        audit_entries: count(&conn, "SELECT COUNT(*) FROM memory_log")?,
        db_size_bytes,
        last_updated: conn.query_row("SELECT MAX(updated_at) FROM memory_blocks", [], |row| {
            row.get(0)
        })?,
    })
}

fn count(conn: &Connection, sql: &str) -> Result<u64> {
    let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(n as u64)
}

/// Count by block type; every type is present, zero if absent.
fn count_by_type(conn: &Connection) -> Result<BTreeMap<String, u64>> {
    let mut map: BTreeMap<String, u64> = BlockType::ALL
        .iter()
        .map(|t| (t.as_str().to_string(), 0))
        .collect();

    let mut stmt = conn.prepare("SELECT type, COUNT(*) FROM memory_blocks GROUP BY type")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for (t, n) in rows {
        map.insert(t, n as u64);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::Role;
    use serde_json::json;

    #[test]
    fn stats_count_blocks_messages_and_versions() {
        let store = ScopeStore::open_in_memory(Scope::Global).unwrap();
        store.save_block(BlockType::Persona, &json!({"name": "a"})).unwrap();
        store.save_block(BlockType::Persona, &json!({"name": "b"})).unwrap();
        store.save_block(BlockType::User, &json!({})).unwrap();
        store.add_message("x", Role::User, "hi", None).unwrap();
        store.add_message("y", Role::User, "hi", None).unwrap();

        let stats = store_stats(&store).unwrap();
        assert_eq!(stats.scope, Scope::Global);
        assert_eq!(stats.total_blocks, 2);
        assert_eq!(stats.by_type["persona"], 1);
        assert_eq!(stats.by_type["corrections"], 0);
        assert_eq!(stats.block_versions, 3);
        assert_eq!(stats.messages, 2);
        assert_eq!(stats.agents, 2);
        assert_eq!(stats.embeddings, 0);
        assert_eq!(stats.db_size_bytes, 0);
        assert!(stats.last_updated.is_some());
    }

    #[test]
    fn empty_store_has_no_last_updated() {
        let store = ScopeStore::open_in_memory(Scope::Project).unwrap();
        let stats = store_stats(&store).unwrap();
        assert_eq!(stats.total_blocks, 0);
        assert!(stats.last_updated.is_none());
    }
}
