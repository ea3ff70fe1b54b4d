//! Block embedding side table.
//!
//! Vectors are stored as little-endian `f32` bytes next to the block version
//! they were computed from. A row whose version is behind its block is stale.

use rusqlite::{params, Connection};
use std::collections::HashMap;

use crate::db::migrations;
use crate::embedding::EmbeddingVector;
use crate::error::Result;
use crate::memory::now_timestamp;
use crate::memory::store::ScopeStore;
use crate::memory::types::StoredBlock;

#[derive(Debug, Clone)]
pub struct StoredEmbedding {
    pub block_version: u32,
    pub vector: Vec<f32>,
}

pub fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// `None` when the blob length is not a multiple of four.
pub fn bytes_to_vector(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

/// All embeddings in the scope, keyed by block id. Corrupt rows are skipped.
pub fn load_embeddings(store: &ScopeStore) -> Result<HashMap<String, StoredEmbedding>> {
    let conn = store.lock()?;
    let mut stmt = conn.prepare("SELECT block_id, block_version, vector FROM block_embeddings")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, Vec<u8>>(2)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut out = HashMap::with_capacity(rows.len());
    for (block_id, block_version, bytes) in rows {
        match bytes_to_vector(&bytes) {
            Some(vector) => {
                out.insert(
                    block_id,
                    StoredEmbedding {
                        block_version,
                        vector,
                    },
                );
            }
            None => tracing::warn!(block_id = %block_id, "ignoring corrupt embedding row"),
        }
    }
    Ok(out)
}

pub fn save_embedding(store: &ScopeStore, block: &StoredBlock, embedding: &EmbeddingVector) -> Result<()> {
    let conn = store.lock()?;
    conn.execute(
        "INSERT INTO block_embeddings (block_id, block_version, provider, model, dimensions, vector, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(block_id) DO UPDATE SET
            block_version = excluded.block_version,
            provider = excluded.provider,
            model = excluded.model,
            dimensions = excluded.dimensions,
            vector = excluded.vector,
            created_at = excluded.created_at",
        params![
            block.id,
            block.version,
            embedding.provider.as_str(),
            embedding.model,
            embedding.dimensions as i64,
            vector_to_bytes(&embedding.values),
            now_timestamp(),
        ],
    )?;
    Ok(())
}

/// Delete every stored embedding; returns how many were removed.
pub fn clear_embeddings(store: &ScopeStore) -> Result<usize> {
    let conn = store.lock()?;
    Ok(conn.execute("DELETE FROM block_embeddings", [])?)
}

/// Compare the scope's recorded model key with `model_key`. On mismatch,
/// drop all vectors and record the new key. Returns true if vectors were
/// dropped.
pub fn reconcile_model(store: &ScopeStore, model_key: &str) -> Result<bool> {
    let conn = store.lock()?;
    reconcile_model_conn(&conn, model_key)
}

fn reconcile_model_conn(conn: &Connection, model_key: &str) -> Result<bool> {
    let recorded = migrations::get_embedding_model(conn)?;
    if recorded.as_deref() == Some(model_key) {
        return Ok(false);
    }

    let dropped = conn.execute("DELETE FROM block_embeddings", [])?;
    migrations::set_embedding_model(conn, model_key)?;
    if dropped > 0 {
        tracing::warn!(
            previous = recorded.as_deref().unwrap_or("<none>"),
            current = model_key,
            dropped,
            "embedding model changed, stale vectors removed"
        );
    }
    Ok(true)
}
