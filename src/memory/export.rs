//! Versioned export envelope for the full block set of both scopes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::memory::types::StoredBlock;

/// Envelope format version written by this build.
pub const EXPORT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEnvelope {
    pub version: u32,
    /// RFC 3339 timestamp of the export.
    pub exported_at: String,
    pub blocks: Vec<StoredBlock>,
}

impl ExportEnvelope {
    pub fn new(blocks: Vec<StoredBlock>) -> Self {
        Self {
            version: EXPORT_FORMAT_VERSION,
            exported_at: crate::memory::now_timestamp(),
            blocks,
        }
    }
}

/// Counts reported by an import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Entries that could not be decoded or failed their type check.
    pub skipped: usize,
}

impl ImportReport {
    pub fn total(&self) -> usize {
        self.created + self.updated + self.unchanged + self.skipped
    }
}

/// Leniently decode an export document.
///
/// Returns `None` when the document is not JSON or lacks a `blocks` array.
/// Individual entries that fail to decode are dropped and counted in the
/// second tuple element.
pub fn parse_envelope(json: &str) -> Option<(ExportEnvelope, usize)> {
    let value: Value = match serde_json::from_str(json) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "import document is not valid JSON");
            return None;
        }
    };

    let version = value
        .get("version")
        .and_then(Value::as_u64)
        .map(|v| v as u32)
        .unwrap_or(EXPORT_FORMAT_VERSION);
    if version > EXPORT_FORMAT_VERSION {
        tracing::warn!(version, supported = EXPORT_FORMAT_VERSION, "import envelope is newer than this build");
    }
    let exported_at = value
        .get("exportedAt")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let Some(entries) = value.get("blocks").and_then(Value::as_array) else {
        tracing::warn!("import document has no blocks array");
        return None;
    };

    let mut skipped = 0;
    let blocks = entries
        .iter()
        .filter_map(|entry| match serde_json::from_value::<StoredBlock>(entry.clone()) {
            Ok(block) => Some(block),
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed block in import");
                skipped += 1;
                None
            }
        })
        .collect();

    Some((
        ExportEnvelope {
            version,
            exported_at,
            blocks,
        },
        skipped,
    ))
}
