//! Core memory type definitions.
//!
//! Defines [`BlockType`] (the four kinds of agent memory), [`Scope`] (global vs.
//! project isolation), the typed payloads carried by each block kind
//! ([`BlockContent`]), the raw persisted record ([`StoredBlock`]) and its
//! tag-checked counterpart ([`MemoryBlock`]), and [`ConversationMessage`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// The four kinds of memory block. A scope holds at most one block per type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    /// Who the agent is: name, traits, tone, expertise.
    Persona,
    /// What the project is: stack, architecture, layout.
    Project,
    /// How the user likes to work.
    User,
    /// Mistakes the agent made and how they were corrected.
    Corrections,
}

impl BlockType {
    pub const ALL: [BlockType; 4] = [
        BlockType::Persona,
        BlockType::Project,
        BlockType::User,
        BlockType::Corrections,
    ];

    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Persona => "persona",
            Self::Project => "project",
            Self::User => "user",
            Self::Corrections => "corrections",
        }
    }
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BlockType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "persona" => Ok(Self::Persona),
            "project" => Ok(Self::Project),
            "user" => Ok(Self::User),
            "corrections" => Ok(Self::Corrections),
            _ => Err(format!("unknown block type: {s}")),
        }
    }
}

/// Isolation boundary for memory blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// User-wide memory shared by every project.
    Global,
    /// Repository-local memory; overrides global on merge.
    Project,
}

impl Scope {
    pub const ALL: [Scope; 2] = [Scope::Global, Scope::Project];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Project => "project",
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "global" => Ok(Self::Global),
            "project" => Ok(Self::Project),
            _ => Err(format!("unknown scope: {s}")),
        }
    }
}

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

// ── Block payloads ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    #[serde(default)]
    pub traits: Vec<String>,
    #[serde(default)]
    pub communication_style: String,
    #[serde(default)]
    pub expertise_areas: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechStack {
    pub language: String,
    #[serde(default)]
    pub framework: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub styling: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub testing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_tool: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub tech_stack: TechStack,
    #[serde(default)]
    pub architecture: String,
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Directory path → what lives there.
    #[serde(default)]
    pub key_directories: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_files: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    Concise,
    #[default]
    Normal,
    Detailed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommunicationPreferences {
    #[serde(default)]
    pub verbosity: Verbosity,
    #[serde(default)]
    pub include_examples: bool,
    #[serde(default)]
    pub include_explanations: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    #[serde(default)]
    pub coding_style: Vec<String>,
    /// Free-form preferences, e.g. `{"indent": "tabs"}`.
    #[serde(default)]
    pub preferences: BTreeMap<String, Value>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub communication: CommunicationPreferences,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    pub issue: String,
    pub correction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub date: String,
}

/// Typed payload of a memory block; the variant determines the block type.
///
/// Serialized untagged: the type travels beside the payload, never inside it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BlockContent {
    Persona(Persona),
    Project(ProjectInfo),
    User(UserPreferences),
    Corrections(Vec<Correction>),
}

impl BlockContent {
    pub fn block_type(&self) -> BlockType {
        match self {
            Self::Persona(_) => BlockType::Persona,
            Self::Project(_) => BlockType::Project,
            Self::User(_) => BlockType::User,
            Self::Corrections(_) => BlockType::Corrections,
        }
    }

    /// Decode a raw payload according to its declared block type.
    pub fn from_value(block_type: BlockType, value: Value) -> Result<Self> {
        let invalid = |e: serde_json::Error| Error::InvalidContent {
            block_type: block_type.to_string(),
            reason: e.to_string(),
        };
        Ok(match block_type {
            BlockType::Persona => Self::Persona(serde_json::from_value(value).map_err(invalid)?),
            BlockType::Project => Self::Project(serde_json::from_value(value).map_err(invalid)?),
            BlockType::User => Self::User(serde_json::from_value(value).map_err(invalid)?),
            BlockType::Corrections => {
                Self::Corrections(serde_json::from_value(value).map_err(invalid)?)
            }
        })
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

// ── Records ───────────────────────────────────────────────────────────────────

/// A block as persisted: the payload is opaque JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredBlock {
    /// UUID v7 (time-sortable) primary key.
    pub id: String,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    pub scope: Scope,
    pub content: Value,
    /// Starts at 1, incremented on every content change.
    pub version: u32,
    /// RFC 3339 UTC timestamp, millisecond precision.
    pub created_at: String,
    pub updated_at: String,
}

impl StoredBlock {
    /// Lowercased text of the payload's leaf values, used for keyword
    /// matching and embedding input. Field names are left out so a query
    /// like "patterns" cannot match every block that has the field.
    pub fn searchable_text(&self) -> String {
        let mut out = String::new();
        flatten_text(&self.content, &mut out);
        out.trim_start().to_lowercase()
    }
}

/// A block whose payload has been decoded against its type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryBlock {
    pub id: String,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    pub scope: Scope,
    pub content: BlockContent,
    pub version: u32,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<StoredBlock> for MemoryBlock {
    type Error = Error;

    fn try_from(block: StoredBlock) -> Result<Self> {
        Ok(Self {
            content: BlockContent::from_value(block.block_type, block.content)?,
            id: block.id,
            block_type: block.block_type,
            scope: block.scope,
            version: block.version,
            created_at: block.created_at,
            updated_at: block.updated_at,
        })
    }
}

/// One historical version of a block.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockVersion {
    pub block_id: String,
    pub version: u32,
    pub content: Value,
    pub recorded_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessage {
    pub id: String,
    pub agent_id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, Value>>,
}

/// Append every string and number leaf of `value` to `out`, space separated.
/// Object keys are skipped.
pub fn flatten_text(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => {
            out.push(' ');
            out.push_str(s);
        }
        Value::Array(items) => items.iter().for_each(|v| flatten_text(v, out)),
        Value::Object(map) => map.values().for_each(|v| flatten_text(v, out)),
        Value::Number(n) => {
            out.push(' ');
            out.push_str(&n.to_string());
        }
        Value::Bool(_) | Value::Null => {}
    }
}
