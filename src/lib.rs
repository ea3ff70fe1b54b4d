//! Scoped memory for AI coding agents.
//!
//! Strata keeps structured memory blocks in two scopes: a **global** scope
//! shared across every project (under `~/.strata/`) and a **project** scope
//! living next to the code (`<project-root>/.strata/`). Each scope is its own
//! SQLite database. When both scopes hold a block of the same type, the
//! project block wins.
//!
//! | Block type | Holds |
//! |------------|-------|
//! | **persona** | Agent name, traits, communication style, expertise |
//! | **project** | Name, description, tech stack, architecture, patterns |
//! | **user** | Coding style, tools, communication preferences |
//! | **corrections** | Mistakes the agent made and how to avoid them |
//!
//! # Architecture
//!
//! - **Storage**: SQLite per scope, with block version history and an audit log
//! - **Embeddings**: a local feature-hashing provider, or the OpenAI and Voyage HTTP APIs
//! - **Search**: keyword, semantic, or hybrid ranking with query expansion and intent detection
//!
//! # Modules
//!
//! - [`config`]: configuration loading from TOML files and environment variables
//! - [`db`]: SQLite initialization, schema, migrations, and health checks
//! - [`embedding`]: embedding providers and the provider factory
//! - [`math`]: vector similarity helpers
//! - [`memory`]: scope stores, the scope manager, and the [`memory::service::MemoryService`] façade
//! - [`search`]: per-scope search engine with caching and analytics
//! - [`tagger`]: rule-based tag extraction

pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod math;
pub mod memory;
pub mod search;
pub mod tagger;

pub use error::{Error, Result};
