//! Scope-aware memory façade.
//!
//! [`MemoryService`] is an explicitly constructed context object combining
//! the [`ScopeManager`], one [`SearchEngine`] per scope, and an [`EventBus`].
//! Block payloads are decoded against their type here; the stores below only
//! see opaque JSON. Every failing operation also emits `memory:error`.

use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::config::{SearchConfig, StrataConfig};
use crate::db::{check_database_health, HealthReport};
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::error::{Error, Result};
use crate::memory::events::{EventBus, MemoryEvent};
use crate::memory::export::{parse_envelope, ExportEnvelope, ImportReport};
use crate::memory::scope::ScopeManager;
use crate::memory::stats::{store_stats, StoreStats};
use crate::memory::store::{ImportOutcome, ScopeStore};
use crate::memory::types::{
    BlockContent, BlockType, BlockVersion, ConversationMessage, Correction, MemoryBlock, Persona,
    ProjectInfo, Role, Scope, StoredBlock, UserPreferences,
};
use crate::search::analytics::SearchStats;
use crate::search::{rank, BackfillReport, Progress, SearchEngine, SearchOptions, SearchResult};
use crate::tagger::{AutoTagger, TagResult};

/// Every block type resolved across scopes, project first. Types present in
/// neither scope are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadedMemory {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persona: Option<Persona>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserPreferences>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corrections: Option<Vec<Correction>>,
}

impl LoadedMemory {
    fn set(&mut self, content: BlockContent) {
        match content {
            BlockContent::Persona(p) => self.persona = Some(p),
            BlockContent::Project(p) => self.project = Some(p),
            BlockContent::User(u) => self.user = Some(u),
            BlockContent::Corrections(c) => self.corrections = Some(c),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.persona.is_none() && self.project.is_none() && self.user.is_none() && self.corrections.is_none()
    }
}

struct Engines {
    global: SearchEngine,
    project: SearchEngine,
}

impl Engines {
    fn get(&self, scope: Scope) -> &SearchEngine {
        match scope {
            Scope::Global => &self.global,
            Scope::Project => &self.project,
        }
    }
}

pub struct MemoryService {
    scopes: ScopeManager,
    provider: Arc<dyn EmbeddingProvider>,
    search_config: SearchConfig,
    engines: Option<Engines>,
    tagger: AutoTagger,
    events: EventBus,
}

impl MemoryService {
    /// Build a service from configuration, detecting the project root from
    /// `start_dir`. Fails if the embedding provider cannot be configured.
    pub fn new(config: &StrataConfig, start_dir: &Path) -> Result<Self> {
        let provider = create_provider(&config.embedding)?;
        Ok(Self::with_provider(
            ScopeManager::new(config, start_dir),
            provider,
            config.search.clone(),
        ))
    }

    pub fn with_provider(
        scopes: ScopeManager,
        provider: Arc<dyn EmbeddingProvider>,
        search_config: SearchConfig,
    ) -> Self {
        Self {
            scopes,
            provider,
            search_config,
            engines: None,
            tagger: AutoTagger::new(),
            events: EventBus::default(),
        }
    }

    /// Open both scopes and initialize their search engines. Idempotent.
    pub async fn initialize(&mut self) -> Result<()> {
        let result = self.initialize_inner().await;
        self.track("initialize", result)
    }

    async fn initialize_inner(&mut self) -> Result<()> {
        self.scopes.initialize()?;
        if self.engines.is_some() {
            return Ok(());
        }

        let engines = Engines {
            global: self.new_engine(self.scopes.get_global_store()?.clone()),
            project: self.new_engine(self.scopes.get_project_store()?.clone()),
        };
        engines.global.initialize().await?;
        engines.project.initialize().await?;
        self.engines = Some(engines);
        Ok(())
    }

    fn new_engine(&self, store: ScopeStore) -> SearchEngine {
        SearchEngine::new(store, Arc::clone(&self.provider), self.search_config.clone())
    }

    pub fn is_initialized(&self) -> bool {
        self.engines.is_some()
    }

    /// Close both scopes. Accessors fail with `NotInitialized` afterwards.
    pub fn close(&mut self) -> Result<()> {
        self.engines = None;
        let result = self.scopes.close();
        self.track("close", result)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MemoryEvent> {
        self.events.subscribe()
    }

    // ── Scope ─────────────────────────────────────────────────────────────────

    /// Switch the current scope; returns the previous one.
    pub fn set_scope(&mut self, scope: Scope) -> Scope {
        let previous = self.scopes.set_scope(scope);
        if previous != scope {
            self.events.emit(MemoryEvent::ScopeChanged {
                previous_scope: previous,
                new_scope: scope,
            });
        }
        previous
    }

    pub fn current_scope(&self) -> Scope {
        self.scopes.get_current_scope()
    }

    pub fn project_root(&self) -> &Path {
        self.scopes.project_root()
    }

    pub fn scope_dir(&self, scope: Scope) -> &Path {
        self.scopes.scope_dir(scope)
    }

    // ── Blocks ────────────────────────────────────────────────────────────────

    pub fn save_block(&self, content: BlockContent) -> Result<MemoryBlock> {
        self.save_block_in(self.current_scope(), content)
    }

    /// Upsert the block of `content`'s type in `scope`.
    pub fn save_block_in(&self, scope: Scope, content: BlockContent) -> Result<MemoryBlock> {
        let result = self.save_inner(scope, content);
        self.track("save_block", result)
    }

    fn save_inner(&self, scope: Scope, content: BlockContent) -> Result<MemoryBlock> {
        let store = self.scopes.get_store(scope)?;
        let outcome = store.save_block(content.block_type(), &content.to_value()?)?;
        let previous_version = outcome.previous_version;
        let changed = outcome.changed;
        let block = MemoryBlock::try_from(outcome.block)?;

        if changed {
            tracing::debug!(scope = %scope, block_id = %block.id, version = block.version, "block saved");
            self.invalidate(scope);
            self.events.emit(MemoryEvent::Updated {
                block: block.clone(),
                previous_version,
                is_new: previous_version.is_none(),
            });
        }
        Ok(block)
    }

    pub fn get_block(&self, block_type: BlockType) -> Result<Option<MemoryBlock>> {
        self.get_block_in(self.current_scope(), block_type)
    }

    pub fn get_block_in(&self, scope: Scope, block_type: BlockType) -> Result<Option<MemoryBlock>> {
        let result = self
            .scopes
            .get_store(scope)
            .and_then(|store| store.get_block(block_type))
            .and_then(|block| block.map(MemoryBlock::try_from).transpose());
        self.track("get_block", result)
    }

    pub fn get_all_blocks(&self) -> Result<Vec<MemoryBlock>> {
        self.get_all_blocks_in(self.current_scope())
    }

    /// All decodable blocks in `scope`. A block whose payload no longer
    /// matches its type is skipped and reported as `memory:error`.
    pub fn get_all_blocks_in(&self, scope: Scope) -> Result<Vec<MemoryBlock>> {
        let blocks = self.track(
            "get_all_blocks",
            self.scopes.get_store(scope).and_then(ScopeStore::get_all_blocks),
        )?;
        Ok(blocks.into_iter().filter_map(|b| self.decode(b)).collect())
    }

    pub fn delete_block(&self, id: &str) -> Result<()> {
        self.delete_block_in(self.current_scope(), id)
    }

    /// Hard delete. Unknown ids fail with `NotFound` and emit no
    /// `memory:deleted`.
    pub fn delete_block_in(&self, scope: Scope, id: &str) -> Result<()> {
        let result = self
            .scopes
            .get_store(scope)
            .and_then(|store| store.delete_block(id));
        let block = self.track("delete_block", result)?;

        tracing::debug!(scope = %scope, block_id = %id, "block deleted");
        self.invalidate(scope);
        self.events.emit(MemoryEvent::Deleted {
            id: block.id,
            block_type: block.block_type,
            scope: block.scope,
        });
        Ok(())
    }

    /// Saved versions of the current scope's block of `block_type`.
    pub fn block_history(&self, block_type: BlockType) -> Result<Vec<BlockVersion>> {
        let result = self
            .scopes
            .get_current_store()
            .and_then(|store| store.block_history(block_type));
        self.track("block_history", result)
    }

    // ── Merged view ───────────────────────────────────────────────────────────

    /// Resolve every block type, project scope first, global as fallback.
    pub fn load_all_memory(&self) -> Result<LoadedMemory> {
        let mut loaded = LoadedMemory::default();
        for block_type in BlockType::ALL {
            if let Some(block) = self.merged_block(block_type)? {
                loaded.set(block.content);
            }
        }
        Ok(loaded)
    }

    fn merged_block(&self, block_type: BlockType) -> Result<Option<MemoryBlock>> {
        for scope in [Scope::Project, Scope::Global] {
            let stored = self.track(
                "load_all_memory",
                self.scopes
                    .get_store(scope)
                    .and_then(|store| store.get_block(block_type)),
            )?;
            if let Some(block) = stored.and_then(|b| self.decode(b)) {
                return Ok(Some(block));
            }
        }
        Ok(None)
    }

    pub fn get_persona(&self) -> Result<Option<Persona>> {
        Ok(match self.merged_block(BlockType::Persona)?.map(|b| b.content) {
            Some(BlockContent::Persona(p)) => Some(p),
            _ => None,
        })
    }

    pub fn get_project_info(&self) -> Result<Option<ProjectInfo>> {
        Ok(match self.merged_block(BlockType::Project)?.map(|b| b.content) {
            Some(BlockContent::Project(p)) => Some(p),
            _ => None,
        })
    }

    pub fn get_user_preferences(&self) -> Result<Option<UserPreferences>> {
        Ok(match self.merged_block(BlockType::User)?.map(|b| b.content) {
            Some(BlockContent::User(u)) => Some(u),
            _ => None,
        })
    }

    pub fn get_corrections(&self) -> Result<Vec<Correction>> {
        Ok(match self.merged_block(BlockType::Corrections)?.map(|b| b.content) {
            Some(BlockContent::Corrections(c)) => c,
            _ => Vec::new(),
        })
    }

    /// Append a correction to the current scope's corrections block.
    pub fn add_correction(
        &self,
        issue: &str,
        correction: &str,
        context: Option<&str>,
    ) -> Result<MemoryBlock> {
        let mut corrections = match self.get_block(BlockType::Corrections)?.map(|b| b.content) {
            Some(BlockContent::Corrections(c)) => c,
            _ => Vec::new(),
        };
        corrections.push(Correction {
            issue: issue.to_string(),
            correction: correction.to_string(),
            context: context.map(str::to_string),
            date: crate::memory::now_timestamp(),
        });
        self.save_block(BlockContent::Corrections(corrections))
    }

    // ── Import / export ───────────────────────────────────────────────────────

    /// Both scopes' blocks, global first.
    pub fn export_memory(&self) -> Result<ExportEnvelope> {
        let result = Scope::ALL
            .iter()
            .map(|scope| self.scopes.get_store(*scope).and_then(ScopeStore::get_all_blocks))
            .collect::<Result<Vec<_>>>()
            .map(|per_scope| ExportEnvelope::new(per_scope.into_iter().flatten().collect()));
        self.track("export", result)
    }

    pub fn export_json(&self) -> Result<String> {
        let envelope = self.export_memory()?;
        let result = serde_json::to_string_pretty(&envelope).map_err(Error::from);
        self.track("export", result)
    }

    /// Upsert every block into its scope. Re-importing the same envelope
    /// changes nothing.
    pub fn import_memory(&self, envelope: &ExportEnvelope) -> Result<ImportReport> {
        let mut report = ImportReport::default();
        for block in &envelope.blocks {
            match self.import_one(block) {
                Ok(ImportOutcome::Created) => report.created += 1,
                Ok(ImportOutcome::Updated) => report.updated += 1,
                Ok(ImportOutcome::Unchanged) => report.unchanged += 1,
                Err(e @ Error::InvalidContent { .. }) => {
                    tracing::warn!(block_id = %block.id, error = %e, "skipping invalid block in import");
                    self.emit_error("import", &e);
                    report.skipped += 1;
                }
                Err(e) => return self.track("import", Err(e)),
            }
        }
        tracing::info!(
            created = report.created,
            updated = report.updated,
            unchanged = report.unchanged,
            skipped = report.skipped,
            "import complete"
        );
        Ok(report)
    }

    fn import_one(&self, block: &StoredBlock) -> Result<ImportOutcome> {
        BlockContent::from_value(block.block_type, block.content.clone())?;
        let store = self.scopes.get_store(block.scope)?;
        let previous_version = store.get_block(block.block_type)?.map(|b| b.version);
        let outcome = store.import_block(block)?;

        if outcome != ImportOutcome::Unchanged {
            self.invalidate(block.scope);
            if let Some(current) = store.get_block(block.block_type)?.and_then(|b| self.decode(b)) {
                self.events.emit(MemoryEvent::Updated {
                    block: current,
                    previous_version,
                    is_new: previous_version.is_none(),
                });
            }
        }
        Ok(outcome)
    }

    /// Import from JSON text. A document that cannot be parsed imports
    /// nothing and emits `memory:error`.
    pub fn import_json(&self, json: &str) -> Result<ImportReport> {
        let Some((envelope, skipped)) = parse_envelope(json) else {
            self.events.emit(MemoryEvent::Error {
                error: "import document is not a valid export envelope".into(),
                operation: "import".into(),
            });
            return Ok(ImportReport::default());
        };
        let mut report = self.import_memory(&envelope)?;
        report.skipped += skipped;
        Ok(report)
    }

    // ── Conversation ──────────────────────────────────────────────────────────

    pub fn add_message(
        &self,
        agent_id: &str,
        role: Role,
        content: &str,
        metadata: Option<Map<String, Value>>,
    ) -> Result<ConversationMessage> {
        let result = self
            .scopes
            .get_current_store()
            .and_then(|store| store.add_message(agent_id, role, content, metadata));
        self.track("add_message", result)
    }

    /// Most recent first.
    pub fn get_messages(&self, agent_id: &str, limit: Option<usize>) -> Result<Vec<ConversationMessage>> {
        let result = self
            .scopes
            .get_current_store()
            .and_then(|store| store.get_messages(agent_id, limit));
        self.track("get_messages", result)
    }

    /// Delete an agent's messages in the current scope; returns how many.
    pub fn clear_messages(&self, agent_id: &str) -> Result<usize> {
        let result = self
            .scopes
            .get_current_store()
            .and_then(|store| store.clear_messages(agent_id));
        let removed = self.track("clear_messages", result)?;
        self.events.emit(MemoryEvent::Cleared {
            agent_id: agent_id.to_string(),
        });
        Ok(removed)
    }

    // ── Search ────────────────────────────────────────────────────────────────

    /// Search one scope: `options.scope` if set, else the current scope.
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        let scope = options.scope.unwrap_or(self.current_scope());
        let result = match self.engine(scope) {
            Ok(engine) => engine.search(query, options).await,
            Err(e) => Err(e),
        };
        self.track("search", result)
    }

    /// Search both scopes and merge under one ordering.
    pub async fn search_all(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        let result = self.search_all_inner(query, options).await;
        self.track("search", result)
    }

    async fn search_all_inner(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        let mut results = Vec::new();
        for scope in Scope::ALL {
            if options.scope.is_some_and(|s| s != scope) {
                continue;
            }
            results.extend(self.engine(scope)?.search(query, options).await?);
        }
        results.sort_by(rank::compare);
        results.truncate(options.limit);
        Ok(results)
    }

    pub fn search_stats(&self, scope: Scope) -> Result<SearchStats> {
        let result = self.engine(scope).map(SearchEngine::get_stats);
        self.track("search_stats", result)
    }

    /// Regenerate every embedding in `scope`.
    pub async fn reindex(&self, scope: Scope, progress: Option<Progress<'_>>) -> Result<BackfillReport> {
        let result = match self.engine(scope) {
            Ok(engine) => engine.reindex(progress).await,
            Err(e) => Err(e),
        };
        self.track("reindex", result)
    }

    pub fn model_key(&self) -> String {
        self.provider.model_key()
    }

    pub fn extract_tags(&self, content: &BlockContent) -> Result<TagResult> {
        Ok(self.tagger.extract_tags(content.block_type(), &content.to_value()?))
    }

    // ── Diagnostics ───────────────────────────────────────────────────────────

    pub fn stats(&self, scope: Scope) -> Result<StoreStats> {
        let result = self.scopes.get_store(scope).and_then(store_stats);
        self.track("stats", result)
    }

    pub fn health(&self, scope: Scope) -> Result<HealthReport> {
        let result = self
            .scopes
            .get_store(scope)
            .and_then(|store| check_database_health(&*store.lock()?));
        self.track("health", result)
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn engine(&self, scope: Scope) -> Result<&SearchEngine> {
        self.engines
            .as_ref()
            .map(|e| e.get(scope))
            .ok_or(Error::NotInitialized)
    }

    fn invalidate(&self, scope: Scope) {
        if let Ok(engine) = self.engine(scope) {
            engine.clear_cache();
        }
    }

    fn decode(&self, block: StoredBlock) -> Option<MemoryBlock> {
        let id = block.id.clone();
        match MemoryBlock::try_from(block) {
            Ok(b) => Some(b),
            Err(e) => {
                tracing::warn!(block_id = %id, error = %e, "skipping undecodable block");
                self.emit_error("decode_block", &e);
                None
            }
        }
    }

    fn emit_error(&self, operation: &str, error: &Error) {
        self.events.emit(MemoryEvent::Error {
            error: error.to_string(),
            operation: operation.to_string(),
        });
    }

    /// Pass `result` through, emitting `memory:error` on failure.
    fn track<T>(&self, operation: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.emit_error(operation, e);
        }
        result
    }
}
