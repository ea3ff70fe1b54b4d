#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use strata::config::SearchConfig;
use strata::embedding::local::LocalEmbeddingProvider;
use strata::memory::scope::{ScopeManager, GLOBAL_DB_FILE, PROJECT_DB_FILE};
use strata::memory::service::MemoryService;
use strata::memory::types::{BlockContent, Persona, ProjectInfo, Scope, TechStack};
use tempfile::TempDir;

/// Layout used by every integration test: `<tmp>/home` for the global scope,
/// `<tmp>/repo/.strata` for the project scope.
pub fn scope_manager(tmp: &TempDir) -> ScopeManager {
    ScopeManager::with_dirs(
        global_dir(tmp),
        tmp.path().join("repo"),
        project_dir(tmp),
        Scope::Project,
    )
}

pub fn global_dir(tmp: &TempDir) -> PathBuf {
    tmp.path().join("home")
}

pub fn project_dir(tmp: &TempDir) -> PathBuf {
    tmp.path().join("repo").join(".strata")
}

pub fn db_path(tmp: &TempDir, scope: Scope) -> PathBuf {
    match scope {
        Scope::Global => global_dir(tmp).join(GLOBAL_DB_FILE),
        Scope::Project => project_dir(tmp).join(PROJECT_DB_FILE),
    }
}

/// An initialized service backed by the local embedding provider.
pub async fn test_service(tmp: &TempDir) -> MemoryService {
    let mut service = MemoryService::with_provider(
        scope_manager(tmp),
        Arc::new(LocalEmbeddingProvider::default()),
        SearchConfig::default(),
    );
    service.initialize().await.unwrap();
    service
}

pub fn persona(name: &str, traits: &[&str]) -> BlockContent {
    BlockContent::Persona(Persona {
        name: name.to_string(),
        traits: traits.iter().map(|t| t.to_string()).collect(),
        communication_style: "direct".to_string(),
        expertise_areas: vec![],
    })
}

pub fn project(name: &str, language: &str, patterns: &[&str]) -> BlockContent {
    BlockContent::Project(ProjectInfo {
        name: name.to_string(),
        description: format!("{name} service"),
        tech_stack: TechStack {
            language: language.to_string(),
            framework: String::new(),
            database: None,
            styling: None,
            testing: None,
            build_tool: None,
        },
        architecture: "layered".to_string(),
        patterns: patterns.iter().map(|p| p.to_string()).collect(),
        key_directories: BTreeMap::new(),
        key_files: None,
    })
}
