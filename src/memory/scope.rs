//! Scope resolution and ownership of the two scope stores.
//!
//! [`ScopeManager`] locates the global and project directories, opens one
//! [`ScopeStore`] per scope on [`initialize`](ScopeManager::initialize), and
//! tracks which scope is "current". Scope selection is in-memory only.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::StrataConfig;
use crate::error::{Error, Result};
use crate::memory::store::ScopeStore;
use crate::memory::types::Scope;

/// Files or directories whose presence marks a project root, checked in order.
pub const ROOT_MARKERS: &[&str] = &[
    ".git",
    "package.json",
    ".strata",
    ".hg",
    "Cargo.toml",
    "pyproject.toml",
    "go.mod",
    "pom.xml",
    "build.gradle",
    "composer.json",
    "Gemfile",
];

pub const GLOBAL_DB_FILE: &str = "global.db";
pub const PROJECT_DB_FILE: &str = "project.db";

/// Walk upward from `start_dir` and return the first directory containing any
/// of [`ROOT_MARKERS`], or `None` once the filesystem root is passed.
///
/// Directories are canonicalized and tracked, so symlink cycles terminate.
pub fn detect_project_root(start_dir: &Path) -> Option<PathBuf> {
    let mut visited = HashSet::new();
    let mut current = Some(canonical_or_self(start_dir));

    while let Some(dir) = current {
        if !visited.insert(dir.clone()) {
            tracing::debug!(dir = %dir.display(), "directory already visited, stopping root search");
            return None;
        }
        if let Some(marker) = ROOT_MARKERS.iter().find(|m| dir.join(m).exists()) {
            tracing::debug!(root = %dir.display(), marker = *marker, "project root detected");
            return Some(dir);
        }
        current = dir.parent().map(canonical_or_self);
    }

    None
}

fn canonical_or_self(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

struct OpenStores {
    global: ScopeStore,
    project: ScopeStore,
}

pub struct ScopeManager {
    global_dir: PathBuf,
    project_root: PathBuf,
    project_dir: PathBuf,
    current: Scope,
    stores: Option<OpenStores>,
}

impl ScopeManager {
    /// Resolve scope locations. The project root is detected from `start_dir`;
    /// when no marker is found, `start_dir` itself is used.
    pub fn new(config: &StrataConfig, start_dir: &Path) -> Self {
        let project_root = detect_project_root(start_dir).unwrap_or_else(|| {
            tracing::debug!(dir = %start_dir.display(), "no project root marker found, using start directory");
            start_dir.to_path_buf()
        });
        Self::with_dirs(
            config.resolved_global_dir(),
            project_root.clone(),
            project_root.join(&config.storage.project_dir_name),
            config.storage.default_scope,
        )
    }

    /// Build a manager over explicit directories.
    pub fn with_dirs(
        global_dir: PathBuf,
        project_root: PathBuf,
        project_dir: PathBuf,
        current: Scope,
    ) -> Self {
        Self {
            global_dir,
            project_root,
            project_dir,
            current,
            stores: None,
        }
    }

    /// Create both scope directories and open their stores. Idempotent.
    pub fn initialize(&mut self) -> Result<()> {
        if self.stores.is_some() {
            return Ok(());
        }

        std::fs::create_dir_all(&self.global_dir)?;
        std::fs::create_dir_all(&self.project_dir)?;

        let global = ScopeStore::open(Scope::Global, self.global_dir.join(GLOBAL_DB_FILE))?;
        let project = ScopeStore::open(Scope::Project, self.project_dir.join(PROJECT_DB_FILE))?;

        tracing::info!(
            global = %self.global_dir.display(),
            project = %self.project_dir.display(),
            current = %self.current,
            "memory scopes initialized"
        );
        self.stores = Some(OpenStores { global, project });
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.stores.is_some()
    }

    pub fn get_current_store(&self) -> Result<&ScopeStore> {
        self.get_store(self.current)
    }

    pub fn get_project_store(&self) -> Result<&ScopeStore> {
        self.get_store(Scope::Project)
    }

    pub fn get_global_store(&self) -> Result<&ScopeStore> {
        self.get_store(Scope::Global)
    }

    pub fn get_store(&self, scope: Scope) -> Result<&ScopeStore> {
        let stores = self.stores.as_ref().ok_or(Error::NotInitialized)?;
        Ok(match scope {
            Scope::Global => &stores.global,
            Scope::Project => &stores.project,
        })
    }

    /// Switch the current scope. Returns the previous one.
    pub fn set_scope(&mut self, scope: Scope) -> Scope {
        std::mem::replace(&mut self.current, scope)
    }

    pub fn get_current_scope(&self) -> Scope {
        self.current
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn scope_dir(&self, scope: Scope) -> &Path {
        match scope {
            Scope::Global => &self.global_dir,
            Scope::Project => &self.project_dir,
        }
    }

    /// Close both stores. Accessors fail with `NotInitialized` afterwards.
    pub fn close(&mut self) -> Result<()> {
        if let Some(stores) = self.stores.take() {
            let global = stores.global.close();
            let project = stores.project.close();
            global?;
            project?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager_in(tmp: &TempDir) -> ScopeManager {
        ScopeManager::with_dirs(
            tmp.path().join("home/.strata"),
            tmp.path().join("repo"),
            tmp.path().join("repo/.strata"),
            Scope::Project,
        )
    }

    #[test]
    fn detects_root_from_nested_directory() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("repo");
        let nested = root.join("src/deeply/nested");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();

        let found = detect_project_root(&nested).unwrap();
        assert_eq!(found, std::fs::canonicalize(&root).unwrap());
    }

    #[test]
    fn detects_package_manifest() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("web");
        std::fs::create_dir_all(root.join("lib")).unwrap();
        std::fs::write(root.join("package.json"), "{}").unwrap();

        let found = detect_project_root(&root.join("lib")).unwrap();
        assert_eq!(found, std::fs::canonicalize(&root).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_cycle_terminates() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("a");
        std::fs::create_dir_all(&dir).unwrap();
        std::os::unix::fs::symlink(&dir, dir.join("loop")).unwrap();

        // Whatever is found above the temp dir, the walk must return.
        let _ = detect_project_root(&dir.join("loop/loop/loop"));
    }

    #[test]
    fn accessors_fail_before_initialize() {
        let tmp = TempDir::new().unwrap();
        let manager = manager_in(&tmp);
        assert!(matches!(manager.get_current_store(), Err(Error::NotInitialized)));
        assert!(matches!(manager.get_global_store(), Err(Error::NotInitialized)));
    }

    #[test]
    fn initialize_creates_dirs_and_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let mut manager = manager_in(&tmp);
        manager.initialize().unwrap();
        manager.initialize().unwrap();

        assert!(tmp.path().join("home/.strata/global.db").exists());
        assert!(tmp.path().join("repo/.strata/project.db").exists());
        assert_eq!(manager.get_current_store().unwrap().scope(), Scope::Project);
        assert_eq!(manager.get_global_store().unwrap().scope(), Scope::Global);
    }

    #[test]
    fn set_scope_switches_current_store() {
        let tmp = TempDir::new().unwrap();
        let mut manager = manager_in(&tmp);
        manager.initialize().unwrap();

        assert_eq!(manager.set_scope(Scope::Global), Scope::Project);
        assert_eq!(manager.get_current_scope(), Scope::Global);
        assert_eq!(manager.get_current_store().unwrap().scope(), Scope::Global);
    }

    #[test]
    fn close_makes_accessors_fail_again() {
        let tmp = TempDir::new().unwrap();
        let mut manager = manager_in(&tmp);
        manager.initialize().unwrap();
        manager.close().unwrap();

        assert!(!manager.is_initialized());
        assert!(matches!(manager.get_project_store(), Err(Error::NotInitialized)));
    }
}
