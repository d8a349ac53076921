//! Artifact lifecycle: persist new cards, retire superseded ones.
//!
//! ```text
//! render bytes ──persist──▶ store.write(file) ──▶ RenderedArtifact { url, .. }
//!                               │
//!                               └──▶ catalog.record(file)
//!
//! old ref ──cleanup──▶ store.delete(file) + catalog.remove(file)   (best effort)
//! ```
//!
//! `persist` failures are returned to the caller. `cleanup` never fails: a
//! missing file is fine and any other error is logged and swallowed, so a
//! stale file can never undo a successful regeneration. Leftovers are found
//! later by [`ArtifactManager::prune`].

use crate::catalog::{ArtifactCatalog, CatalogEntry};
use crate::config::OutputConfig;
use crate::naming::NamingContext;
use crate::types::{CARD_HEIGHT, CARD_WIDTH, RenderedArtifact};
use chrono::{DateTime, Utc};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid artifact name: {0}")]
    InvalidName(String),
    #[error("Prune needs the catalog; enable output.catalog")]
    CatalogDisabled,
}

/// Durable storage for card files.
pub trait ArtifactStore: Send + Sync {
    /// Write `bytes` under `file_name` (overwriting) and return its public URL.
    fn write(&self, file_name: &str, bytes: &[u8]) -> Result<String, StoreError>;

    /// Delete the artifact a URL or path refers to. Returns `false` when it
    /// did not exist.
    fn delete(&self, reference: &str) -> Result<bool, StoreError>;

    /// Local directory holding the files, if the store has one.
    fn directory(&self) -> Option<&Path> {
        None
    }
}

impl<S: ArtifactStore + ?Sized> ArtifactStore for Arc<S> {
    fn write(&self, file_name: &str, bytes: &[u8]) -> Result<String, StoreError> {
        (**self).write(file_name, bytes)
    }

    fn delete(&self, reference: &str) -> Result<bool, StoreError> {
        (**self).delete(reference)
    }

    fn directory(&self) -> Option<&Path> {
        (**self).directory()
    }
}

/// Final path component of a URL or path, if it is a plain file name.
pub fn reference_file_name(reference: &str) -> Option<&str> {
    let name = reference
        .trim()
        .split(['?', '#'])
        .next()?
        .rsplit('/')
        .next()?;
    (!name.is_empty() && name != "." && name != "..").then_some(name)
}

/// Cards on the local filesystem under `public_root/directory`, addressed
/// as `url_prefix/file_name`.
#[derive(Debug, Clone)]
pub struct FsStore {
    dir: PathBuf,
    url_prefix: String,
}

impl FsStore {
    pub fn new(dir: impl Into<PathBuf>, url_prefix: &str) -> Self {
        Self {
            dir: dir.into(),
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(output: &OutputConfig) -> Self {
        Self::new(
            Path::new(&output.public_root).join(&output.directory),
            &output.url_prefix,
        )
    }

    fn path_for(&self, file_name: &str) -> Result<PathBuf, StoreError> {
        match reference_file_name(file_name) {
            Some(name) if name == file_name => Ok(self.dir.join(name)),
            _ => Err(StoreError::InvalidName(file_name.to_string())),
        }
    }
}

impl ArtifactStore for FsStore {
    fn write(&self, file_name: &str, bytes: &[u8]) -> Result<String, StoreError> {
        let path = self.path_for(file_name)?;
        std::fs::create_dir_all(&self.dir)?;
        // Write next to the target and rename, so readers never see a
        // partial file.
        let tmp = self.dir.join(format!(".{file_name}.tmp"));
        std::fs::write(&tmp, bytes)?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(format!("{}/{}", self.url_prefix, file_name))
    }

    fn delete(&self, reference: &str) -> Result<bool, StoreError> {
        let Some(name) = reference_file_name(reference) else {
            return Ok(false);
        };
        match std::fs::remove_file(self.dir.join(name)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn directory(&self) -> Option<&Path> {
        Some(&self.dir)
    }
}

/// Result of [`ArtifactManager::prune`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PruneReport {
    pub kept: usize,
    pub removed: Vec<String>,
    pub failed: Vec<String>,
}

/// Persists cards and retires superseded ones.
pub struct ArtifactManager {
    store: Box<dyn ArtifactStore>,
    catalog: Option<Mutex<ArtifactCatalog>>,
}

impl ArtifactManager {
    /// `with_catalog` loads the catalog from the store's directory. Stores
    /// without a directory never keep a catalog.
    pub fn new(store: Box<dyn ArtifactStore>, with_catalog: bool) -> Self {
        let catalog = match (with_catalog, store.directory()) {
            (true, Some(dir)) => Some(Mutex::new(ArtifactCatalog::load(dir))),
            _ => None,
        };
        Self { store, catalog }
    }

    pub fn from_config(output: &OutputConfig) -> Self {
        Self::new(Box::new(FsStore::from_config(output)), output.catalog)
    }

    fn lock_catalog(&self) -> Option<MutexGuard<'_, ArtifactCatalog>> {
        self.catalog
            .as_ref()
            .map(|m| m.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    fn save_catalog(&self, catalog: &ArtifactCatalog) {
        if let Some(dir) = self.store.directory()
            && let Err(e) = catalog.save(dir)
        {
            warn!(error = %e, "Failed to save artifact catalog");
        }
    }

    /// Snapshot of the catalog, if one is kept.
    pub fn catalog(&self) -> Option<ArtifactCatalog> {
        self.lock_catalog().map(|c| c.clone())
    }

    /// URL of an entity's current card according to the catalog.
    pub fn current_url(&self, collection_id: &str, entity_id: &str) -> Option<String> {
        self.lock_catalog()?
            .current_for(collection_id, entity_id)
            .map(|(_, entry)| entry.url.clone())
    }

    /// URL of the entity's current card when it was rendered from a request
    /// with this fingerprint and its file is still there.
    pub fn matching_card(&self, collection_id: &str, entity_id: &str, fingerprint: &str) -> Option<String> {
        let catalog = self.lock_catalog()?;
        let (name, entry) = catalog.current_for(collection_id, entity_id)?;
        let dir = self.store.directory()?;
        (entry.fingerprint == fingerprint && dir.join(name).is_file()).then(|| entry.url.clone())
    }

    /// Write a card and record it as the entity's current one.
    pub fn persist(
        &self,
        bytes: &[u8],
        naming: &NamingContext,
        fingerprint: &str,
        created_at: DateTime<Utc>,
    ) -> Result<RenderedArtifact, StoreError> {
        let file_name = naming.file_name();
        // The catalog lock spans the write so the catalog's view of the
        // current card matches the last completed write.
        let mut catalog = self.lock_catalog();
        let url = self.store.write(&file_name, bytes)?;
        info!(
            collection = %naming.collection_id,
            entity = %naming.entity_id,
            file = %file_name,
            "Persisted preview card"
        );

        if let Some(catalog) = catalog.as_deref_mut() {
            let replaced = catalog.record(
                file_name.clone(),
                CatalogEntry {
                    collection_id: naming.collection_id.clone(),
                    entity_id: naming.entity_id.clone(),
                    url: url.clone(),
                    created_at,
                    fingerprint: fingerprint.to_string(),
                },
            );
            if !replaced.is_empty() {
                debug!(entity = %naming.entity_id, ?replaced, "Catalog entries superseded");
            }
            self.save_catalog(catalog);
        }

        Ok(RenderedArtifact {
            url,
            file_name,
            width: CARD_WIDTH,
            height: CARD_HEIGHT,
            source_entity_id: naming.entity_id.clone(),
            source_collection_id: naming.collection_id.clone(),
            created_at,
        })
    }

    /// Best-effort removal of an artifact and its catalog entry.
    pub fn cleanup(&self, reference: &str) {
        match self.store.delete(reference) {
            Ok(true) => info!(file = reference, "Removed superseded preview card"),
            Ok(false) => debug!(file = reference, "Superseded preview card already gone"),
            Err(e) => warn!(file = reference, error = %e, "Failed to remove preview card"),
        }
        if let Some(name) = reference_file_name(reference)
            && let Some(mut catalog) = self.lock_catalog()
            && catalog.remove(name).is_some()
        {
            self.save_catalog(&catalog);
        }
    }

    /// Retire `previous` after `current` was written, unless both name the
    /// same file (a same-day re-render overwrote it in place).
    pub fn supersede(&self, previous: &str, current: &RenderedArtifact) {
        if reference_file_name(previous) == Some(current.file_name.as_str()) {
            debug!(file = %current.file_name, "Previous card overwritten in place");
            return;
        }
        self.cleanup(previous);
    }

    /// Delete `.png` files in the output directory that are not a current
    /// card in the catalog, plus leftover temp files.
    pub fn prune(&self) -> Result<PruneReport, StoreError> {
        let Some(catalog) = self.catalog() else {
            return Err(StoreError::CatalogDisabled);
        };
        let Some(dir) = self.store.directory() else {
            return Err(StoreError::CatalogDisabled);
        };
        let mut report = PruneReport::default();
        if !dir.exists() {
            return Ok(report);
        }

        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| StoreError::Io(io::Error::other(e)))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_card = name.ends_with(".png") && !name.starts_with('.');
            let is_leftover_tmp = name.starts_with('.') && name.ends_with(".png.tmp");
            if is_card && catalog.contains(&name) {
                report.kept += 1;
                continue;
            }
            if !is_card && !is_leftover_tmp {
                continue;
            }
            match std::fs::remove_file(entry.path()) {
                Ok(()) => {
                    info!(file = %name, "Pruned stale preview card");
                    report.removed.push(name);
                }
                Err(e) => {
                    warn!(file = %name, error = %e, "Failed to prune file");
                    report.failed.push(name);
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FailingStore, MemoryStore};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn naming(entity: &str, title: &str, day: u32) -> NamingContext {
        NamingContext {
            collection_id: "blog-posts".into(),
            entity_id: entity.into(),
            title: title.into(),
            date: NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn fs_manager(tmp: &TempDir) -> ArtifactManager {
        let store = FsStore::new(tmp.path().join("og"), "/media/generated-og/");
        ArtifactManager::new(Box::new(store), true)
    }

    // =========================================================================
    // reference_file_name
    // =========================================================================

    #[test]
    fn reference_file_name_variants() {
        assert_eq!(reference_file_name("/media/og/a.png"), Some("a.png"));
        assert_eq!(
            reference_file_name("https://cdn.example.com/og/a.png?v=2"),
            Some("a.png")
        );
        assert_eq!(reference_file_name("a.png"), Some("a.png"));
        assert_eq!(reference_file_name("/media/og/"), None);
        assert_eq!(reference_file_name(".."), None);
        assert_eq!(reference_file_name(""), None);
    }

    // =========================================================================
    // FsStore
    // =========================================================================

    #[test]
    fn fs_store_writes_and_returns_url() {
        let tmp = TempDir::new().unwrap();
        let store = FsStore::new(tmp.path(), "/media/generated-og/");
        let url = store.write("a.png", b"png").unwrap();
        assert_eq!(url, "/media/generated-og/a.png");
        assert_eq!(std::fs::read(tmp.path().join("a.png")).unwrap(), b"png");
        assert!(!tmp.path().join(".a.png.tmp").exists());
    }

    #[test]
    fn fs_store_rejects_paths() {
        let tmp = TempDir::new().unwrap();
        let store = FsStore::new(tmp.path(), "/og");
        assert!(matches!(
            store.write("../a.png", b"x"),
            Err(StoreError::InvalidName(_))
        ));
        assert!(store.write("sub/a.png", b"x").is_err());
    }

    #[test]
    fn fs_store_delete_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = FsStore::new(tmp.path(), "/og");
        store.write("a.png", b"x").unwrap();
        assert!(store.delete("/og/a.png").unwrap());
        assert!(!store.delete("/og/a.png").unwrap());
        assert!(!store.delete("/og/").unwrap());
    }

    #[test]
    fn fs_store_from_config_joins_public_root() {
        let output = OutputConfig {
            public_root: "site".into(),
            ..OutputConfig::default()
        };
        let store = FsStore::from_config(&output);
        assert_eq!(
            store.directory(),
            Some(Path::new("site/media/generated-og"))
        );
    }

    // =========================================================================
    // ArtifactManager
    // =========================================================================

    #[test]
    fn persist_writes_and_records() {
        let tmp = TempDir::new().unwrap();
        let manager = fs_manager(&tmp);
        let artifact = manager
            .persist(b"png", &naming("42", "Summer Fades", 1), "fp", now())
            .unwrap();

        assert_eq!(
            artifact.url,
            "/media/generated-og/blog-posts-42-2026-03-01-summer-fades.png"
        );
        assert_eq!((artifact.width, artifact.height), (1200, 630));
        assert_eq!(artifact.source_entity_id, "42");
        assert!(tmp.path().join("og").join(&artifact.file_name).exists());

        let on_disk = ArtifactCatalog::load(&tmp.path().join("og"));
        let (name, entry) = on_disk.current_for("blog-posts", "42").unwrap();
        assert_eq!(name, artifact.file_name);
        assert_eq!(entry.fingerprint, "fp");
    }

    #[test]
    fn persist_failure_is_returned() {
        let manager = ArtifactManager::new(Box::new(FailingStore), true);
        let result = manager.persist(b"png", &naming("1", "x", 1), "fp", now());
        assert!(result.is_err());
    }

    #[test]
    fn cleanup_swallows_store_errors() {
        let manager = ArtifactManager::new(Box::new(FailingStore), true);
        manager.cleanup("/media/generated-og/old.png");
    }

    #[test]
    fn cleanup_removes_file_and_entry() {
        let tmp = TempDir::new().unwrap();
        let manager = fs_manager(&tmp);
        let artifact = manager
            .persist(b"png", &naming("42", "Summer Fades", 1), "fp", now())
            .unwrap();
        manager.cleanup(&artifact.url);
        assert!(!tmp.path().join("og").join(&artifact.file_name).exists());
        assert!(manager.catalog().unwrap().is_empty());
        // Missing target is not an error
        manager.cleanup(&artifact.url);
    }

    #[test]
    fn supersede_skips_same_file() {
        let tmp = TempDir::new().unwrap();
        let manager = fs_manager(&tmp);
        let first = manager
            .persist(b"v1", &naming("42", "Summer Fades", 1), "a", now())
            .unwrap();
        let second = manager
            .persist(b"v2", &naming("42", "Summer Fades", 1), "b", now())
            .unwrap();
        manager.supersede(&first.url, &second);
        let path = tmp.path().join("og").join(&second.file_name);
        assert_eq!(std::fs::read(path).unwrap(), b"v2");
        assert!(manager.catalog().unwrap().contains(&second.file_name));
    }

    #[test]
    fn supersede_removes_older_card() {
        let tmp = TempDir::new().unwrap();
        let manager = fs_manager(&tmp);
        let first = manager
            .persist(b"v1", &naming("42", "Summer Fades", 1), "a", now())
            .unwrap();
        let second = manager
            .persist(b"v2", &naming("42", "Summer Fades", 2), "b", now())
            .unwrap();
        manager.supersede(&first.url, &second);
        assert!(!tmp.path().join("og").join(&first.file_name).exists());
        assert!(tmp.path().join("og").join(&second.file_name).exists());
        let catalog = manager.catalog().unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.contains(&second.file_name));
    }

    #[test]
    fn matching_card_requires_fingerprint_and_file() {
        let tmp = TempDir::new().unwrap();
        let manager = fs_manager(&tmp);
        let artifact = manager
            .persist(b"png", &naming("42", "Summer Fades", 1), "fp", now())
            .unwrap();
        assert_eq!(
            manager.matching_card("blog-posts", "42", "fp"),
            Some(artifact.url.clone())
        );
        assert_eq!(manager.matching_card("blog-posts", "42", "other"), None);
        assert_eq!(manager.matching_card("blog-posts", "7", "fp"), None);

        std::fs::remove_file(tmp.path().join("og").join(&artifact.file_name)).unwrap();
        assert_eq!(manager.matching_card("blog-posts", "42", "fp"), None);
    }

    /// Delegates to an [`FsStore`], logging file names in write order.
    struct RecordingStore {
        inner: FsStore,
        writes: Mutex<Vec<String>>,
    }

    impl ArtifactStore for RecordingStore {
        fn write(&self, file_name: &str, bytes: &[u8]) -> Result<String, StoreError> {
            let url = self.inner.write(file_name, bytes)?;
            self.writes.lock().unwrap().push(file_name.to_string());
            Ok(url)
        }

        fn delete(&self, reference: &str) -> Result<bool, StoreError> {
            self.inner.delete(reference)
        }

        fn directory(&self) -> Option<&Path> {
            self.inner.directory()
        }
    }

    #[test]
    fn racing_writes_leave_catalog_on_last_write() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("og");
        let store = Arc::new(RecordingStore {
            inner: FsStore::new(&dir, "/og"),
            writes: Mutex::new(Vec::new()),
        });
        let manager = ArtifactManager::new(Box::new(store.clone()), true);

        for round in 0..20 {
            let barrier = std::sync::Barrier::new(2);
            std::thread::scope(|s| {
                for title in ["First Title", "Second Title"] {
                    let (manager, barrier) = (&manager, &barrier);
                    s.spawn(move || {
                        barrier.wait();
                        manager
                            .persist(title.as_bytes(), &naming("42", title, 1), title, now())
                            .unwrap();
                    });
                }
            });

            let last = store.writes.lock().unwrap().last().cloned().unwrap();
            let catalog = manager.catalog().unwrap();
            let (current, entry) = catalog.current_for("blog-posts", "42").unwrap();
            assert_eq!(current, last, "round {round}");
            assert_eq!(catalog.len(), 1);
            assert!(dir.join(current).is_file());
            assert_eq!(
                std::fs::read(dir.join(current)).unwrap(),
                entry.fingerprint.as_bytes()
            );
            assert_eq!(ArtifactCatalog::load(&dir), catalog);
        }
    }

    #[test]
    fn memory_store_manager_keeps_no_catalog() {
        let store = MemoryStore::new();
        let manager = ArtifactManager::new(Box::new(store), true);
        assert!(manager.catalog().is_none());
        assert!(matches!(manager.prune(), Err(StoreError::CatalogDisabled)));
    }

    #[test]
    fn prune_removes_files_not_in_catalog() {
        let tmp = TempDir::new().unwrap();
        let manager = fs_manager(&tmp);
        let current = manager
            .persist(b"png", &naming("42", "Summer Fades", 2), "fp", now())
            .unwrap();
        let dir = tmp.path().join("og");
        std::fs::write(dir.join("blog-posts-42-2026-03-01-summer-fades.png"), b"old").unwrap();
        std::fs::write(dir.join(".half-written.png.tmp"), b"x").unwrap();
        std::fs::write(dir.join("notes.txt"), b"keep me").unwrap();

        let report = manager.prune().unwrap();
        assert_eq!(report.kept, 1);
        assert_eq!(report.removed.len(), 2);
        assert!(report.failed.is_empty());
        assert!(dir.join(&current.file_name).exists());
        assert!(dir.join("notes.txt").exists());
        assert!(dir.join(crate::catalog::CATALOG_FILENAME).exists());
    }

    #[test]
    fn prune_without_catalog_is_refused() {
        let tmp = TempDir::new().unwrap();
        let store = FsStore::new(tmp.path(), "/og");
        let manager = ArtifactManager::new(Box::new(store), false);
        assert!(matches!(manager.prune(), Err(StoreError::CatalogDisabled)));
    }

    #[test]
    fn prune_of_missing_directory_is_empty() {
        let tmp = TempDir::new().unwrap();
        let manager = fs_manager(&tmp);
        assert_eq!(manager.prune().unwrap(), PruneReport::default());
    }
}
