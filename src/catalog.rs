//! Catalog of current preview artifacts.
//!
//! Every persisted card is recorded in a JSON catalog next to the cards
//! themselves. The catalog answers two questions cheaply:
//!
//! - which file is the *current* card of an entity, and
//! - which files in the output directory are no longer current (see
//!   [`ArtifactManager::prune`](crate::lifecycle::ArtifactManager::prune)).
//!
//! # Design
//!
//! Entries are keyed by file name. Recording a card for an entity drops any
//! other entry of the same entity, so the catalog holds at most one current
//! card per entity, mirroring the reference stored on the entity itself.
//!
//! Each entry also carries a **fingerprint**: SHA-256 over every input of the
//! render request. A write whose request has the same fingerprint as the
//! entity's current card would paint the same pixels, so the card is reused
//! instead (see
//! [`ArtifactManager::matching_card`](crate::lifecycle::ArtifactManager::matching_card)).
//!
//! ## Storage
//!
//! The catalog is a JSON file at `<output_dir>/.ogcard-catalog.json`. A
//! missing, corrupt or outdated catalog loads as empty; it is rebuilt as
//! cards are written.

use crate::types::RenderRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the catalog file within the output directory.
pub const CATALOG_FILENAME: &str = ".ogcard-catalog.json";

/// Version of the catalog format. Bump this to discard existing catalogs
/// when the format changes.
const CATALOG_VERSION: u32 = 1;

/// One current card.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogEntry {
    pub collection_id: String,
    pub entity_id: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub fingerprint: String,
}

/// On-disk catalog mapping file names to their entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactCatalog {
    pub version: u32,
    pub entries: BTreeMap<String, CatalogEntry>,
}

impl Default for ArtifactCatalog {
    fn default() -> Self {
        Self::empty()
    }
}

impl ArtifactCatalog {
    pub fn empty() -> Self {
        Self {
            version: CATALOG_VERSION,
            entries: BTreeMap::new(),
        }
    }

    /// Load from the output directory. Returns an empty catalog if the
    /// file doesn't exist or can't be parsed (version mismatch, corruption).
    pub fn load(output_dir: &Path) -> Self {
        let path = catalog_path(output_dir);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        let catalog: Self = match serde_json::from_str(&content) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        if catalog.version != CATALOG_VERSION {
            return Self::empty();
        }
        catalog
    }

    /// Save to the output directory, replacing the previous file atomically.
    pub fn save(&self, output_dir: &Path) -> io::Result<()> {
        std::fs::create_dir_all(output_dir)?;
        let path = catalog_path(output_dir);
        let tmp = output_dir.join(format!("{CATALOG_FILENAME}.tmp"));
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)
    }

    /// Record `file_name` as the current card of its entity. Returns the
    /// file names of entries it replaced.
    pub fn record(&mut self, file_name: String, entry: CatalogEntry) -> Vec<String> {
        let replaced: Vec<String> = self
            .entries
            .iter()
            .filter(|(name, e)| {
                **name != file_name
                    && e.collection_id == entry.collection_id
                    && e.entity_id == entry.entity_id
            })
            .map(|(name, _)| name.clone())
            .collect();
        for name in &replaced {
            self.entries.remove(name);
        }
        self.entries.insert(file_name, entry);
        replaced
    }

    pub fn remove(&mut self, file_name: &str) -> Option<CatalogEntry> {
        self.entries.remove(file_name)
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.entries.contains_key(file_name)
    }

    /// Current card of an entity.
    pub fn current_for(&self, collection_id: &str, entity_id: &str) -> Option<(&str, &CatalogEntry)> {
        self.entries
            .iter()
            .find(|(_, e)| e.collection_id == collection_id && e.entity_id == entity_id)
            .map(|(name, e)| (name.as_str(), e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolve the catalog path for an output directory.
pub fn catalog_path(output_dir: &Path) -> PathBuf {
    output_dir.join(CATALOG_FILENAME)
}

/// SHA-256 over every render input, returned as a hex string.
///
/// Fields are length-prefixed so adjacent values cannot run into each other.
pub fn fingerprint_request(request: &RenderRequest) -> String {
    let color = request.category_color.to_hex();
    let mut hasher = Sha256::new();
    hasher.update(b"ogcard-request\0");
    for field in [
        request.title.as_str(),
        request.excerpt.as_str(),
        request.category.as_str(),
        color.as_str(),
        request.logo_ref.as_str(),
        request.template_id.as_str(),
        request.collection_id.as_str(),
        request.collection_label.as_str(),
    ] {
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
