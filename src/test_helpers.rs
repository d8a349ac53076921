//! Shared test utilities for the ogcard test suite.
//!
//! Provides deterministic stand-ins for the pieces that normally touch fonts,
//! the network or the filesystem, plus builders for requests and entity
//! snapshots.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let compositor = Compositor::new(Box::new(BlockTypeface), Box::new(StaticLogo::red()));
//! let req = request("Summer Fades", "blog-posts");
//! let canvas = compositor.compose(&req, registry().resolve_template("blog-posts"));
//!
//! let store = MemoryStore::new();
//! let snapshot = entity(json!({"id": "42", "title": "Summer Fades"}));
//! ```

use crate::config::stock_defaults;
use crate::imaging::{Canvas, Color, Rect, Typeface};
use crate::imaging::LogoSource;
use crate::lifecycle::{ArtifactStore, StoreError, reference_file_name};
use crate::policy::EntitySnapshot;
use crate::registry::TemplateRegistry;
use crate::types::RenderRequest;
use crate::typography::{FontSpec, TextMeasure};
use image::{Rgba, RgbaImage};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

// =========================================================================
// Rendering stand-ins
// =========================================================================

/// Every character advances half the font size; non-space characters are
/// drawn as solid blocks one em tall. Exact in `f32` for even sizes.
pub struct BlockTypeface;

impl TextMeasure for BlockTypeface {
    fn measure_width(&self, text: &str, font: FontSpec) -> f32 {
        text.chars().count() as f32 * font.size as f32 * 0.5
    }
}

impl Typeface for BlockTypeface {
    fn draw_text(&self, canvas: &mut Canvas, text: &str, font: FontSpec, x: f32, y: f32, color: Color) {
        let advance = font.size as f32 * 0.5;
        for (i, c) in text.chars().enumerate() {
            if c.is_whitespace() {
                continue;
            }
            let rect = Rect::new(x + i as f32 * advance, y, advance, font.size as f32);
            canvas.fill_rect(rect, color);
        }
    }
}

/// Logo source returning a fixed image (or nothing).
pub struct StaticLogo(Option<RgbaImage>);

impl StaticLogo {
    pub fn none() -> Self {
        Self(None)
    }

    /// 10×10 opaque red square.
    pub fn red() -> Self {
        Self(Some(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255]))))
    }
}

impl LogoSource for StaticLogo {
    fn load(&self, _logo_ref: &str) -> Option<RgbaImage> {
        self.0.clone()
    }
}

// =========================================================================
// Stores
// =========================================================================

/// In-memory store addressed under `/media/generated-og`. Clones share the
/// same contents.
#[derive(Clone, Default)]
pub struct MemoryStore {
    files: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, file_name: &str, bytes: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(file_name.to_string(), bytes.to_vec());
    }

    pub fn get(&self, file_name: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(file_name).cloned()
    }

    /// Stored file names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.files.lock().unwrap().keys().cloned().collect()
    }
}

impl ArtifactStore for MemoryStore {
    fn write(&self, file_name: &str, bytes: &[u8]) -> Result<String, StoreError> {
        self.insert(file_name, bytes);
        Ok(format!("/media/generated-og/{file_name}"))
    }

    fn delete(&self, reference: &str) -> Result<bool, StoreError> {
        Ok(reference_file_name(reference)
            .and_then(|name| self.files.lock().unwrap().remove(name))
            .is_some())
    }
}

/// Store whose every operation fails.
pub struct FailingStore;

impl ArtifactStore for FailingStore {
    fn write(&self, _file_name: &str, _bytes: &[u8]) -> Result<String, StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk full")))
    }

    fn delete(&self, _reference: &str) -> Result<bool, StoreError> {
        Err(StoreError::Io(std::io::Error::other("permission denied")))
    }
}

// =========================================================================
// Builders
// =========================================================================

/// Registry built from the stock config.
pub fn registry() -> TemplateRegistry {
    TemplateRegistry::new(&stock_defaults())
}

/// Request for entity `42` of `collection` with no excerpt or category.
pub fn request(title: &str, collection: &str) -> RenderRequest {
    let registry = registry();
    RenderRequest {
        title: title.to_string(),
        excerpt: String::new(),
        category: String::new(),
        category_color: registry.accent_for(collection),
        logo_ref: "/logo.png".to_string(),
        template_id: registry.template_id_for(collection),
        collection_id: collection.to_string(),
        collection_label: registry.display_name(collection),
        entity_id: "42".to_string(),
    }
}

/// Snapshot from a JSON object literal. Panics on anything else.
pub fn entity(value: serde_json::Value) -> EntitySnapshot {
    EntitySnapshot::from_value(value).expect("entity fixture must be a JSON object")
}
