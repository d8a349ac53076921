//! Shared value types passed between the registry, the compositor, the
//! artifact lifecycle manager and the service layer.
//!
//! A [`RenderRequest`] is built fresh for every render from an entity snapshot
//! (or from the preview entry point) and never mutated afterwards. A
//! [`RenderedArtifact`] describes the PNG that one render produced.

use crate::imaging::Color;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Output width of every preview card, in pixels.
pub const CARD_WIDTH: u32 = 1200;
/// Output height of every preview card, in pixels.
pub const CARD_HEIGHT: u32 = 630;

/// Named visual template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateId {
    #[default]
    Default,
    Blog,
    Product,
    Event,
    Service,
    Customer,
}

impl TemplateId {
    pub const ALL: [TemplateId; 6] = [
        TemplateId::Default,
        TemplateId::Blog,
        TemplateId::Product,
        TemplateId::Event,
        TemplateId::Service,
        TemplateId::Customer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TemplateId::Default => "default",
            TemplateId::Blog => "blog",
            TemplateId::Product => "product",
            TemplateId::Event => "event",
            TemplateId::Service => "service",
            TemplateId::Customer => "customer",
        }
    }

    /// Position in [`TemplateId::ALL`].
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TemplateId::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown template '{s}'"))
    }
}

/// Everything the compositor needs to paint one card.
///
/// `excerpt` is already plain text (markup is stripped before the request is
/// built) and `category_color` is already resolved through the explicit
/// field, the category table and the collection accent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderRequest {
    pub title: String,
    pub excerpt: String,
    pub category: String,
    pub category_color: Color,
    pub logo_ref: String,
    pub template_id: TemplateId,
    pub collection_id: String,
    /// Human-readable collection name for the collection badge. Empty means
    /// no badge.
    pub collection_label: String,
    pub entity_id: String,
}

/// A persisted preview image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedArtifact {
    /// Public URL (or path) recorded on the entity.
    pub url: String,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    pub source_entity_id: String,
    pub source_collection_id: String,
    pub created_at: DateTime<Utc>,
}
