//! Renderer configuration module.
//!
//! Handles loading, validating, and merging `ogcard.toml`. Stock defaults
//! are serialized to a TOML value, the user file is merged on top of it key
//! by key, and the result is deserialized and validated. The parsed
//! [`RenderConfig`] is immutable and injected into the template registry, the
//! field resolver, the compositor and the artifact manager.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [output]
//! public_root = "public"                # Directory served at "/"
//! directory = "media/generated-og"      # Artifact directory, relative to public_root
//! url_prefix = "/media/generated-og"    # Prefix of the URL stored on entities
//! catalog = true                        # Keep .ogcard-catalog.json up to date
//!
//! [fonts]
//! bold = "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf"
//! regular = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"
//!
//! [logo]
//! default_ref = "/logo.png"             # Used when an entity has no logoUrl
//! fetch_timeout_ms = 3000               # Remote (http/https) logos only
//!
//! [colors]
//! default_accent = "#1a202c"
//!
//! [colors.categories]
//! haircut = "#2d3748"
//!
//! [processing]
//! max_processes = 4                     # Batch workers (omit for auto = CPU cores)
//!
//! [collections.blog-posts]
//! template = "blog"
//! display_name = "Blog"
//! accent = "#2d3748"                    # Optional
//!
//! [collections.events.fields]           # Optional watched-field chains
//! category = ["eventType", "category"]
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse: override just the values you want:
//!
//! ```toml
//! [collections.gift-cards]
//! display_name = "Gift card"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::Color;
use crate::types::TemplateId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File name looked up by [`load_config`].
pub const CONFIG_FILE_NAME: &str = "ogcard.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Renderer configuration loaded from `ogcard.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// Where artifacts are written and how they are addressed.
    pub output: OutputConfig,
    /// Font files for the glyph typeface.
    pub fonts: FontsConfig,
    /// Logo defaults.
    pub logo: LogoConfig,
    /// Accent and category colors.
    pub colors: ColorsConfig,
    /// Parallel batch rendering.
    pub processing: ProcessingConfig,
    /// Per-collection template, accent, display name and field chains.
    pub collections: BTreeMap<String, CollectionConfig>,
}

impl RenderConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output.directory.trim().is_empty() {
            return Err(ConfigError::Validation(
                "output.directory must not be empty".into(),
            ));
        }
        if Path::new(&self.output.directory).is_absolute()
            || self.output.directory.split('/').any(|part| part == "..")
        {
            return Err(ConfigError::Validation(
                "output.directory must be a relative path inside public_root".into(),
            ));
        }
        if self.fonts.bold.trim().is_empty() || self.fonts.regular.trim().is_empty() {
            return Err(ConfigError::Validation(
                "fonts.bold and fonts.regular must be set".into(),
            ));
        }
        if self.logo.fetch_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "logo.fetch_timeout_ms must be non-zero".into(),
            ));
        }
        for (slug, collection) in &self.collections {
            if slug.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "collection slugs must not be empty".into(),
                ));
            }
            if let Some(fields) = &collection.fields
                && let Some(field) = fields.empty_chain()
            {
                return Err(ConfigError::Validation(format!(
                    "collections.{slug}.fields.{field} must list at least one field"
                )));
            }
        }
        Ok(())
    }
}

/// Artifact output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Directory that is served at the site root.
    pub public_root: String,
    /// Artifact directory, relative to `public_root`.
    pub directory: String,
    /// URL prefix recorded on entities (`{url_prefix}/{file_name}`).
    pub url_prefix: String,
    /// Whether persisted artifacts are recorded in the JSON catalog.
    pub catalog: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            public_root: "public".to_string(),
            directory: "media/generated-og".to_string(),
            url_prefix: "/media/generated-og".to_string(),
            catalog: true,
        }
    }
}

/// TrueType/OpenType font files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FontsConfig {
    pub bold: String,
    pub regular: String,
}

impl Default for FontsConfig {
    fn default() -> Self {
        Self {
            bold: "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf".to_string(),
            regular: "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogoConfig {
    /// Logo used when an entity does not name one. Local refs are resolved
    /// against `output.public_root`.
    pub default_ref: String,
    /// Timeout for fetching `http://` / `https://` logos.
    pub fetch_timeout_ms: u64,
}

impl Default for LogoConfig {
    fn default() -> Self {
        Self {
            default_ref: "/logo.png".to_string(),
            fetch_timeout_ms: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColorsConfig {
    /// Accent used when neither the entity, the category table nor the
    /// collection supplies one.
    pub default_accent: Color,
    /// Category → badge color. Keys are matched case-insensitively, exact
    /// match first, then substring.
    pub categories: BTreeMap<String, Color>,
}

impl Default for ColorsConfig {
    fn default() -> Self {
        let categories = [
            ("barbershop", Color::rgb(0x1a, 0x36, 0x5d)),
            ("haircut", Color::rgb(0x2d, 0x37, 0x48)),
            ("review", Color::rgb(0x38, 0xa1, 0x69)),
            ("sale", Color::rgb(0xd6, 0x9e, 0x2e)),
            ("guide", Color::rgb(0x31, 0x82, 0xce)),
            ("lifestyle", Color::rgb(0x80, 0x5a, 0xd5)),
            ("event", Color::rgb(0xd5, 0x3f, 0x8c)),
            ("service", Color::rgb(0x38, 0xa1, 0x69)),
            ("blog", Color::rgb(0x2d, 0x37, 0x48)),
            ("product", Color::rgb(0x4a, 0x55, 0x68)),
            ("customer", Color::rgb(0x80, 0x5a, 0xd5)),
            ("testimonial", Color::rgb(0xd5, 0x3f, 0x8c)),
        ];
        Self {
            default_accent: Color::rgb(0x1a, 0x20, 0x2c),
            categories: categories
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }
}

/// One content collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollectionConfig {
    pub template: TemplateId,
    /// Accent for entities without an explicit or category color.
    pub accent: Option<Color>,
    /// Collection badge label. Derived from the slug when absent.
    pub display_name: Option<String>,
    /// Watched-field chains. Unset chains use the template's defaults.
    pub fields: Option<FieldsConfig>,
}

impl CollectionConfig {
    fn new(template: TemplateId, display_name: Option<&str>) -> Self {
        Self {
            template,
            display_name: display_name.map(str::to_string),
            ..Self::default()
        }
    }
}

/// Ordered field-name chains: the first present, non-empty field wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldsConfig {
    pub title: Option<Vec<String>>,
    pub excerpt: Option<Vec<String>>,
    /// Long-form body used for an excerpt when no excerpt field is set.
    pub body: Option<Vec<String>>,
    pub category: Option<Vec<String>>,
    pub category_color: Option<Vec<String>>,
    pub logo: Option<Vec<String>>,
}

impl FieldsConfig {
    fn empty_chain(&self) -> Option<&'static str> {
        [
            ("title", &self.title),
            ("excerpt", &self.excerpt),
            ("body", &self.body),
            ("category", &self.category),
            ("category_color", &self.category_color),
            ("logo", &self.logo),
        ]
        .into_iter()
        .find(|(_, chain)| chain.as_ref().is_some_and(|c| c.is_empty()))
        .map(|(name, _)| name)
    }
}

/// Parallel batch rendering settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel render workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Collections known out of the box.
pub fn default_collections() -> BTreeMap<String, CollectionConfig> {
    use TemplateId::*;
    [
        ("blog-posts", Blog, Some("Blog")),
        ("pages", Blog, Some("Page")),
        ("documentation", Blog, Some("Docs")),
        ("business-documentation", Blog, Some("Business")),
        ("products", Product, Some("Product")),
        ("gift-cards", Product, None),
        ("service-packages", Product, None),
        ("services", Service, Some("Service")),
        ("appointments", Service, Some("Booking")),
        ("events", Event, Some("Event")),
        ("promotions", Event, None),
        ("customers", Customer, Some("Customer")),
        ("testimonials", Customer, Some("Review")),
        ("reviews", Customer, None),
    ]
    .into_iter()
    .map(|(slug, template, name)| (slug.to_string(), CollectionConfig::new(template, name)))
    .collect()
}

/// Stock defaults as a full config value.
pub fn stock_defaults() -> RenderConfig {
    RenderConfig {
        collections: default_collections(),
        ..RenderConfig::default()
    }
}

/// Serialize stock defaults to a TOML value for merging.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(stock_defaults())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<RenderConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: RenderConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load `ogcard.toml` from `dir`, falling back to stock defaults when the
/// directory has none.
pub fn load_config(dir: &Path) -> Result<RenderConfig, ConfigError> {
    let path = dir.join(CONFIG_FILE_NAME);
    if !path.exists() {
        return resolve_config(stock_defaults_value()?, None);
    }
    load_config_file(&path)
}

/// Load an explicitly named config file. A missing file is an error.
pub fn load_config_file(path: &Path) -> Result<RenderConfig, ConfigError> {
    let overlay = load_raw_config(path)?;
    resolve_config(stock_defaults_value()?, Some(overlay))
}

/// Returns a fully-commented stock `ogcard.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# ogcard Configuration
# ====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
[output]
# Directory served at the site root. Local logo refs resolve against it.
public_root = "public"
# Where cards are written, relative to public_root.
directory = "media/generated-og"
# Prefix of the URL recorded on the entity: {url_prefix}/{file_name}
url_prefix = "/media/generated-og"
# Record every card in {directory}/.ogcard-catalog.json (used by `prune`).
catalog = true

# ---------------------------------------------------------------------------
# Fonts (TrueType or OpenType)
# ---------------------------------------------------------------------------
[fonts]
bold = "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf"
regular = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"

# ---------------------------------------------------------------------------
# Logo
# ---------------------------------------------------------------------------
[logo]
# Used when the entity has no logoUrl. A missing logo is skipped silently.
default_ref = "/logo.png"
# Timeout for http:// and https:// logos, in milliseconds.
fetch_timeout_ms = 3000

# ---------------------------------------------------------------------------
# Colors
# ---------------------------------------------------------------------------
[colors]
# Fallback accent when nothing more specific applies.
default_accent = "#1a202c"

# Category badge colors. Matched case-insensitively: exact key first, then
# the first key contained in the category.
[colors.categories]
barbershop = "#1a365d"
haircut = "#2d3748"
review = "#38a169"
sale = "#d69e2e"
guide = "#3182ce"
lifestyle = "#805ad5"
event = "#d53f8c"
service = "#38a169"
blog = "#2d3748"
product = "#4a5568"
customer = "#805ad5"
testimonial = "#d53f8c"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for `ogcard batch`. Omit to use all CPU cores.
# Values above the core count are clamped down.
# max_processes = 4

# ---------------------------------------------------------------------------
# Collections
# ---------------------------------------------------------------------------
# template:     default | blog | product | event | service | customer
# display_name: collection badge label (default: slug, capitalized)
# accent:       default accent for this collection's entities
#
# Unlisted collections use the default template.
#
# Watched fields can be overridden per collection. Each key is an ordered
# list of entity fields; the first non-empty one wins:
#
# [collections.events.fields]
# title = ["title", "name"]
# excerpt = ["excerpt", "description"]
# body = ["content"]
# category = ["eventType", "category"]
# category_color = ["categoryColor"]
# logo = ["logoUrl"]

[collections.blog-posts]
template = "blog"
display_name = "Blog"

[collections.pages]
template = "blog"
display_name = "Page"

[collections.documentation]
template = "blog"
display_name = "Docs"

[collections.business-documentation]
template = "blog"
display_name = "Business"

[collections.products]
template = "product"
display_name = "Product"

[collections.gift-cards]
template = "product"

[collections.service-packages]
template = "product"

[collections.services]
template = "service"
display_name = "Service"

[collections.appointments]
template = "service"
display_name = "Booking"

[collections.events]
template = "event"
display_name = "Event"

[collections.promotions]
template = "event"

[collections.customers]
template = "customer"
display_name = "Customer"

[collections.testimonials]
template = "customer"
display_name = "Review"

[collections.reviews]
template = "customer"
"##
}
