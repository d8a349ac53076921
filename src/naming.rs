//! Deterministic artifact names and collection labels.
//!
//! Artifact files are named from the entity they belong to:
//!
//! ```text
//! {collection}-{entity}-{YYYY-MM-DD}-{title-slug}.png
//! blog-posts-42-2026-03-01-summer-fades-are-back.png
//! ```
//!
//! Different entities never collide on the same day. Two renders of the same
//! entity with the same title on the same day produce the same name, and the
//! later write wins.
//!
//! Ids made only of ASCII letters, digits, `_` and `-` are used as they are.
//! Anything else is sanitized and suffixed with `~` and the first
//! [`ID_HASH_LEN`] hex digits of the SHA-256 of the raw id, so `a/b` and
//! `a-b` stay apart:
//!
//! ```text
//! pages-a-b-2026-03-01-same.png
//! pages-a-b~<12 hex digits>-2026-03-01-same.png
//! ```
//!
//! ## Display Names
//!
//! Collections without a configured label are shown with the first letter
//! capitalized and dashes converted to spaces:
//! - `gift-cards` → "Gift cards"
//! - `blog-posts` → "Blog posts"

use chrono::NaiveDate;
use sha2::{Digest, Sha256};

/// Longest title slug kept in a file name, in characters.
pub const MAX_SLUG_LEN: usize = 50;

/// Hex digits of the id hash appended to sanitized ids.
pub const ID_HASH_LEN: usize = 12;

/// Everything an artifact name is derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct NamingContext {
    pub collection_id: String,
    pub entity_id: String,
    pub title: String,
    pub date: NaiveDate,
}

impl NamingContext {
    pub fn file_name(&self) -> String {
        artifact_file_name(&self.collection_id, &self.entity_id, self.date, &self.title)
    }
}

/// Lowercase, punctuation stripped, whitespace runs turned into single
/// dashes, capped at [`MAX_SLUG_LEN`] characters.
///
/// - `"Summer Fades Are Back!"` → `"summer-fades-are-back"`
/// - `"Beard Oil & Balm"` → `"beard-oil-balm"`
pub fn slugify(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect();
    let joined = cleaned.split_whitespace().collect::<Vec<_>>().join("-");
    let capped: String = joined.chars().take(MAX_SLUG_LEN).collect();
    capped.trim_matches('-').to_string()
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Make an identifier safe to embed in a file name. Injective: `~` never
/// survives sanitizing, so only rewritten ids carry the hash suffix.
fn path_component(id: &str) -> String {
    if !id.is_empty() && id.chars().all(is_name_char) {
        return id.to_string();
    }
    let safe: String = id
        .chars()
        .map(|c| if is_name_char(c) { c } else { '-' })
        .collect();
    let digest = format!("{:x}", Sha256::digest(id.as_bytes()));
    format!("{safe}~{}", &digest[..ID_HASH_LEN])
}

/// `{collection}-{entity}-{date}-{slug}.png`; the slug part is omitted when
/// the title slugifies to nothing.
pub fn artifact_file_name(
    collection_id: &str,
    entity_id: &str,
    date: NaiveDate,
    title: &str,
) -> String {
    let slug = slugify(title);
    let base = format!(
        "{}-{}-{}",
        path_component(collection_id),
        path_component(entity_id),
        date.format("%Y-%m-%d")
    );
    if slug.is_empty() {
        format!("{base}.png")
    } else {
        format!("{base}-{slug}.png")
    }
}

/// Human-readable label derived from a collection slug.
pub fn display_name(slug: &str) -> String {
    let mut chars = slug.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>().replace('-', " "),
        None => String::new(),
    }
}
