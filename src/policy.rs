//! Regeneration decision policy.
//!
//! Every entity write is checked against the previous snapshot of the same
//! entity. A new card is only rendered when it would look different or when
//! there is none yet:
//!
//! | Current | Previous | Watched fields | Result |
//! |---|---|---|---|
//! | draft | any | any | skip |
//! | no title or no `id` | any | any | skip |
//! | published | draft | any | regenerate (publish transition) |
//! | published | none, or no artifact | any | regenerate (no prior artifact) |
//! | published | published | some differ | regenerate (field changed) |
//! | published | published | identical | skip |
//!
//! A published entity that goes back to draft keeps its last card: the
//! skip leaves the stored reference untouched.
//!
//! ## Watched fields
//!
//! Entity shapes differ per collection, so each visual role (title, excerpt,
//! category, ...) is read through an ordered field chain, e.g. the title of
//! an entity is `title`, or `name` when `title` is absent. [`WatchedFields`]
//! holds those chains for one collection and [`FieldResolver`] builds them
//! from the config. Every field named in any chain is watched.

use crate::config::{FieldsConfig, RenderConfig};
use crate::types::TemplateId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Entity field holding the current artifact reference.
pub const ARTIFACT_FIELD: &str = "ogImage";

/// A JSON object view of one entity at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntitySnapshot {
    fields: Map<String, Value>,
}

impl EntitySnapshot {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// `None` unless `value` is a JSON object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    /// Field value. Explicit `null` counts as absent.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).filter(|v| !v.is_null())
    }

    /// Field as display text: non-blank strings and numbers. Anything else
    /// counts as absent.
    pub fn text(&self, field: &str) -> Option<String> {
        match self.get(field)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn id(&self) -> Option<String> {
        self.text("id")
    }

    /// Stored artifact reference, if any.
    pub fn artifact_ref(&self) -> Option<&str> {
        self.get(ARTIFACT_FIELD)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// `status == "draft"` or `published == false`.
    pub fn is_draft(&self) -> bool {
        self.get("status").and_then(Value::as_str) == Some("draft")
            || self.get("published").and_then(Value::as_bool) == Some(false)
    }

    /// Copy with the artifact reference set to `url`.
    pub fn with_artifact(&self, url: &str) -> Self {
        let mut fields = self.fields.clone();
        fields.insert(ARTIFACT_FIELD.to_string(), Value::String(url.to_string()));
        Self { fields }
    }
}

/// Visual roles read from an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    Title,
    Excerpt,
    /// Long-form text used for an excerpt when no excerpt field is set.
    Body,
    Category,
    CategoryColor,
    Logo,
}

/// Field chains for one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchedFields {
    title: Vec<String>,
    excerpt: Vec<String>,
    body: Vec<String>,
    category: Vec<String>,
    category_color: Vec<String>,
    logo: Vec<String>,
}

fn chain(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl WatchedFields {
    /// Default chains for a template. Customer cards read reviews.
    pub fn for_template(template: TemplateId) -> Self {
        match template {
            TemplateId::Customer => Self {
                title: chain(&["name", "title"]),
                excerpt: chain(&["review", "excerpt", "description"]),
                body: chain(&["content"]),
                category: chain(&["rating", "category"]),
                category_color: chain(&["categoryColor"]),
                logo: chain(&["logoUrl"]),
            },
            _ => Self {
                title: chain(&["title", "name"]),
                excerpt: chain(&["excerpt", "description"]),
                body: chain(&["content"]),
                category: chain(&["category", "eventType", "serviceType"]),
                category_color: chain(&["categoryColor"]),
                logo: chain(&["logoUrl"]),
            },
        }
    }

    /// Replace the chains `overrides` sets.
    pub fn with_overrides(mut self, overrides: &FieldsConfig) -> Self {
        let apply = |target: &mut Vec<String>, source: &Option<Vec<String>>| {
            if let Some(names) = source {
                target.clone_from(names);
            }
        };
        apply(&mut self.title, &overrides.title);
        apply(&mut self.excerpt, &overrides.excerpt);
        apply(&mut self.body, &overrides.body);
        apply(&mut self.category, &overrides.category);
        apply(&mut self.category_color, &overrides.category_color);
        apply(&mut self.logo, &overrides.logo);
        self
    }

    pub fn chain(&self, role: FieldRole) -> &[String] {
        match role {
            FieldRole::Title => &self.title,
            FieldRole::Excerpt => &self.excerpt,
            FieldRole::Body => &self.body,
            FieldRole::Category => &self.category,
            FieldRole::CategoryColor => &self.category_color,
            FieldRole::Logo => &self.logo,
        }
    }

    /// Every watched field name, in role order, without duplicates.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for name in [
            &self.title,
            &self.excerpt,
            &self.body,
            &self.category,
            &self.category_color,
            &self.logo,
        ]
        .into_iter()
        .flatten()
        {
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }
        names
    }

    /// First non-blank value along the role's chain.
    pub fn first_text(&self, snapshot: &EntitySnapshot, role: FieldRole) -> Option<String> {
        self.chain(role).iter().find_map(|field| snapshot.text(field))
    }

    /// First watched field whose value differs between the snapshots.
    pub fn first_change(&self, current: &EntitySnapshot, previous: &EntitySnapshot) -> Option<String> {
        self.names()
            .into_iter()
            .find(|field| current.get(field) != previous.get(field))
            .map(str::to_string)
    }
}

/// Collection → watched fields, built once from the config.
#[derive(Debug, Clone)]
pub struct FieldResolver {
    collections: BTreeMap<String, WatchedFields>,
    fallback: WatchedFields,
}

impl FieldResolver {
    pub fn new(config: &RenderConfig) -> Self {
        let collections = config
            .collections
            .iter()
            .map(|(slug, c)| {
                let base = WatchedFields::for_template(c.template);
                let fields = match &c.fields {
                    Some(overrides) => base.with_overrides(overrides),
                    None => base,
                };
                (slug.clone(), fields)
            })
            .collect();
        Self {
            collections,
            fallback: WatchedFields::for_template(TemplateId::Default),
        }
    }

    /// Chains for a collection. Unknown collections get the default chains.
    pub fn fields_for(&self, collection_id: &str) -> &WatchedFields {
        self.collections.get(collection_id).unwrap_or(&self.fallback)
    }
}

/// Why a decision came out the way it did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum DecisionReason {
    NoPriorArtifact,
    WatchedFieldChanged { field: String },
    DraftToPublishedTransition,
    /// Current snapshot is a draft.
    Draft,
    /// No title along the title chain; there is nothing to render.
    MissingTitle,
    /// No `id`; the card could not be told apart from other entities' cards.
    MissingId,
    Unchanged,
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionReason::NoPriorArtifact => f.write_str("no-prior-artifact"),
            DecisionReason::WatchedFieldChanged { field } => {
                write!(f, "watched-field-changed ({field})")
            }
            DecisionReason::DraftToPublishedTransition => {
                f.write_str("draft-to-published-transition")
            }
            DecisionReason::Draft => f.write_str("draft"),
            DecisionReason::MissingTitle => f.write_str("missing-title"),
            DecisionReason::MissingId => f.write_str("missing-id"),
            DecisionReason::Unchanged => f.write_str("unchanged"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegenerationDecision {
    pub should_regenerate: bool,
    pub reason: DecisionReason,
}

impl RegenerationDecision {
    fn regenerate(reason: DecisionReason) -> Self {
        Self {
            should_regenerate: true,
            reason,
        }
    }

    fn skip(reason: DecisionReason) -> Self {
        Self {
            should_regenerate: false,
            reason,
        }
    }
}

/// Decide whether `current` needs a new card. Total: never fails.
pub fn decide(
    current: &EntitySnapshot,
    previous: Option<&EntitySnapshot>,
    fields: &WatchedFields,
) -> RegenerationDecision {
    if current.is_draft() {
        return RegenerationDecision::skip(DecisionReason::Draft);
    }
    if fields.first_text(current, FieldRole::Title).is_none() {
        return RegenerationDecision::skip(DecisionReason::MissingTitle);
    }
    if current.id().is_none() {
        return RegenerationDecision::skip(DecisionReason::MissingId);
    }
    let Some(previous) = previous else {
        return RegenerationDecision::regenerate(DecisionReason::NoPriorArtifact);
    };
    if previous.is_draft() {
        return RegenerationDecision::regenerate(DecisionReason::DraftToPublishedTransition);
    }
    if previous.artifact_ref().is_none() {
        return RegenerationDecision::regenerate(DecisionReason::NoPriorArtifact);
    }
    match fields.first_change(current, previous) {
        Some(field) => {
            RegenerationDecision::regenerate(DecisionReason::WatchedFieldChanged { field })
        }
        None => RegenerationDecision::skip(DecisionReason::Unchanged),
    }
}
