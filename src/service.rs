//! Entry points called by the content system.
//!
//! ```text
//! entity write ──▶ decide ──skip──▶ keep stored reference
//!                    │
//!                    └─regenerate─▶ build request ─▶ render ─▶ persist ─▶ supersede old card
//! ```
//!
//! - [`PreviewService::maybe_regenerate`] runs the decision policy and, when
//!   needed, renders and persists a new card. Storage failures are returned.
//!   A watched field can change without changing the card (e.g. a fallback
//!   field shadowed by the one in use); when the catalog already holds a card
//!   with the same request fingerprint, that card is reused.
//! - [`PreviewService::on_entity_write`] wraps it for a write hook: it never
//!   fails and always returns the snapshot to store, carrying either the new
//!   reference or the previous one.
//! - [`PreviewService::render_preview`] always renders (authoring previews).
//! - [`PreviewService::sync_all`] runs the write path over many entities in
//!   parallel.

use crate::catalog::fingerprint_request;
use crate::config::RenderConfig;
use crate::imaging::{Color, Compositor, DeferredCompositor, RenderBackend, RenderError};
use crate::lifecycle::{ArtifactManager, StoreError, reference_file_name};
use crate::markup::{body_excerpt, to_plain_text};
use crate::naming::NamingContext;
use crate::policy::{
    DecisionReason, EntitySnapshot, FieldResolver, FieldRole, RegenerationDecision, decide,
};
use crate::registry::TemplateRegistry;
use crate::types::{RenderRequest, RenderedArtifact};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Entity id used for authoring previews.
pub const PREVIEW_ENTITY_ID: &str = "preview";

#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("Render failed: {0}")]
    Render(#[from] RenderError),
    #[error("Storage failed: {0}")]
    Store(#[from] StoreError),
    #[error("A preview needs a non-empty title")]
    MissingTitle,
}

/// Result of one write-path run.
#[derive(Debug, Clone, PartialEq)]
pub struct RegenerationOutcome {
    /// Reference the entity should carry: the new card, or the previous one
    /// when nothing was rendered.
    pub artifact_url: Option<String>,
    pub regenerated: bool,
    /// A regeneration was due but the current card already matched.
    pub reused: bool,
    pub decision: RegenerationDecision,
}

/// Progress of a [`PreviewService::sync_all`] run, one event per entity.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    Rendered { entity: String, url: String },
    Reused { entity: String, url: String },
    Skipped { entity: String, reason: DecisionReason },
    Failed { entity: String, error: String },
}

/// Totals of a [`PreviewService::sync_all`] run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// Input snapshots, in input order, with their updated references.
    pub entities: Vec<EntitySnapshot>,
    pub rendered: usize,
    pub reused: usize,
    pub skipped: usize,
    pub failed: usize,
}

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct PreviewService {
    registry: TemplateRegistry,
    fields: FieldResolver,
    backend: Box<dyn RenderBackend>,
    artifacts: ArtifactManager,
    default_logo: String,
    clock: Clock,
}

impl PreviewService {
    pub fn new(
        config: &RenderConfig,
        backend: Box<dyn RenderBackend>,
        artifacts: ArtifactManager,
    ) -> Self {
        Self {
            registry: TemplateRegistry::new(config),
            fields: FieldResolver::new(config),
            backend,
            artifacts,
            default_logo: config.logo.default_ref.clone(),
            clock: Box::new(Utc::now),
        }
    }

    /// Glyph compositor and filesystem store, both from the config.
    pub fn from_config(config: &RenderConfig) -> Result<Self, RenderError> {
        let compositor = Compositor::from_config(config)?;
        let artifacts = ArtifactManager::from_config(&config.output);
        Ok(Self::new(config, Box::new(compositor), artifacts))
    }

    /// Like [`from_config`](Self::from_config), but fonts are only loaded by
    /// the first render. Hooks that never render work without them.
    pub fn from_config_deferred(config: &RenderConfig) -> Self {
        let artifacts = ArtifactManager::from_config(&config.output);
        Self::new(config, Box::new(DeferredCompositor::new(config)), artifacts)
    }

    /// Replace the clock used for creation times and file-name dates.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    pub fn artifacts(&self) -> &ArtifactManager {
        &self.artifacts
    }

    /// Render request for an entity. `None` when it has no title.
    pub fn build_request(&self, collection_id: &str, entity: &EntitySnapshot) -> Option<RenderRequest> {
        let fields = self.fields.fields_for(collection_id);
        let title = fields.first_text(entity, FieldRole::Title)?;
        let excerpt = match fields.first_text(entity, FieldRole::Excerpt) {
            Some(text) => to_plain_text(&text),
            None => fields
                .first_text(entity, FieldRole::Body)
                .map(|body| body_excerpt(&body))
                .unwrap_or_default(),
        };
        let category = fields
            .first_text(entity, FieldRole::Category)
            .unwrap_or_default();
        let explicit_color = fields
            .first_text(entity, FieldRole::CategoryColor)
            .and_then(|hex| {
                let parsed = Color::parse_hex(&hex);
                if parsed.is_none() {
                    warn!(collection = collection_id, color = %hex, "Ignoring invalid category color");
                }
                parsed
            });
        let logo_ref = fields.first_text(entity, FieldRole::Logo);

        Some(self.assemble(
            collection_id,
            &entity.id().unwrap_or_default(),
            title,
            excerpt,
            category,
            explicit_color,
            logo_ref,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        &self,
        collection_id: &str,
        entity_id: &str,
        title: String,
        excerpt: String,
        category: String,
        explicit_color: Option<Color>,
        logo_ref: Option<String>,
    ) -> RenderRequest {
        let category_color = explicit_color
            .or_else(|| self.registry.category_color(&category))
            .unwrap_or_else(|| self.registry.accent_for(collection_id));
        RenderRequest {
            title,
            excerpt,
            category,
            category_color,
            logo_ref: logo_ref.unwrap_or_else(|| self.default_logo.clone()),
            template_id: self.registry.template_id_for(collection_id),
            collection_id: collection_id.to_string(),
            collection_label: self.registry.display_name(collection_id),
            entity_id: entity_id.to_string(),
        }
    }

    fn render_and_persist(
        &self,
        request: &RenderRequest,
        fingerprint: &str,
    ) -> Result<RenderedArtifact, PreviewError> {
        let template = self.registry.template(request.template_id);
        let bytes = self.backend.render(request, template)?;
        let now = (self.clock)();
        let naming = NamingContext {
            collection_id: request.collection_id.clone(),
            entity_id: request.entity_id.clone(),
            title: request.title.clone(),
            date: now.date_naive(),
        };
        let artifact = self
            .artifacts
            .persist(&bytes, &naming, fingerprint, now)?;
        Ok(artifact)
    }

    /// Decide, and render when needed. The stored reference of the previous
    /// snapshot (or, failing that, of the current one) is the card that a
    /// new render supersedes.
    pub fn maybe_regenerate(
        &self,
        collection_id: &str,
        current: &EntitySnapshot,
        previous: Option<&EntitySnapshot>,
    ) -> Result<RegenerationOutcome, PreviewError> {
        self.regenerate(collection_id, current, previous, true)
    }

    fn regenerate(
        &self,
        collection_id: &str,
        current: &EntitySnapshot,
        previous: Option<&EntitySnapshot>,
        reuse_matching: bool,
    ) -> Result<RegenerationOutcome, PreviewError> {
        let fields = self.fields.fields_for(collection_id);
        let decision = decide(current, previous, fields);
        let prior = previous
            .and_then(EntitySnapshot::artifact_ref)
            .or_else(|| current.artifact_ref())
            .map(str::to_string);
        let entity = current.id().unwrap_or_default();

        let request = if decision.should_regenerate {
            self.build_request(collection_id, current)
        } else {
            None
        };
        let Some(request) = request else {
            debug!(
                collection = collection_id,
                entity = %entity,
                reason = %decision.reason,
                "Preview card kept"
            );
            return Ok(RegenerationOutcome {
                artifact_url: prior,
                regenerated: false,
                reused: false,
                decision,
            });
        };

        let fingerprint = fingerprint_request(&request);
        let matching = reuse_matching
            .then(|| self.artifacts.matching_card(collection_id, &entity, &fingerprint))
            .flatten();
        if let Some(url) = matching {
            if let Some(old) = &prior
                && reference_file_name(old) != reference_file_name(&url)
            {
                self.artifacts.cleanup(old);
            }
            debug!(
                collection = collection_id,
                entity = %entity,
                reason = %decision.reason,
                file = %url,
                "Preview card reused, rendered inputs unchanged"
            );
            return Ok(RegenerationOutcome {
                artifact_url: Some(url),
                regenerated: false,
                reused: true,
                decision,
            });
        }

        let artifact = self.render_and_persist(&request, &fingerprint)?;
        if let Some(old) = &prior {
            self.artifacts.supersede(old, &artifact);
        }
        info!(
            collection = collection_id,
            entity = %entity,
            reason = %decision.reason,
            file = %artifact.file_name,
            "Preview card generated"
        );
        Ok(RegenerationOutcome {
            artifact_url: Some(artifact.url),
            regenerated: true,
            reused: false,
            decision,
        })
    }

    /// Write-hook wrapper: returns the snapshot to store. Failures are logged
    /// and the previous reference is kept.
    pub fn on_entity_write(
        &self,
        collection_id: &str,
        current: &EntitySnapshot,
        previous: Option<&EntitySnapshot>,
    ) -> EntitySnapshot {
        self.sync_entity(collection_id, current, previous).0
    }

    /// [`on_entity_write`](Self::on_entity_write), also returning the
    /// outcome. The outcome is `None` when rendering or storage failed.
    pub fn sync_entity(
        &self,
        collection_id: &str,
        current: &EntitySnapshot,
        previous: Option<&EntitySnapshot>,
    ) -> (EntitySnapshot, Option<RegenerationOutcome>) {
        let (url, outcome) = match self.maybe_regenerate(collection_id, current, previous) {
            Ok(outcome) => (outcome.artifact_url.clone(), Some(outcome)),
            Err(e) => {
                warn!(
                    collection = collection_id,
                    entity = %current.id().unwrap_or_default(),
                    error = %e,
                    "Preview card generation failed, keeping previous card"
                );
                let prior = previous
                    .and_then(EntitySnapshot::artifact_ref)
                    .or_else(|| current.artifact_ref())
                    .map(str::to_string);
                (prior, None)
            }
        };
        let stored = match url {
            Some(url) if current.artifact_ref() != Some(url.as_str()) => current.with_artifact(&url),
            _ => current.clone(),
        };
        (stored, outcome)
    }

    /// Delete hook: removes the entity's current card. Returns whether the
    /// entity had one.
    pub fn on_entity_delete(&self, collection_id: &str, entity: &EntitySnapshot) -> bool {
        let Some(reference) = entity.artifact_ref() else {
            return false;
        };
        debug!(
            collection = collection_id,
            entity = %entity.id().unwrap_or_default(),
            file = reference,
            "Removing card of deleted entity"
        );
        self.artifacts.cleanup(reference);
        true
    }

    /// Always render, bypassing the decision policy. The previous preview of
    /// the same collection is superseded.
    pub fn render_preview(
        &self,
        collection_id: &str,
        title: &str,
        excerpt: &str,
        category: &str,
    ) -> Result<RenderedArtifact, PreviewError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(PreviewError::MissingTitle);
        }
        let request = self.assemble(
            collection_id,
            PREVIEW_ENTITY_ID,
            title.to_string(),
            to_plain_text(excerpt),
            category.trim().to_string(),
            None,
            None,
        );
        let previous = self.artifacts.current_url(collection_id, PREVIEW_ENTITY_ID);
        let artifact = self.render_and_persist(&request, &fingerprint_request(&request))?;
        if let Some(old) = previous {
            self.artifacts.supersede(&old, &artifact);
        }
        info!(collection = collection_id, file = %artifact.file_name, "Preview rendered");
        Ok(artifact)
    }

    /// Run the write path over every entity in parallel.
    ///
    /// Each snapshot is its own previous snapshot, so only entities without
    /// a card get one. With `force`, every publishable entity is re-rendered
    /// (matching cards are not reused) and its old card superseded.
    pub fn sync_all(
        &self,
        collection_id: &str,
        entities: Vec<EntitySnapshot>,
        force: bool,
        progress: Option<Sender<BatchEvent>>,
    ) -> BatchReport {
        let results: Vec<(EntitySnapshot, BatchEvent)> = entities
            .into_par_iter()
            .map(|entity| {
                let previous = (!force).then_some(&entity);
                let id = entity.id().unwrap_or_default();
                let (snapshot, event) = match self.regenerate(collection_id, &entity, previous, !force) {
                    Ok(outcome) => match outcome.artifact_url {
                        Some(url) if outcome.regenerated => (
                            entity.with_artifact(&url),
                            BatchEvent::Rendered { entity: id, url },
                        ),
                        Some(url) if outcome.reused => (
                            entity.with_artifact(&url),
                            BatchEvent::Reused { entity: id, url },
                        ),
                        _ => (
                            entity,
                            BatchEvent::Skipped {
                                entity: id,
                                reason: outcome.decision.reason,
                            },
                        ),
                    },
                    Err(e) => {
                        warn!(collection = collection_id, entity = %id, error = %e, "Batch render failed");
                        (
                            entity,
                            BatchEvent::Failed {
                                entity: id,
                                error: e.to_string(),
                            },
                        )
                    }
                };
                if let Some(tx) = &progress {
                    tx.send(event.clone()).ok();
                }
                (snapshot, event)
            })
            .collect();

        let mut report = BatchReport::default();
        for (snapshot, event) in results {
            match event {
                BatchEvent::Rendered { .. } => report.rendered += 1,
                BatchEvent::Reused { .. } => report.reused += 1,
                BatchEvent::Skipped { .. } => report.skipped += 1,
                BatchEvent::Failed { .. } => report.failed += 1,
            }
            report.entities.push(snapshot);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::stock_defaults;
    use crate::imaging::backend::tests::MockBackend;
    use crate::lifecycle::{ArtifactStore, FsStore};
    use crate::test_helpers::{FailingStore, MemoryStore, entity};
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn fixed_clock() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    struct Harness {
        service: PreviewService,
        backend: Arc<MockBackend>,
        store: MemoryStore,
    }

    fn harness() -> Harness {
        let backend = Arc::new(MockBackend::new());
        let store = MemoryStore::new();
        let artifacts = ArtifactManager::new(Box::new(store.clone()), false);
        let service = PreviewService::new(&stock_defaults(), Box::new(backend.clone()), artifacts)
            .with_clock(fixed_clock);
        Harness {
            service,
            backend,
            store,
        }
    }

    /// Service over a catalogued filesystem store in `tmp`.
    fn fs_harness(tmp: &TempDir) -> (PreviewService, Arc<MockBackend>) {
        let backend = Arc::new(MockBackend::new());
        let artifacts = ArtifactManager::new(Box::new(FsStore::new(tmp.path(), "/og")), true);
        let service = PreviewService::new(&stock_defaults(), Box::new(backend.clone()), artifacts)
            .with_clock(fixed_clock);
        (service, backend)
    }

    fn post() -> EntitySnapshot {
        entity(json!({
            "id": "42",
            "title": "Summer Fades",
            "excerpt": "Short on the **sides**",
            "category": "Haircut Tips",
            "status": "published"
        }))
    }

    const POST_URL: &str = "/media/generated-og/blog-posts-42-2026-03-01-summer-fades.png";

    // =========================================================================
    // build_request
    // =========================================================================

    #[test]
    fn request_reads_fields_and_strips_markup() {
        let h = harness();
        let request = h.service.build_request("blog-posts", &post()).unwrap();
        assert_eq!(request.title, "Summer Fades");
        assert_eq!(request.excerpt, "Short on the sides");
        assert_eq!(request.category, "Haircut Tips");
        assert_eq!(request.entity_id, "42");
        assert_eq!(request.collection_label, "Blog");
        assert_eq!(request.logo_ref, "/logo.png");
        // Partial category match on "haircut"
        assert_eq!(request.category_color.to_hex(), "#2d3748");
    }

    #[test]
    fn explicit_category_color_wins() {
        let h = harness();
        let mut e = post().into_value();
        e["categoryColor"] = json!("#ff0000");
        let request = h.service.build_request("blog-posts", &entity(e)).unwrap();
        assert_eq!(request.category_color.to_hex(), "#ff0000");
    }

    #[test]
    fn invalid_category_color_falls_back() {
        let h = harness();
        let e = entity(json!({"id": "1", "title": "x", "categoryColor": "red"}));
        let request = h.service.build_request("pages", &e).unwrap();
        assert_eq!(request.category_color.to_hex(), "#1a202c");
    }

    #[test]
    fn body_used_when_no_excerpt() {
        let h = harness();
        let long = "word ".repeat(100);
        let e = entity(json!({"id": "1", "title": "x", "content": format!("# Heading\n\n{long}")}));
        let request = h.service.build_request("pages", &e).unwrap();
        assert!(request.excerpt.starts_with("Heading word"));
        assert!(request.excerpt.chars().count() <= 150);
    }

    #[test]
    fn unknown_collection_uses_default_template() {
        let h = harness();
        let request = h.service.build_request("barber-chairs", &post()).unwrap();
        assert_eq!(request.template_id, crate::types::TemplateId::Default);
        assert_eq!(request.collection_label, "Barber chairs");
    }

    #[test]
    fn customer_collection_reads_review() {
        let h = harness();
        let e = entity(json!({"id": "7", "name": "Sam", "review": "Best fade in town", "rating": 5}));
        let request = h.service.build_request("testimonials", &e).unwrap();
        assert_eq!(request.title, "Sam");
        assert_eq!(request.excerpt, "Best fade in town");
        assert_eq!(request.category, "5");
    }

    #[test]
    fn no_title_no_request() {
        let h = harness();
        assert!(h.service.build_request("pages", &entity(json!({"id": "1"}))).is_none());
    }

    // =========================================================================
    // maybe_regenerate
    // =========================================================================

    #[test]
    fn first_write_renders() {
        let h = harness();
        let outcome = h.service.maybe_regenerate("blog-posts", &post(), None).unwrap();
        assert!(outcome.regenerated);
        assert_eq!(outcome.decision.reason, DecisionReason::NoPriorArtifact);
        assert_eq!(outcome.artifact_url.as_deref(), Some(POST_URL));
        assert_eq!(h.backend.get_renders().len(), 1);
        assert_eq!(
            h.store.get("blog-posts-42-2026-03-01-summer-fades.png").unwrap(),
            b"png:Summer Fades"
        );
    }

    #[test]
    fn previous_without_artifact_renders() {
        let h = harness();
        let outcome = h
            .service
            .maybe_regenerate("blog-posts", &post(), Some(&post()))
            .unwrap();
        assert!(outcome.regenerated);
        assert_eq!(outcome.decision.reason, DecisionReason::NoPriorArtifact);
    }

    #[test]
    fn unchanged_write_keeps_reference() {
        let h = harness();
        let stored = post().with_artifact("/media/generated-og/old.png");
        let outcome = h
            .service
            .maybe_regenerate("blog-posts", &stored, Some(&stored))
            .unwrap();
        assert!(!outcome.regenerated);
        assert_eq!(outcome.decision.reason, DecisionReason::Unchanged);
        assert_eq!(
            outcome.artifact_url.as_deref(),
            Some("/media/generated-og/old.png")
        );
        assert!(h.backend.get_renders().is_empty());
    }

    #[test]
    fn publish_transition_renders() {
        let h = harness();
        let mut draft = post().with_artifact("/media/generated-og/old.png").into_value();
        draft["status"] = json!("draft");
        let outcome = h
            .service
            .maybe_regenerate("blog-posts", &post(), Some(&entity(draft)))
            .unwrap();
        assert!(outcome.regenerated);
        assert_eq!(
            outcome.decision.reason,
            DecisionReason::DraftToPublishedTransition
        );
    }

    #[test]
    fn draft_never_renders() {
        let h = harness();
        let mut draft = post().into_value();
        draft["status"] = json!("draft");
        let draft = entity(draft);
        for previous in [None, Some(post().with_artifact("/x.png"))] {
            let outcome = h
                .service
                .maybe_regenerate("blog-posts", &draft, previous.as_ref())
                .unwrap();
            assert!(!outcome.regenerated);
        }
        assert!(h.backend.get_renders().is_empty());
    }

    #[test]
    fn changed_title_supersedes_old_card() {
        let h = harness();
        let first = h.service.on_entity_write("blog-posts", &post(), None);
        let mut edited = first.clone().into_value();
        edited["title"] = json!("Winter Fades");
        let edited = entity(edited);

        let outcome = h
            .service
            .maybe_regenerate("blog-posts", &edited, Some(&first))
            .unwrap();
        assert_eq!(
            outcome.decision.reason,
            DecisionReason::WatchedFieldChanged {
                field: "title".into()
            }
        );
        assert_eq!(
            outcome.artifact_url.as_deref(),
            Some("/media/generated-og/blog-posts-42-2026-03-01-winter-fades.png")
        );
        assert_eq!(h.store.names(), vec!["blog-posts-42-2026-03-01-winter-fades.png"]);
    }

    #[test]
    fn same_day_rerender_overwrites_in_place() {
        let h = harness();
        let first = h.service.on_entity_write("blog-posts", &post(), None);
        let mut edited = first.clone().into_value();
        edited["excerpt"] = json!("Now with beard trims");
        let second = h
            .service
            .on_entity_write("blog-posts", &entity(edited), Some(&first));
        assert_eq!(second.artifact_ref(), Some(POST_URL));
        assert_eq!(h.store.names().len(), 1);
        assert_eq!(h.backend.get_renders().len(), 2);
    }

    #[test]
    fn entities_without_id_get_no_card() {
        let tmp = TempDir::new().unwrap();
        let (service, backend) = fs_harness(&tmp);
        let about = service.on_entity_write("pages", &entity(json!({"title": "About"})), None);
        let contact = service.on_entity_write("pages", &entity(json!({"title": "Contact"})), None);
        assert_eq!(about.artifact_ref(), None);
        assert_eq!(contact.artifact_ref(), None);
        assert!(backend.get_renders().is_empty());

        let outcome = service
            .maybe_regenerate("pages", &entity(json!({"title": "About"})), None)
            .unwrap();
        assert_eq!(outcome.decision.reason, DecisionReason::MissingId);
        let report = service.artifacts().prune().unwrap();
        assert_eq!((report.kept, report.removed.len()), (0, 0));
    }

    #[test]
    fn ids_differing_only_in_separators_keep_their_own_cards() {
        let tmp = TempDir::new().unwrap();
        let (service, _backend) = fs_harness(&tmp);
        let slashed = service.on_entity_write("pages", &entity(json!({"id": "a/b", "title": "Same"})), None);
        let dashed = service.on_entity_write("pages", &entity(json!({"id": "a-b", "title": "Same"})), None);
        assert_ne!(slashed.artifact_ref(), dashed.artifact_ref());
        assert_eq!(dashed.artifact_ref(), Some("/og/pages-a-b-2026-03-01-same.png"));

        let report = service.artifacts().prune().unwrap();
        assert_eq!(report.kept, 2);
        assert!(report.removed.is_empty());
        for stored in [&slashed, &dashed] {
            let name = reference_file_name(stored.artifact_ref().unwrap()).unwrap();
            assert!(tmp.path().join(name).is_file(), "{name}");
        }
    }

    #[test]
    fn shadowed_field_change_reuses_card() {
        let tmp = TempDir::new().unwrap();
        let (service, backend) = fs_harness(&tmp);
        let first = service.on_entity_write("blog-posts", &post(), None);

        // `description` is watched but `excerpt` is the one on the card
        let mut edited = first.clone().into_value();
        edited["description"] = json!("Only read when there is no excerpt");
        let outcome = service
            .maybe_regenerate("blog-posts", &entity(edited), Some(&first))
            .unwrap();
        assert!(outcome.decision.should_regenerate);
        assert!(outcome.reused);
        assert!(!outcome.regenerated);
        assert_eq!(outcome.artifact_url.as_deref(), first.artifact_ref());
        assert_eq!(backend.get_renders().len(), 1);
    }

    #[test]
    fn visible_change_is_rendered_again() {
        let tmp = TempDir::new().unwrap();
        let (service, backend) = fs_harness(&tmp);
        let first = service.on_entity_write("blog-posts", &post(), None);
        let mut edited = first.clone().into_value();
        edited["excerpt"] = json!("Now with beard trims");
        let outcome = service
            .maybe_regenerate("blog-posts", &entity(edited), Some(&first))
            .unwrap();
        assert!(outcome.regenerated);
        assert!(!outcome.reused);
        assert_eq!(backend.get_renders().len(), 2);
    }

    #[test]
    fn render_failure_is_returned() {
        let artifacts = ArtifactManager::new(Box::new(MemoryStore::new()), false);
        let service =
            PreviewService::new(&stock_defaults(), Box::new(MockBackend::failing()), artifacts);
        let result = service.maybe_regenerate("blog-posts", &post(), None);
        assert!(matches!(result, Err(PreviewError::Render(_))));
    }

    #[test]
    fn storage_failure_is_returned() {
        let artifacts = ArtifactManager::new(Box::new(FailingStore), false);
        let service =
            PreviewService::new(&stock_defaults(), Box::new(MockBackend::new()), artifacts);
        let result = service.maybe_regenerate("blog-posts", &post(), None);
        assert!(matches!(result, Err(PreviewError::Store(_))));
    }

    // =========================================================================
    // on_entity_write / on_entity_delete
    // =========================================================================

    #[test]
    fn write_hook_is_idempotent() {
        let h = harness();
        let stored = h.service.on_entity_write("blog-posts", &post(), None);
        assert_eq!(stored.artifact_ref(), Some(POST_URL));

        let outcome = h
            .service
            .maybe_regenerate("blog-posts", &stored, Some(&stored))
            .unwrap();
        assert!(!outcome.regenerated);
        assert_eq!(h.backend.get_renders().len(), 1);
    }

    #[test]
    fn write_hook_keeps_previous_reference_on_failure() {
        let artifacts = ArtifactManager::new(Box::new(FailingStore), false);
        let service =
            PreviewService::new(&stock_defaults(), Box::new(MockBackend::new()), artifacts);
        let previous = entity(json!({
            "id": "42",
            "title": "Old Title",
            "status": "published",
            "ogImage": "/media/generated-og/old.png"
        }));
        // Client payload without the reference
        let stored = service.on_entity_write("blog-posts", &post(), Some(&previous));
        assert_eq!(stored.artifact_ref(), Some("/media/generated-og/old.png"));
        assert_eq!(stored.text("title").as_deref(), Some("Summer Fades"));
    }

    #[test]
    fn sync_entity_reports_failure_as_none() {
        let artifacts = ArtifactManager::new(Box::new(FailingStore), false);
        let service =
            PreviewService::new(&stock_defaults(), Box::new(MockBackend::new()), artifacts);
        let (stored, outcome) = service.sync_entity("blog-posts", &post(), None);
        assert!(outcome.is_none());
        assert_eq!(stored, post());
    }

    #[test]
    fn write_hook_carries_reference_when_skipping() {
        let h = harness();
        let previous = post().with_artifact("/media/generated-og/old.png");
        let mut draft = post().into_value();
        draft["status"] = json!("draft");
        let stored = h
            .service
            .on_entity_write("blog-posts", &entity(draft), Some(&previous));
        assert_eq!(stored.artifact_ref(), Some("/media/generated-og/old.png"));
    }

    #[test]
    fn delete_hook_works_without_fonts() {
        let tmp = TempDir::new().unwrap();
        let mut config = stock_defaults();
        config.fonts.bold = "/nonexistent/bold.ttf".into();
        config.fonts.regular = "/nonexistent/regular.ttf".into();
        config.output.public_root = tmp.path().to_string_lossy().into_owned();
        let store = FsStore::from_config(&config.output);
        let url = store.write("pages-1-2026-03-01-about.png", b"png").unwrap();

        let service = PreviewService::from_config_deferred(&config);
        let stored = entity(json!({"id": "1", "title": "About", "ogImage": url}));
        assert!(service.on_entity_delete("pages", &stored));
        assert!(!store.directory().unwrap().join("pages-1-2026-03-01-about.png").exists());

        // Rendering is where the missing fonts surface
        let fresh = entity(json!({"id": "2", "title": "Contact"}));
        assert!(matches!(
            service.maybe_regenerate("pages", &fresh, None),
            Err(PreviewError::Render(RenderError::Font(_)))
        ));
    }

    #[test]
    fn delete_hook_removes_card() {
        let h = harness();
        let stored = h.service.on_entity_write("blog-posts", &post(), None);
        assert!(h.service.on_entity_delete("blog-posts", &stored));
        assert!(h.store.names().is_empty());
        assert!(!h.service.on_entity_delete("blog-posts", &post()));
    }

    // =========================================================================
    // render_preview
    // =========================================================================

    #[test]
    fn preview_always_renders() {
        let h = harness();
        let a = h
            .service
            .render_preview("events", "Open Day", "Free *hot* towel", "workshop")
            .unwrap();
        let b = h
            .service
            .render_preview("events", "Open Day", "Free *hot* towel", "workshop")
            .unwrap();
        assert_eq!(a.url, "/media/generated-og/events-preview-2026-03-01-open-day.png");
        assert_eq!(a.url, b.url);
        let renders = h.backend.get_renders();
        assert_eq!(renders.len(), 2);
        assert_eq!(renders[0].excerpt, "Free hot towel");
        assert_eq!(renders[0].template, crate::types::TemplateId::Event);
    }

    #[test]
    fn preview_requires_title() {
        let h = harness();
        assert!(matches!(
            h.service.render_preview("events", "   ", "", ""),
            Err(PreviewError::MissingTitle)
        ));
    }

    #[test]
    fn preview_supersedes_previous_preview() {
        let tmp = TempDir::new().unwrap();
        let store = FsStore::new(tmp.path(), "/og");
        let artifacts = ArtifactManager::new(Box::new(store), true);
        let service =
            PreviewService::new(&stock_defaults(), Box::new(MockBackend::new()), artifacts)
                .with_clock(fixed_clock);

        let first = service.render_preview("pages", "First", "", "").unwrap();
        let second = service.render_preview("pages", "Second", "", "").unwrap();
        assert!(!tmp.path().join(&first.file_name).exists());
        assert!(tmp.path().join(&second.file_name).exists());
    }

    // =========================================================================
    // sync_all
    // =========================================================================

    fn batch() -> Vec<EntitySnapshot> {
        vec![
            entity(json!({"id": "1", "title": "One", "status": "published"})),
            entity(json!({"id": "2", "title": "Two", "ogImage": "/media/generated-og/two.png"})),
            entity(json!({"id": "3", "title": "Three", "status": "draft"})),
            entity(json!({"id": "4"})),
        ]
    }

    #[test]
    fn sync_backfills_missing_cards() {
        let h = harness();
        let (tx, rx) = std::sync::mpsc::channel();
        let report = h.service.sync_all("pages", batch(), false, Some(tx));

        assert_eq!((report.rendered, report.skipped, report.failed), (1, 3, 0));
        assert_eq!(
            report.entities[0].artifact_ref(),
            Some("/media/generated-og/pages-1-2026-03-01-one.png")
        );
        assert_eq!(
            report.entities[1].artifact_ref(),
            Some("/media/generated-og/two.png")
        );
        assert_eq!(report.entities[3].id().as_deref(), Some("4"));

        let events: Vec<BatchEvent> = rx.iter().collect();
        assert_eq!(events.len(), 4);
        assert!(events.contains(&BatchEvent::Skipped {
            entity: "4".into(),
            reason: DecisionReason::MissingTitle
        }));
    }

    #[test]
    fn forced_sync_rerenders_and_supersedes() {
        let h = harness();
        h.store.insert("two.png", b"old");
        let report = h.service.sync_all("pages", batch(), true, None);

        assert_eq!((report.rendered, report.skipped, report.failed), (2, 2, 0));
        assert_eq!(
            report.entities[1].artifact_ref(),
            Some("/media/generated-og/pages-2-2026-03-01-two.png")
        );
        assert!(h.store.get("two.png").is_none());
    }

    #[test]
    fn forced_sync_renders_and_plain_sync_reuses() {
        let tmp = TempDir::new().unwrap();
        let (service, backend) = fs_harness(&tmp);
        let stored = service.on_entity_write("pages", &entity(json!({"id": "1", "title": "One"})), None);

        let report = service.sync_all("pages", vec![stored.clone()], true, None);
        assert_eq!(report.rendered, 1);
        assert_eq!(backend.get_renders().len(), 2);

        // An entity that lost its reference gets the matching card back
        let mut lost = stored.clone().into_value();
        lost.as_object_mut().unwrap().remove("ogImage");
        let report = service.sync_all("pages", vec![entity(lost)], false, None);
        assert_eq!((report.rendered, report.reused), (0, 1));
        assert_eq!(report.entities[0].artifact_ref(), stored.artifact_ref());
        assert_eq!(backend.get_renders().len(), 2);
    }

    #[test]
    fn sync_counts_failures() {
        let artifacts = ArtifactManager::new(Box::new(FailingStore), false);
        let service =
            PreviewService::new(&stock_defaults(), Box::new(MockBackend::new()), artifacts);
        let report = service.sync_all("pages", batch(), false, None);
        assert_eq!(report.failed, 1);
        assert_eq!(report.entities[0].artifact_ref(), None);
    }
}
