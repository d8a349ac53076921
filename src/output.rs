//! CLI output formatting for every command.
//!
//! # Output Format
//!
//! ## Preview
//!
//! ```text
//! Rendered events-preview-2026-03-01-open-day.png (1200×630)
//!     URL: /media/generated-og/events-preview-2026-03-01-open-day.png
//! ```
//!
//! ## Sync
//!
//! ```text
//! blog-posts/42 regenerated (watched-field-changed (title))
//!     URL: /media/generated-og/blog-posts-42-2026-03-01-summer-fades.png
//! ```
//!
//! ## Batch
//!
//! ```text
//! 42 → /media/generated-og/pages-42-2026-03-01-about.png
//! 43 skipped (draft)
//! 44 failed: Storage failed: IO error: disk full
//! 45 reused /media/generated-og/pages-45-2026-02-27-contact.png
//!
//! Rendered 1, reused 1, skipped 1, failed 1
//! ```
//!
//! ## Templates
//!
//! ```text
//! blog-posts → blog
//!     Label: Blog
//!     Accent: #1a202c
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::lifecycle::PruneReport;
use crate::registry::TemplateRegistry;
use crate::service::{BatchEvent, BatchReport, RegenerationOutcome};
use crate::types::RenderedArtifact;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

// ============================================================================
// Preview
// ============================================================================

pub fn format_preview_output(artifact: &RenderedArtifact) -> Vec<String> {
    vec![
        format!(
            "Rendered {} ({}×{})",
            artifact.file_name, artifact.width, artifact.height
        ),
        format!("{}URL: {}", indent(1), artifact.url),
    ]
}

pub fn print_preview_output(artifact: &RenderedArtifact) {
    print_lines(format_preview_output(artifact));
}

// ============================================================================
// Sync
// ============================================================================

pub fn format_sync_output(collection_id: &str, entity_id: &str, outcome: &RegenerationOutcome) -> Vec<String> {
    let status = if outcome.regenerated {
        "regenerated"
    } else if outcome.reused {
        "reused"
    } else {
        "kept"
    };
    let mut lines = vec![format!(
        "{}/{} {} ({})",
        collection_id, entity_id, status, outcome.decision.reason
    )];
    match &outcome.artifact_url {
        Some(url) => lines.push(format!("{}URL: {}", indent(1), url)),
        None => lines.push(format!("{}URL: none", indent(1))),
    }
    lines
}

/// Sync status goes to stderr; stdout carries the updated entity JSON.
pub fn print_sync_output(collection_id: &str, entity_id: &str, outcome: &RegenerationOutcome) {
    for line in format_sync_output(collection_id, entity_id, outcome) {
        eprintln!("{}", line);
    }
}

// ============================================================================
// Batch
// ============================================================================

pub fn format_batch_event(event: &BatchEvent) -> Vec<String> {
    match event {
        BatchEvent::Rendered { entity, url } => vec![format!("{} → {}", entity, url)],
        BatchEvent::Reused { entity, url } => vec![format!("{} reused {}", entity, url)],
        BatchEvent::Skipped { entity, reason } => vec![format!("{} skipped ({})", entity, reason)],
        BatchEvent::Failed { entity, error } => vec![format!("{} failed: {}", entity, error)],
    }
}

pub fn format_batch_summary(report: &BatchReport) -> Vec<String> {
    vec![
        String::new(),
        format!(
            "Rendered {}, reused {}, skipped {}, failed {}",
            report.rendered, report.reused, report.skipped, report.failed
        ),
    ]
}

pub fn print_batch_summary(report: &BatchReport) {
    print_lines(format_batch_summary(report));
}

// ============================================================================
// Templates
// ============================================================================

pub fn format_templates_output(registry: &TemplateRegistry) -> Vec<String> {
    let mut lines = Vec::new();
    for entry in registry.collections() {
        lines.push(format!("{} → {}", entry.slug, entry.template));
        lines.push(format!("{}Label: {}", indent(1), entry.display_name));
        lines.push(format!("{}Accent: {}", indent(1), entry.accent.to_hex()));
    }
    lines.push(String::new());
    lines.push("Unlisted collections use the default template".to_string());
    lines
}

pub fn print_templates_output(registry: &TemplateRegistry) {
    print_lines(format_templates_output(registry));
}

// ============================================================================
// Delete / Prune
// ============================================================================

pub fn format_delete_output(collection_id: &str, entity_id: &str, removed: bool) -> Vec<String> {
    if removed {
        vec![format!("{}/{} card removed", collection_id, entity_id)]
    } else {
        vec![format!("{}/{} has no card", collection_id, entity_id)]
    }
}

pub fn print_delete_output(collection_id: &str, entity_id: &str, removed: bool) {
    print_lines(format_delete_output(collection_id, entity_id, removed));
}

pub fn format_prune_output(report: &PruneReport) -> Vec<String> {
    let mut lines = Vec::new();
    for name in &report.removed {
        lines.push(format!("removed {}", name));
    }
    for name in &report.failed {
        lines.push(format!("failed {}", name));
    }
    lines.push(format!(
        "Kept {}, removed {}, failed {}",
        report.kept,
        report.removed.len(),
        report.failed.len()
    ));
    lines
}

pub fn print_prune_output(report: &PruneReport) {
    print_lines(format_prune_output(report));
}

// ============================================================================
// Tests
// ============================================================================
