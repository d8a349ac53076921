//! # ogcard
//!
//! Social preview (Open Graph) cards for content collections. Every entity
//! write is checked against the previous snapshot of the same entity, and a
//! 1200×630 PNG card is rendered only when it would look different.
//!
//! # Architecture: Decide, Compose, Persist
//!
//! ```text
//! 1. Decide    current + previous snapshot  →  RegenerationDecision
//! 2. Compose   RenderRequest + Template     →  PNG bytes
//! 3. Persist   PNG bytes + NamingContext    →  RenderedArtifact (old card retired)
//! ```
//!
//! Each stage is usable on its own:
//!
//! - **Decide** is a pure function over two JSON snapshots; the policy is
//!   testable without fonts or files.
//! - **Compose** is a pure function from request to pixels; the typeface and
//!   logo source are traits, so layouts can be checked with deterministic
//!   stand-ins.
//! - **Persist** talks to a storage trait; cleanup of the previous card is
//!   best effort and never undoes a successful render.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`service`] | Entry points: `maybe_regenerate`, write and delete hooks, previews, parallel batch |
//! | [`policy`] | Regeneration decision and the per-collection watched-field resolver |
//! | [`registry`] | Collection → template lookup, accents, category colors |
//! | [`imaging`] | Compositor, canvas primitives, typefaces, logo loading |
//! | [`typography`] | Font size search and line wrapping with truncation |
//! | [`markup`] | Markdown excerpts → plain measurable text |
//! | [`lifecycle`] | Artifact store, persist / cleanup / prune |
//! | [`catalog`] | JSON catalog of current cards with request fingerprints |
//! | [`naming`] | Deterministic artifact file names and collection labels |
//! | [`config`] | `ogcard.toml` loading, merging, validation |
//! | [`types`] | Shared value types (`RenderRequest`, `RenderedArtifact`, `TemplateId`) |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## One Backend
//!
//! Cards are painted directly onto an RGBA surface by
//! [`imaging::Compositor`]. There is no markup-and-headless-browser path to
//! switch to at runtime, so identical requests produce identical bytes.
//!
//! ## Injected Configuration
//!
//! Template, accent and category tables live in [`config::RenderConfig`],
//! parsed once and passed to every component at construction. Nothing reads
//! global state while rendering, which is what makes batch rendering with
//! `rayon` safe.
//!
//! ## Keep the Old Card on Failure
//!
//! A failed render or write leaves the entity's stored reference untouched.
//! Entities never lose a working card because a new one could not be made.

pub mod catalog;
pub mod config;
pub mod imaging;
pub mod lifecycle;
pub mod markup;
pub mod naming;
pub mod output;
pub mod policy;
pub mod registry;
pub mod service;
pub mod types;
pub mod typography;

#[cfg(test)]
pub(crate) mod test_helpers;
