//! Rendering backend trait and shared error type.
//!
//! The [`RenderBackend`] trait is the single capability the service layer
//! needs from a renderer: turn a request and a template into PNG bytes.
//!
//! The production implementation is
//! [`Compositor`](super::compositor::Compositor), which paints directly onto
//! an RGBA surface. Nothing else is ever selected at runtime, so the same
//! input always produces the same pixels.

use crate::registry::Template;
use crate::types::RenderRequest;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Font error: {0}")]
    Font(String),
    #[error("Encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Trait for preview-card renderers.
///
/// Implementations must be safe to share between threads: batch rendering
/// calls `render` for different entities in parallel.
pub trait RenderBackend: Send + Sync {
    /// Render one card. Returns encoded PNG bytes.
    fn render(&self, request: &RenderRequest, template: &Template) -> Result<Vec<u8>, RenderError>;
}

impl<B: RenderBackend + ?Sized> RenderBackend for std::sync::Arc<B> {
    fn render(&self, request: &RenderRequest, template: &Template) -> Result<Vec<u8>, RenderError> {
        (**self).render(request, template)
    }
}
