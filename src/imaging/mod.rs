//! Card rendering: pure Rust, no system graphics libraries.
//!
//! | Concern | Crate / function |
//! |---|---|
//! | **Glyph outlines** | `ab_glyph` (`FontVec`, coverage rasterizer) |
//! | **Shapes** | signed-distance coverage in [`Canvas`] |
//! | **Logo decode + scale** | `image::load_from_memory`, Lanczos3 resize |
//! | **Remote logos** | `reqwest` blocking client with a timeout |
//! | **Encode** | `image` PNG encoder |
//!
//! The module is split into:
//! - **Calculations**: pure geometry (unit testable without pixels)
//! - **Color**: hex colors, gradient stops, paints
//! - **Canvas**: RGBA surface with antialiased primitives
//! - **Typeface**: [`Typeface`] trait + [`GlyphTypeface`]
//! - **Logo**: [`LogoSource`] trait + [`LogoLoader`]
//! - **Backend**: [`RenderBackend`] trait + [`RenderError`]
//! - **Compositor**: the template-driven painter implementing the backend

pub mod backend;
mod calculations;
pub mod canvas;
mod color;
pub mod compositor;
pub mod logo;
pub mod typeface;

pub use backend::{RenderBackend, RenderError};
pub use calculations::Rect;
pub use canvas::Canvas;
pub use color::{Color, GradientStop, Paint};
pub use compositor::{BadgeLayout, CardLayout, Compositor, DeferredCompositor};
pub use logo::{LogoLoader, LogoSource};
pub use typeface::{GlyphTypeface, Typeface};
