//! Typefaces: text measurement plus glyph painting.
//!
//! A [`Typeface`] is the compositor's measuring stick and pen. The measuring
//! half ([`TextMeasure`]) is all the typography engine ever sees.
//!
//! [`GlyphTypeface`] loads a bold and a regular TrueType/OpenType face with
//! `ab_glyph` and rasterizes outlines with per-pixel coverage. Text is
//! positioned from the top of its line box: the baseline sits one ascent
//! below `y`.

use super::backend::RenderError;
use super::canvas::Canvas;
use super::color::Color;
use crate::typography::{FontSpec, FontWeight, TextMeasure};
use ab_glyph::{Font, FontVec, GlyphId, PxScale, ScaleFont, point};
use std::path::Path;

pub trait Typeface: TextMeasure + Send + Sync {
    /// Paint `text` with the top of its line box at `(x, y)`.
    fn draw_text(&self, canvas: &mut Canvas, text: &str, font: FontSpec, x: f32, y: f32, color: Color);

    /// Height of one line box (ascent plus descent).
    fn line_height(&self, font: FontSpec) -> f32 {
        font.size as f32
    }
}

pub struct GlyphTypeface {
    bold: FontVec,
    regular: FontVec,
}

impl GlyphTypeface {
    pub fn from_bytes(bold: Vec<u8>, regular: Vec<u8>) -> Result<Self, RenderError> {
        let parse = |bytes: Vec<u8>, which: &str| {
            FontVec::try_from_vec(bytes)
                .map_err(|e| RenderError::Font(format!("invalid {which} font: {e}")))
        };
        Ok(Self {
            bold: parse(bold, "bold")?,
            regular: parse(regular, "regular")?,
        })
    }

    pub fn load(bold: &Path, regular: &Path) -> Result<Self, RenderError> {
        let read = |path: &Path| {
            std::fs::read(path).map_err(|e| {
                RenderError::Font(format!("failed to read {}: {e}", path.display()))
            })
        };
        Self::from_bytes(read(bold)?, read(regular)?)
    }

    fn face(&self, weight: FontWeight) -> &FontVec {
        match weight {
            FontWeight::Bold => &self.bold,
            FontWeight::Regular => &self.regular,
        }
    }
}

impl TextMeasure for GlyphTypeface {
    fn measure_width(&self, text: &str, font: FontSpec) -> f32 {
        let scaled = self.face(font.weight).as_scaled(PxScale::from(font.size as f32));
        let mut width = 0.0;
        let mut previous: Option<GlyphId> = None;
        for c in text.chars() {
            let id = scaled.glyph_id(c);
            if let Some(prev) = previous {
                width += scaled.kern(prev, id);
            }
            width += scaled.h_advance(id);
            previous = Some(id);
        }
        width
    }
}

impl Typeface for GlyphTypeface {
    fn line_height(&self, font: FontSpec) -> f32 {
        let scaled = self.face(font.weight).as_scaled(PxScale::from(font.size as f32));
        scaled.ascent() - scaled.descent()
    }

    fn draw_text(&self, canvas: &mut Canvas, text: &str, font: FontSpec, x: f32, y: f32, color: Color) {
        let face = self.face(font.weight);
        let scale = PxScale::from(font.size as f32);
        let scaled = face.as_scaled(scale);
        let mut caret = point(x, y + scaled.ascent());
        let mut previous: Option<GlyphId> = None;

        for c in text.chars() {
            let id = scaled.glyph_id(c);
            if let Some(prev) = previous {
                caret.x += scaled.kern(prev, id);
            }
            let glyph = id.with_scale_and_position(scale, caret);
            caret.x += scaled.h_advance(id);
            previous = Some(id);

            if let Some(outlined) = face.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                let (left, top) = (bounds.min.x as i32, bounds.min.y as i32);
                outlined.draw(|gx, gy, coverage| {
                    canvas.blend_pixel(left + gx as i32, top + gy as i32, color, coverage);
                });
            }
        }
    }
}
