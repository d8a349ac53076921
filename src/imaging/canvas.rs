//! RGBA drawing surface used by the compositor.
//!
//! Every primitive composites source-over with antialiased coverage, so
//! translucent accents layer the way a 2D canvas with `globalAlpha` would.

use super::backend::RenderError;
use super::calculations::{
    Rect, diagonal_position, distance_to_segment, edge_coverage, pixel_bounds,
    rounded_rect_distance,
};
use super::color::{Color, GradientStop, Paint, sample_gradient};
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;

pub struct Canvas {
    image: RgbaImage,
}

impl Canvas {
    /// Fully transparent canvas.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn pixel(&self, x: u32, y: u32) -> Color {
        let [r, g, b, a] = self.image.get_pixel(x, y).0;
        Color { r, g, b, a }
    }

    /// Composite `color` onto one pixel with the given coverage (0.0..=1.0).
    /// Out-of-bounds coordinates are ignored.
    pub fn blend_pixel(&mut self, x: i32, y: i32, color: Color, coverage: f32) {
        if x < 0 || y < 0 || x as u32 >= self.width() || y as u32 >= self.height() {
            return;
        }
        let src_a = color.a as f32 / 255.0 * coverage.clamp(0.0, 1.0);
        if src_a <= 0.0 {
            return;
        }
        let px = self.image.get_pixel_mut(x as u32, y as u32);
        let [dr, dg, db, da] = px.0;
        let dst_a = da as f32 / 255.0;
        let out_a = src_a + dst_a * (1.0 - src_a);
        let mix = |s: u8, d: u8| {
            ((s as f32 * src_a + d as f32 * dst_a * (1.0 - src_a)) / out_a).round() as u8
        };
        px.0 = [
            mix(color.r, dr),
            mix(color.g, dg),
            mix(color.b, db),
            (out_a * 255.0).round() as u8,
        ];
    }

    /// Paint the whole canvas with a top-left → bottom-right gradient.
    pub fn fill_gradient(&mut self, stops: &[GradientStop]) {
        let (w, h) = (self.width() as f32, self.height() as f32);
        for (x, y, px) in self.image.enumerate_pixels_mut() {
            let t = diagonal_position(x as f32 + 0.5, y as f32 + 0.5, w, h);
            *px = sample_gradient(stops, t).to_rgba();
        }
    }

    /// Fill a rectangle with rounded corners. Gradient paints run along the
    /// rectangle's own diagonal.
    pub fn fill_rounded_rect(&mut self, rect: Rect, radius: f32, paint: &Paint) {
        let (x0, y0, x1, y1) = pixel_bounds(rect, 1.0, self.width(), self.height());
        for y in y0..y1 {
            for x in x0..x1 {
                let p = (x as f32 + 0.5, y as f32 + 0.5);
                let coverage = edge_coverage(rounded_rect_distance(p, rect, radius));
                if coverage <= 0.0 {
                    continue;
                }
                let color = match paint {
                    Paint::Solid(color) => *color,
                    Paint::Gradient(stops) => {
                        let t = diagonal_position(p.0 - rect.x, p.1 - rect.y, rect.width, rect.height);
                        sample_gradient(stops, t)
                    }
                };
                self.blend_pixel(x as i32, y as i32, color, coverage);
            }
        }
    }

    pub fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.fill_rounded_rect(rect, 0.0, &Paint::Solid(color));
    }

    /// Stroke connected segments with round joins and caps. Overlapping
    /// segments do not double up the alpha.
    pub fn stroke_polyline(&mut self, points: &[(f32, f32)], width: f32, color: Color) {
        let Some(bounds) = polyline_bounds(points) else {
            return;
        };
        let half = width / 2.0;
        let (x0, y0, x1, y1) = pixel_bounds(bounds, half + 1.0, self.width(), self.height());
        for y in y0..y1 {
            for x in x0..x1 {
                let p = (x as f32 + 0.5, y as f32 + 0.5);
                let distance = if points.len() == 1 {
                    distance_to_segment(p, points[0], points[0])
                } else {
                    points
                        .windows(2)
                        .map(|seg| distance_to_segment(p, seg[0], seg[1]))
                        .fold(f32::INFINITY, f32::min)
                };
                let coverage = edge_coverage(distance - half);
                if coverage > 0.0 {
                    self.blend_pixel(x as i32, y as i32, color, coverage);
                }
            }
        }
    }

    pub fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), width: f32, color: Color) {
        self.stroke_polyline(&[from, to], width, color);
    }

    /// Stroke a circle outline centered on `radius`.
    pub fn stroke_circle(&mut self, center: (f32, f32), radius: f32, width: f32, color: Color) {
        let half = width / 2.0;
        let outer = radius + half;
        let bounds = Rect::new(center.0 - outer, center.1 - outer, 2.0 * outer, 2.0 * outer);
        let (x0, y0, x1, y1) = pixel_bounds(bounds, 1.0, self.width(), self.height());
        for y in y0..y1 {
            for x in x0..x1 {
                let d = distance_to_segment((x as f32 + 0.5, y as f32 + 0.5), center, center);
                let coverage = edge_coverage((d - radius).abs() - half);
                if coverage > 0.0 {
                    self.blend_pixel(x as i32, y as i32, color, coverage);
                }
            }
        }
    }

    pub fn fill_circle(&mut self, center: (f32, f32), radius: f32, color: Color) {
        let bounds = Rect::new(center.0 - radius, center.1 - radius, 2.0 * radius, 2.0 * radius);
        let (x0, y0, x1, y1) = pixel_bounds(bounds, 1.0, self.width(), self.height());
        for y in y0..y1 {
            for x in x0..x1 {
                let d = distance_to_segment((x as f32 + 0.5, y as f32 + 0.5), center, center);
                let coverage = edge_coverage(d - radius);
                if coverage > 0.0 {
                    self.blend_pixel(x as i32, y as i32, color, coverage);
                }
            }
        }
    }

    /// Composite an image with its top-left corner at `(x, y)`.
    pub fn draw_image(&mut self, source: &RgbaImage, x: i32, y: i32, opacity: f32) {
        for (sx, sy, px) in source.enumerate_pixels() {
            let [r, g, b, a] = px.0;
            self.blend_pixel(
                x + sx as i32,
                y + sy as i32,
                Color { r, g, b, a },
                opacity,
            );
        }
    }

    /// Encode the canvas as PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>, RenderError> {
        let mut bytes = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }
}

fn polyline_bounds(points: &[(f32, f32)]) -> Option<Rect> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.0, first.1, first.0, first.1);
    for &(x, y) in points {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    Some(Rect::new(min_x, min_y, max_x - min_x, max_y - min_y))
}
