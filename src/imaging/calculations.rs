//! Pure geometry for the compositor.
//!
//! All functions here are pure and testable without any pixels. Shapes are
//! antialiased by turning a signed distance into pixel coverage: a pixel
//! whose center lies on the shape edge gets 50% coverage.

/// Axis-aligned rectangle in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn inset(&self, by: f32) -> Self {
        Self::new(
            self.x + by,
            self.y + by,
            (self.width - 2.0 * by).max(0.0),
            (self.height - 2.0 * by).max(0.0),
        )
    }
}

/// Integer pixel range `[x0, x1) × [y0, y1)` covering `rect` grown by `pad`,
/// clipped to a `width × height` canvas.
pub fn pixel_bounds(rect: Rect, pad: f32, width: u32, height: u32) -> (u32, u32, u32, u32) {
    let clip = |v: f32, max: u32| v.clamp(0.0, max as f32) as u32;
    (
        clip((rect.x - pad).floor(), width),
        clip((rect.y - pad).floor(), height),
        clip((rect.right() + pad).ceil(), width),
        clip((rect.bottom() + pad).ceil(), height),
    )
}

/// Position along the top-left → bottom-right diagonal of a `width × height`
/// box, 0.0 at the top-left corner and 1.0 at the bottom-right.
pub fn diagonal_position(x: f32, y: f32, width: f32, height: f32) -> f32 {
    let len_sq = width * width + height * height;
    if len_sq <= 0.0 {
        return 0.0;
    }
    ((x * width + y * height) / len_sq).clamp(0.0, 1.0)
}

/// Shortest distance from `p` to the segment `a`–`b`.
pub fn distance_to_segment(p: (f32, f32), a: (f32, f32), b: (f32, f32)) -> f32 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq > 0.0 {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (cx, cy) = (a.0 + t * dx, a.1 + t * dy);
    ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt()
}

/// Coverage of a pixel whose center is `distance` outside a shape edge
/// (negative = inside).
pub fn edge_coverage(distance: f32) -> f32 {
    (0.5 - distance).clamp(0.0, 1.0)
}

/// Signed distance from `p` to a rectangle with rounded corners.
pub fn rounded_rect_distance(p: (f32, f32), rect: Rect, radius: f32) -> f32 {
    let radius = radius.min(rect.width / 2.0).min(rect.height / 2.0).max(0.0);
    let (cx, cy) = rect.center();
    let qx = (p.0 - cx).abs() - rect.width / 2.0 + radius;
    let qy = (p.1 - cy).abs() - rect.height / 2.0 + radius;
    let outside = (qx.max(0.0).powi(2) + qy.max(0.0).powi(2)).sqrt();
    outside + qx.max(qy).min(0.0) - radius
}

/// Width of a pill badge: label plus padding, capped at `max`.
pub fn badge_width(label_width: f32, padding: f32, max: f32) -> f32 {
    (label_width + padding).min(max)
}

/// Start offset that centers `inner` within `outer` starting at `start`.
pub fn centered(start: f32, outer: f32, inner: f32) -> f32 {
    start + (outer - inner) / 2.0
}

/// Parallel 45° lines spaced `spacing` apart that cover the canvas.
pub fn diagonal_lines(width: u32, height: u32, spacing: u32) -> Vec<((f32, f32), (f32, f32))> {
    let (w, h) = (width as i64, height as i64);
    let step = spacing.max(1) as usize;
    (-h..w)
        .step_by(step)
        .map(|i| ((i as f32, 0.0), ((i + h) as f32, h as f32)))
        .collect()
}

/// Dot centers on a regular grid starting at the origin.
pub fn dot_grid(width: u32, height: u32, spacing: u32) -> Vec<(f32, f32)> {
    let step = spacing.max(1) as usize;
    (0..width)
        .step_by(step)
        .flat_map(|x| (0..height).step_by(step).map(move |y| (x as f32, y as f32)))
        .collect()
}
