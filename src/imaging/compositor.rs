//! Layout compositor: paints one 1200×630 card from a request and a template.
//!
//! Painting always follows the same order, so later layers sit on top of
//! earlier ones:
//!
//! 1. background gradient and low-opacity pattern
//! 2. accent shapes
//! 3. logo (skipped silently when it cannot be loaded)
//! 4. collection badge
//! 5. category badge
//! 6. title, at the largest size that fits, wrapped without a line limit
//! 7. excerpt, at a fixed size, wrapped to the zone's line limit
//!
//! Text placement is computed up front by [`Compositor::layout`], which is
//! pure and can be inspected without painting.

use super::backend::{RenderBackend, RenderError};
use super::calculations::{Rect, badge_width, centered, diagonal_lines, dot_grid};
use super::canvas::Canvas;
use super::color::{Color, GradientStop, Paint};
use super::logo::{LogoLoader, LogoSource};
use super::typeface::{GlyphTypeface, Typeface};
use crate::config::RenderConfig;
use crate::registry::{AccentShape, BackgroundSpec, LogoPlacement, PatternSpec, Template};
use crate::types::{CARD_HEIGHT, CARD_WIDTH, RenderRequest};
use crate::typography::{
    FontSpec, FontWeight, WrapBox, WrappedText, fit_line, optimal_font_size, wrap_text,
};
use image::imageops::{self, FilterType};
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

const W: f32 = CARD_WIDTH as f32;
const H: f32 = CARD_HEIGHT as f32;

const BADGE_RADIUS: f32 = 8.0;

const COLLECTION_BADGE_FONT: u32 = 20;
const COLLECTION_BADGE_PADDING: f32 = 60.0;
const COLLECTION_BADGE_MAX_WIDTH: f32 = 300.0;
const COLLECTION_BADGE_HEIGHT: f32 = 50.0;

const CATEGORY_BADGE_FONT: u32 = 18;
const CATEGORY_BADGE_PADDING: f32 = 40.0;
const CATEGORY_BADGE_MAX_WIDTH: f32 = 250.0;
const CATEGORY_BADGE_HEIGHT: f32 = 45.0;

/// A badge rectangle and its centered label.
#[derive(Debug, Clone, PartialEq)]
pub struct BadgeLayout {
    pub rect: Rect,
    pub label: String,
    pub font: FontSpec,
    pub label_x: f32,
    pub label_y: f32,
}

/// Where every piece of text on a card goes.
#[derive(Debug, Clone, PartialEq)]
pub struct CardLayout {
    pub title_font: FontSpec,
    pub title: WrappedText,
    pub excerpt_font: FontSpec,
    /// `None` when the request has no excerpt.
    pub excerpt: Option<WrappedText>,
    pub collection_badge: Option<BadgeLayout>,
    pub category_badge: Option<BadgeLayout>,
}

pub struct Compositor {
    typeface: Box<dyn Typeface>,
    logos: Box<dyn LogoSource>,
}

impl Compositor {
    pub fn new(typeface: Box<dyn Typeface>, logos: Box<dyn LogoSource>) -> Self {
        Self { typeface, logos }
    }

    /// Glyph typeface from the configured font files, logos resolved under
    /// the public root.
    pub fn from_config(config: &RenderConfig) -> Result<Self, RenderError> {
        let typeface = GlyphTypeface::load(
            Path::new(&config.fonts.bold),
            Path::new(&config.fonts.regular),
        )?;
        let logos = LogoLoader::new(
            &config.output.public_root,
            Duration::from_millis(config.logo.fetch_timeout_ms),
        );
        Ok(Self::new(Box::new(typeface), Box::new(logos)))
    }

    /// Compute text placement for a card.
    pub fn layout(&self, request: &RenderRequest, template: &Template) -> CardLayout {
        let face = self.typeface.as_ref();

        let zone = &template.title;
        let title_size = optimal_font_size(
            face,
            &request.title,
            FontWeight::Bold,
            zone.max_size,
            zone.min_size,
            zone.max_width,
        );
        let title_font = FontSpec::bold(title_size);
        let title = wrap_text(
            face,
            &request.title,
            title_font,
            WrapBox {
                x: zone.x,
                y: zone.y,
                max_width: zone.max_width,
                line_height: title_size as f32 * zone.line_height_factor,
                max_lines: None,
            },
        );

        let ez = &template.excerpt;
        let excerpt_font = FontSpec::regular(ez.font_size);
        let excerpt = (!request.excerpt.trim().is_empty()).then(|| {
            wrap_text(
                face,
                &request.excerpt,
                excerpt_font,
                WrapBox {
                    x: ez.x,
                    y: ez.y,
                    max_width: ez.max_width,
                    line_height: ez.line_height,
                    max_lines: Some(ez.max_lines),
                },
            )
        });

        let label = request.collection_label.trim();
        let collection_badge = (template.badges.collection_badge && !label.is_empty()).then(|| {
            let font = FontSpec::bold(COLLECTION_BADGE_FONT);
            let width = badge_width(
                face.measure_width(label, font),
                COLLECTION_BADGE_PADDING,
                COLLECTION_BADGE_MAX_WIDTH,
            );
            let rect = Rect::new(W - width - 40.0, 50.0, width, COLLECTION_BADGE_HEIGHT);
            self.badge(rect, label, font, COLLECTION_BADGE_PADDING)
        });

        let category = request.category.trim();
        let category_badge = (template.badges.category_badge && !category.is_empty()).then(|| {
            let font = FontSpec::bold(CATEGORY_BADGE_FONT);
            let label = category.to_uppercase();
            let width = badge_width(
                face.measure_width(&label, font),
                CATEGORY_BADGE_PADDING,
                CATEGORY_BADGE_MAX_WIDTH,
            );
            let rect = Rect::new(
                60.0,
                H - CATEGORY_BADGE_HEIGHT - 60.0,
                width,
                CATEGORY_BADGE_HEIGHT,
            );
            self.badge(rect, &label, font, CATEGORY_BADGE_PADDING)
        });

        CardLayout {
            title_font,
            title,
            excerpt_font,
            excerpt,
            collection_badge,
            category_badge,
        }
    }

    /// Labels wider than the capped pill are cut to fit inside its padding.
    fn badge(&self, rect: Rect, label: &str, font: FontSpec, padding: f32) -> BadgeLayout {
        let label = fit_line(self.typeface.as_ref(), label, font, rect.width - padding);
        let label_width = self.typeface.measure_width(&label, font);
        BadgeLayout {
            label_x: centered(rect.x, rect.width, label_width),
            label_y: centered(rect.y, rect.height, self.typeface.line_height(font)),
            rect,
            label,
            font,
        }
    }

    /// Paint a card. Never fails: a missing logo is skipped and text that
    /// cannot fit is clipped by the canvas edge.
    pub fn compose(&self, request: &RenderRequest, template: &Template) -> Canvas {
        let layout = self.layout(request, template);
        let mut canvas = Canvas::new(CARD_WIDTH, CARD_HEIGHT);

        paint_background(&mut canvas, &template.background, request.category_color);
        paint_pattern(&mut canvas, &template.pattern);
        for accent in &template.accents {
            paint_accent(&mut canvas, accent);
        }
        self.paint_logo(&mut canvas, &request.logo_ref, &template.logo);

        if let Some(badge) = &layout.collection_badge {
            canvas.fill_rounded_rect(badge.rect, BADGE_RADIUS, &template.badges.collection_fill);
            self.paint_label(&mut canvas, badge, template.badges.collection_text);
        }
        if let Some(badge) = &layout.category_badge {
            canvas.fill_rounded_rect(badge.rect, BADGE_RADIUS, &Paint::Solid(request.category_color));
            self.paint_label(&mut canvas, badge, template.badges.category_text);
        }

        self.paint_lines(&mut canvas, &layout.title, layout.title_font, template.title.color);
        if let Some(excerpt) = &layout.excerpt {
            self.paint_lines(&mut canvas, excerpt, layout.excerpt_font, template.excerpt.color);
        }

        canvas
    }

    fn paint_logo(&self, canvas: &mut Canvas, logo_ref: &str, placement: &LogoPlacement) {
        let Some(logo) = self.logos.load(logo_ref) else {
            return;
        };
        let size = placement.size as f32;
        if let Some(halo) = placement.halo {
            let center = (placement.x + size / 2.0, placement.y + size / 2.0);
            canvas.fill_circle(center, size / 2.0 + 10.0, halo);
        }
        let scaled = imageops::resize(&logo, placement.size, placement.size, FilterType::Lanczos3);
        canvas.draw_image(
            &scaled,
            placement.x.round() as i32,
            placement.y.round() as i32,
            placement.opacity,
        );
    }

    fn paint_label(&self, canvas: &mut Canvas, badge: &BadgeLayout, color: Color) {
        self.typeface
            .draw_text(canvas, &badge.label, badge.font, badge.label_x, badge.label_y, color);
    }

    fn paint_lines(&self, canvas: &mut Canvas, text: &WrappedText, font: FontSpec, color: Color) {
        for line in &text.lines {
            self.typeface
                .draw_text(canvas, &line.text, font, line.x, line.y, color);
        }
    }
}

impl RenderBackend for Compositor {
    fn render(&self, request: &RenderRequest, template: &Template) -> Result<Vec<u8>, RenderError> {
        self.compose(request, template).encode_png()
    }
}

/// [`Compositor::from_config`] run by the first render instead of up front.
/// A load failure is kept and reported by every render.
pub struct DeferredCompositor {
    config: RenderConfig,
    loaded: OnceLock<Result<Compositor, String>>,
}

impl DeferredCompositor {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            config: config.clone(),
            loaded: OnceLock::new(),
        }
    }

    fn compositor(&self) -> Result<&Compositor, RenderError> {
        self.loaded
            .get_or_init(|| {
                Compositor::from_config(&self.config).map_err(|e| match e {
                    RenderError::Font(message) => message,
                    other => other.to_string(),
                })
            })
            .as_ref()
            .map_err(|message| RenderError::Font(message.clone()))
    }
}

impl RenderBackend for DeferredCompositor {
    fn render(&self, request: &RenderRequest, template: &Template) -> Result<Vec<u8>, RenderError> {
        self.compositor()?.render(request, template)
    }
}

fn paint_background(canvas: &mut Canvas, background: &BackgroundSpec, accent: Color) {
    match background {
        BackgroundSpec::Gradient(stops) => canvas.fill_gradient(stops),
        BackgroundSpec::AccentGradient { darken } => canvas.fill_gradient(&[
            GradientStop::new(0.0, accent),
            GradientStop::new(1.0, accent.adjust(*darken)),
        ]),
    }
}

fn paint_pattern(canvas: &mut Canvas, pattern: &PatternSpec) {
    match *pattern {
        PatternSpec::None => {}
        PatternSpec::DiagonalLines {
            spacing,
            width,
            color,
        } => {
            for (from, to) in diagonal_lines(canvas.width(), canvas.height(), spacing) {
                canvas.stroke_line(from, to, width, color);
            }
        }
        PatternSpec::DotGrid {
            spacing,
            radius,
            color,
        } => {
            for center in dot_grid(canvas.width(), canvas.height(), spacing) {
                canvas.fill_circle(center, radius, color);
            }
        }
    }
}

fn paint_accent(canvas: &mut Canvas, accent: &AccentShape) {
    match accent {
        AccentShape::Polyline {
            points,
            width,
            color,
        } => canvas.stroke_polyline(points, *width, *color),
        AccentShape::Ring {
            center,
            radius,
            width,
            color,
        } => canvas.stroke_circle(*center, *radius, *width, *color),
        AccentShape::CalendarTile { rect, color, glyph } => {
            canvas.fill_rounded_rect(*rect, 6.0, &Paint::Solid(*color));
            paint_calendar_glyph(canvas, *rect, *glyph);
        }
    }
}

/// Small calendar icon centered in `tile`: outlined page, header band,
/// two binder rings and a 3×2 grid of day dots.
fn paint_calendar_glyph(canvas: &mut Canvas, tile: Rect, color: Color) {
    let page = tile.inset(tile.width * 0.25);
    let (l, t, r, b) = (page.x, page.y, page.right(), page.bottom());
    canvas.stroke_polyline(&[(l, t), (r, t), (r, b), (l, b), (l, t)], 2.0, color);
    canvas.fill_rect(Rect::new(l, t, page.width, page.height * 0.25), color);
    for ring_x in [l + page.width * 0.3, l + page.width * 0.7] {
        canvas.stroke_line((ring_x, t - 5.0), (ring_x, t + 4.0), 3.0, color);
    }
    let cell_w = page.width / 4.0;
    let cell_h = page.height * 0.75 / 3.0;
    for row in 1..=2 {
        for col in 1..=3 {
            let center = (l + col as f32 * cell_w, t + page.height * 0.25 + row as f32 * cell_h);
            canvas.fill_circle(center, 1.5, color);
        }
    }
}
