//! Template registry: collection → template, accent and badge label.
//!
//! The registry is built once from a [`RenderConfig`] and is read-only
//! afterwards, so one instance can be shared by every concurrent render.
//! Every lookup is total. Unknown collections resolve to the `default`
//! template, the global default accent and a label derived from the slug.
//!
//! The six built-in templates are static descriptions of a card: background,
//! low-opacity pattern and accent shapes, logo placement, text zones and badge
//! styling. The compositor interprets them; nothing here touches pixels.

use crate::config::RenderConfig;
use crate::imaging::{Color, GradientStop, Paint, Rect};
use crate::naming;
use crate::types::{CARD_HEIGHT, CARD_WIDTH, TemplateId};
use std::collections::BTreeMap;

const W: f32 = CARD_WIDTH as f32;
const H: f32 = CARD_HEIGHT as f32;

/// Text zones start left of this margin from the right edge.
const TEXT_MAX_WIDTH: f32 = W - 320.0;

const INK: Color = Color::rgb(0x1a, 0x1a, 0x1a);
const SLATE: Color = Color::rgb(0x4a, 0x55, 0x68);
const MIST: Color = Color::rgb(0xe5, 0xe7, 0xeb);

#[derive(Debug, Clone, PartialEq)]
pub enum BackgroundSpec {
    /// Fixed palette, top-left → bottom-right.
    Gradient(Vec<GradientStop>),
    /// The request's accent color fading into a darker shade of itself.
    AccentGradient { darken: i16 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatternSpec {
    None,
    /// 45° hairlines across the whole card.
    DiagonalLines {
        spacing: u32,
        width: f32,
        color: Color,
    },
    DotGrid {
        spacing: u32,
        radius: f32,
        color: Color,
    },
}

/// Decorative shapes painted after the pattern. They never move text.
#[derive(Debug, Clone, PartialEq)]
pub enum AccentShape {
    Polyline {
        points: Vec<(f32, f32)>,
        width: f32,
        color: Color,
    },
    Ring {
        center: (f32, f32),
        radius: f32,
        width: f32,
        color: Color,
    },
    /// Filled tile with a small calendar glyph on top.
    CalendarTile {
        rect: Rect,
        color: Color,
        glyph: Color,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogoPlacement {
    pub x: f32,
    pub y: f32,
    pub size: u32,
    pub opacity: f32,
    /// Soft disc painted behind the logo.
    pub halo: Option<Color>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TitleZone {
    pub x: f32,
    pub y: f32,
    pub max_width: f32,
    pub max_size: u32,
    pub min_size: u32,
    /// Line height as a multiple of the chosen font size.
    pub line_height_factor: f32,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExcerptZone {
    pub x: f32,
    pub y: f32,
    pub max_width: f32,
    pub font_size: u32,
    pub line_height: f32,
    pub max_lines: usize,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BadgePolicy {
    pub collection_badge: bool,
    pub category_badge: bool,
    pub collection_fill: Paint,
    pub collection_text: Color,
    pub category_text: Color,
}

/// Static visual description of one card style.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub id: TemplateId,
    pub background: BackgroundSpec,
    pub pattern: PatternSpec,
    pub accents: Vec<AccentShape>,
    pub logo: LogoPlacement,
    pub title: TitleZone,
    pub excerpt: ExcerptZone,
    pub badges: BadgePolicy,
}

impl Template {
    /// Built-in description of `id`.
    pub fn builtin(id: TemplateId) -> Self {
        let dark_text = !matches!(id, TemplateId::Default | TemplateId::Blog);
        let (text_x, title_y, excerpt_y) = match id {
            TemplateId::Blog => (220.0, 120.0, 320.0),
            _ => (200.0, 100.0, 300.0),
        };

        Self {
            id,
            background: background(id),
            pattern: pattern(id),
            accents: accents(id),
            logo: logo(id),
            title: TitleZone {
                x: text_x,
                y: title_y,
                max_width: TEXT_MAX_WIDTH,
                max_size: 64,
                min_size: 32,
                line_height_factor: 1.2,
                color: if dark_text { INK } else { Color::WHITE },
            },
            excerpt: ExcerptZone {
                x: text_x,
                y: excerpt_y,
                max_width: TEXT_MAX_WIDTH,
                font_size: 32,
                line_height: 42.0,
                max_lines: 3,
                color: if dark_text { SLATE } else { MIST },
            },
            badges: badges(id),
        }
    }
}

fn hex(r: u8, g: u8, b: u8) -> Color {
    Color::rgb(r, g, b)
}

fn two_stop(from: Color, to: Color) -> Vec<GradientStop> {
    vec![GradientStop::new(0.0, from), GradientStop::new(1.0, to)]
}

fn background(id: TemplateId) -> BackgroundSpec {
    match id {
        TemplateId::Default => BackgroundSpec::AccentGradient { darken: -30 },
        TemplateId::Blog => BackgroundSpec::Gradient(vec![
            GradientStop::new(0.0, hex(0x2d, 0x37, 0x48)),
            GradientStop::new(0.5, hex(0x1a, 0x20, 0x2c)),
            GradientStop::new(1.0, hex(0x0f, 0x14, 0x19)),
        ]),
        TemplateId::Product => {
            BackgroundSpec::Gradient(two_stop(hex(0xf8, 0xfa, 0xfc), hex(0xe2, 0xe8, 0xf0)))
        }
        TemplateId::Service => {
            BackgroundSpec::Gradient(two_stop(hex(0xfe, 0xf7, 0xed), hex(0xfe, 0xd7, 0xaa)))
        }
        TemplateId::Event => {
            BackgroundSpec::Gradient(two_stop(hex(0xfe, 0xf3, 0xc7), hex(0xfb, 0xbf, 0x24)))
        }
        TemplateId::Customer => {
            BackgroundSpec::Gradient(two_stop(hex(0xf0, 0xf9, 0xff), hex(0xba, 0xe6, 0xfd)))
        }
    }
}

fn pattern(id: TemplateId) -> PatternSpec {
    match id {
        TemplateId::Blog => PatternSpec::DiagonalLines {
            spacing: 50,
            width: 1.0,
            color: Color::WHITE.with_opacity(0.05),
        },
        TemplateId::Product => PatternSpec::DotGrid {
            spacing: 80,
            radius: 2.0,
            color: INK.with_opacity(0.05),
        },
        _ => PatternSpec::None,
    }
}

fn accents(id: TemplateId) -> Vec<AccentShape> {
    let faint = |c: Color| c.with_opacity(0.1);
    match id {
        TemplateId::Blog => vec![AccentShape::Polyline {
            points: vec![(W - 100.0, 50.0), (W - 50.0, 50.0), (W - 50.0, 100.0)],
            width: 6.0,
            color: faint(Color::WHITE),
        }],
        TemplateId::Product => vec![AccentShape::Polyline {
            points: vec![(80.0, H - 60.0), (W - 80.0, H - 60.0)],
            width: 8.0,
            color: faint(INK),
        }],
        TemplateId::Service => vec![AccentShape::Ring {
            center: (W - 100.0, H - 100.0),
            radius: 60.0,
            width: 4.0,
            color: faint(hex(0xea, 0x58, 0x0c)),
        }],
        TemplateId::Event => vec![AccentShape::CalendarTile {
            rect: Rect::new(W - 120.0, 60.0, 80.0, 80.0),
            color: faint(hex(0xd9, 0x77, 0x06)),
            glyph: faint(Color::WHITE),
        }],
        TemplateId::Default | TemplateId::Customer => vec![AccentShape::Polyline {
            points: vec![(60.0, H - 40.0), (200.0, H - 40.0)],
            width: 4.0,
            color: faint(Color::WHITE),
        }],
    }
}

fn logo(id: TemplateId) -> LogoPlacement {
    match id {
        TemplateId::Product => LogoPlacement {
            x: 40.0,
            y: 40.0,
            size: 100,
            opacity: 0.8,
            halo: None,
        },
        TemplateId::Blog => LogoPlacement {
            x: 50.0,
            y: 50.0,
            size: 120,
            opacity: 1.0,
            halo: Some(Color::WHITE.with_opacity(0.1)),
        },
        _ => LogoPlacement {
            x: 40.0,
            y: 40.0,
            size: 120,
            opacity: 1.0,
            halo: Some(Color::WHITE.with_opacity(0.1)),
        },
    }
}

fn badges(id: TemplateId) -> BadgePolicy {
    let (collection_fill, collection_text) = match id {
        TemplateId::Product => (
            Paint::Gradient(two_stop(INK, hex(0x37, 0x41, 0x51))),
            Color::WHITE,
        ),
        _ => (
            Paint::Gradient(two_stop(Color::WHITE, hex(0xf3, 0xf4, 0xf6))),
            hex(0x37, 0x41, 0x51),
        ),
    };
    BadgePolicy {
        collection_badge: true,
        category_badge: true,
        collection_fill,
        collection_text,
        category_text: Color::WHITE,
    }
}

/// Per-collection resolution result.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionEntry {
    pub slug: String,
    pub template: TemplateId,
    pub accent: Color,
    pub display_name: String,
}

/// Immutable collection → template lookup.
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    templates: Vec<Template>,
    collections: BTreeMap<String, CollectionEntry>,
    categories: Vec<(String, Color)>,
    default_accent: Color,
}

impl TemplateRegistry {
    pub fn new(config: &RenderConfig) -> Self {
        let default_accent = config.colors.default_accent;
        let collections = config
            .collections
            .iter()
            .map(|(slug, c)| {
                let entry = CollectionEntry {
                    slug: slug.clone(),
                    template: c.template,
                    accent: c.accent.unwrap_or(default_accent),
                    display_name: c
                        .display_name
                        .clone()
                        .unwrap_or_else(|| naming::display_name(slug)),
                };
                (slug.clone(), entry)
            })
            .collect();
        let categories = config
            .colors
            .categories
            .iter()
            .map(|(k, v)| (k.to_lowercase(), *v))
            .collect();

        Self {
            templates: TemplateId::ALL.into_iter().map(Template::builtin).collect(),
            collections,
            categories,
            default_accent,
        }
    }

    /// Template for a collection. Unknown collections get `default`.
    pub fn resolve_template(&self, collection_id: &str) -> &Template {
        self.template(self.template_id_for(collection_id))
    }

    pub fn template_id_for(&self, collection_id: &str) -> TemplateId {
        self.collections
            .get(collection_id)
            .map(|c| c.template)
            .unwrap_or_default()
    }

    pub fn template(&self, id: TemplateId) -> &Template {
        &self.templates[id.index()]
    }

    /// Accent for a collection, or the global default.
    pub fn accent_for(&self, collection_id: &str) -> Color {
        self.collections
            .get(collection_id)
            .map(|c| c.accent)
            .unwrap_or(self.default_accent)
    }

    /// Badge color for a category: exact key, then the first key (in key
    /// order) contained in the category. Matching ignores case.
    pub fn category_color(&self, category: &str) -> Option<Color> {
        let needle = category.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.categories
            .iter()
            .find(|(key, _)| *key == needle)
            .or_else(|| {
                self.categories
                    .iter()
                    .find(|(key, _)| !key.is_empty() && needle.contains(key.as_str()))
            })
            .map(|(_, color)| *color)
    }

    /// Collection badge label.
    pub fn display_name(&self, collection_id: &str) -> String {
        self.collections
            .get(collection_id)
            .map(|c| c.display_name.clone())
            .unwrap_or_else(|| naming::display_name(collection_id))
    }

    /// Known collections in slug order.
    pub fn collections(&self) -> impl Iterator<Item = &CollectionEntry> {
        self.collections.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::stock_defaults;

    fn registry() -> TemplateRegistry {
        TemplateRegistry::new(&stock_defaults())
    }

    #[test]
    fn known_collections_resolve() {
        let r = registry();
        assert_eq!(r.resolve_template("blog-posts").id, TemplateId::Blog);
        assert_eq!(r.resolve_template("gift-cards").id, TemplateId::Product);
        assert_eq!(r.resolve_template("appointments").id, TemplateId::Service);
        assert_eq!(r.resolve_template("promotions").id, TemplateId::Event);
        assert_eq!(r.resolve_template("reviews").id, TemplateId::Customer);
    }

    #[test]
    fn unknown_collection_falls_back_to_default() {
        let r = registry();
        assert_eq!(r.resolve_template("bookings").id, TemplateId::Default);
        assert_eq!(r.resolve_template("").id, TemplateId::Default);
        assert_eq!(r.accent_for("bookings").to_hex(), "#1a202c");
    }

    #[test]
    fn every_template_is_registered_under_its_own_id() {
        let r = registry();
        for id in TemplateId::ALL {
            assert_eq!(r.template(id).id, id);
        }
    }

    #[test]
    fn collection_accent_overrides_default() {
        let mut config = stock_defaults();
        config
            .collections
            .get_mut("events")
            .unwrap()
            .accent = Some(Color::rgb(0xd5, 0x3f, 0x8c));
        let r = TemplateRegistry::new(&config);
        assert_eq!(r.accent_for("events").to_hex(), "#d53f8c");
        assert_eq!(r.accent_for("blog-posts").to_hex(), "#1a202c");
    }

    #[test]
    fn category_color_exact_then_partial() {
        let r = registry();
        assert_eq!(r.category_color("Haircut").unwrap().to_hex(), "#2d3748");
        assert_eq!(r.category_color("BarberShop").unwrap().to_hex(), "#1a365d");
        // "summer sale" contains "sale"
        assert_eq!(r.category_color("Summer Sale").unwrap().to_hex(), "#d69e2e");
        assert_eq!(r.category_color("gardening"), None);
        assert_eq!(r.category_color("  "), None);
    }

    #[test]
    fn partial_match_uses_key_order() {
        let r = registry();
        // Contains both "blog" and "guide"; "blog" sorts first.
        assert_eq!(
            r.category_color("guide to blogging").unwrap().to_hex(),
            "#2d3748"
        );
    }

    #[test]
    fn display_names() {
        let r = registry();
        assert_eq!(r.display_name("testimonials"), "Review");
        assert_eq!(r.display_name("gift-cards"), "Gift cards");
        assert_eq!(r.display_name("walk-ins"), "Walk ins");
    }

    #[test]
    fn blog_template_geometry() {
        let t = Template::builtin(TemplateId::Blog);
        assert_eq!((t.title.x, t.title.y), (220.0, 120.0));
        assert_eq!((t.excerpt.x, t.excerpt.y), (220.0, 320.0));
        assert_eq!((t.logo.x, t.logo.y, t.logo.size), (50.0, 50.0, 120));
        assert_eq!(t.title.max_width, 880.0);
        assert!(matches!(t.pattern, PatternSpec::DiagonalLines { spacing: 50, .. }));
    }

    #[test]
    fn product_template_is_dark_on_light() {
        let t = Template::builtin(TemplateId::Product);
        assert_eq!(t.title.color, INK);
        assert_eq!(t.logo.opacity, 0.8);
        assert!(t.logo.halo.is_none());
        assert_eq!(t.badges.collection_text, Color::WHITE);
    }

    #[test]
    fn default_template_uses_accent_background() {
        let t = Template::builtin(TemplateId::Default);
        assert_eq!(t.background, BackgroundSpec::AccentGradient { darken: -30 });
        assert_eq!(t.title.color, Color::WHITE);
    }
}
