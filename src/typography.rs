//! Adaptive typography: font-size search and greedy line wrapping.
//!
//! Both algorithms are pure. They only see text through a [`TextMeasure`],
//! which the rendering backend supplies (glyph advances for real fonts, a
//! fixed advance in tests), so they can be exercised without rasterizing
//! anything.
//!
//! ## Font size search
//!
//! [`optimal_font_size`] starts at the largest allowed size and steps down by
//! [`FONT_SIZE_STEP`] until the text fits or the floor is hit. Hitting the
//! floor with text that still overflows is accepted: the caller wraps it.
//!
//! ## Wrapping
//!
//! [`wrap_text`] packs whitespace-delimited words greedily. A word that is wider
//! than the line on its own still gets its own line (words are never split).
//! With a line limit, the last kept line gets a literal `...` when words are
//! left over:
//!
//! ```text
//! max_lines = 2
//! "the quick brown fox jumps over the lazy dog"
//!   → ["the quick brown", "fox jumps over..."]
//! ```

/// Font-size decrement used by [`optimal_font_size`], in pixels.
pub const FONT_SIZE_STEP: u32 = 2;

/// Suffix appended to the last line when wrapping drops words.
pub const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FontWeight {
    #[default]
    Regular,
    Bold,
}

/// Weight plus pixel size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FontSpec {
    pub weight: FontWeight,
    pub size: u32,
}

impl FontSpec {
    pub fn bold(size: u32) -> Self {
        Self {
            weight: FontWeight::Bold,
            size,
        }
    }

    pub fn regular(size: u32) -> Self {
        Self {
            weight: FontWeight::Regular,
            size,
        }
    }
}

/// Text measurement capability supplied by a rendering backend.
///
/// Implementations must be deterministic: the same text and font always
/// measure the same.
pub trait TextMeasure {
    /// Advance width of `text` set in `font`, in pixels.
    fn measure_width(&self, text: &str, font: FontSpec) -> f32;
}

impl<T: TextMeasure + ?Sized> TextMeasure for &T {
    fn measure_width(&self, text: &str, font: FontSpec) -> f32 {
        (**self).measure_width(text, font)
    }
}

/// Find the largest size in `min_size..=max_size` (stepping by
/// [`FONT_SIZE_STEP`] from the top) at which `text` fits in `max_width`.
///
/// Returns `min_size` when nothing fits. An inverted range is treated as the
/// single size `min_size`.
pub fn optimal_font_size<M: TextMeasure + ?Sized>(
    measure: &M,
    text: &str,
    weight: FontWeight,
    max_size: u32,
    min_size: u32,
    max_width: f32,
) -> u32 {
    let mut size = max_size.max(min_size);
    while size > min_size
        && measure.measure_width(
            text,
            FontSpec {
                weight,
                size,
            },
        ) > max_width
    {
        size = size.saturating_sub(FONT_SIZE_STEP).max(min_size);
    }
    size
}

/// A wrapped line and where to paint it.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub x: f32,
    pub y: f32,
}

/// Result of [`wrap_text`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WrappedText {
    pub lines: Vec<TextLine>,
    /// True when words were dropped because of the line limit.
    pub truncated: bool,
}

impl WrappedText {
    pub fn texts(&self) -> Vec<&str> {
        self.lines.iter().map(|l| l.text.as_str()).collect()
    }
}

/// Layout box for [`wrap_text`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WrapBox {
    pub x: f32,
    pub y: f32,
    pub max_width: f32,
    pub line_height: f32,
    /// `None` means unbounded.
    pub max_lines: Option<usize>,
}

/// Greedy word wrap with optional truncation.
///
/// Lines are placed top-down from `(x, y)`, `line_height` apart. When the line
/// limit is reached with words left over, the last line is trimmed, suffixed
/// with [`ELLIPSIS`], and wrapping stops. If the suffix pushes that line past
/// `max_width`, trailing words are dropped until it fits (the first word of
/// the line is always kept).
pub fn wrap_text<M: TextMeasure + ?Sized>(
    measure: &M,
    text: &str,
    font: FontSpec,
    layout: WrapBox,
) -> WrappedText {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut raw_lines: Vec<String> = Vec::new();
    let mut truncated = false;

    if layout.max_lines != Some(0) {
        let mut line = String::new();
        for word in &words {
            if line.is_empty() {
                line.push_str(word);
                continue;
            }
            let candidate = format!("{line} {word}");
            if measure.measure_width(&candidate, font) <= layout.max_width {
                line = candidate;
                continue;
            }

            raw_lines.push(std::mem::take(&mut line));
            if layout.max_lines == Some(raw_lines.len()) {
                // `word` and everything after it is unconsumed.
                truncated = true;
                break;
            }
            line.push_str(word);
        }
        if !line.is_empty() {
            raw_lines.push(line);
        }
    } else {
        truncated = !words.is_empty();
    }

    if truncated && let Some(last) = raw_lines.pop() {
        raw_lines.push(with_ellipsis(measure, &last, font, layout.max_width));
    }

    let lines = raw_lines
        .into_iter()
        .enumerate()
        .map(|(i, text)| TextLine {
            text,
            x: layout.x,
            y: layout.y + i as f32 * layout.line_height,
        })
        .collect();

    WrappedText { lines, truncated }
}

/// Single-line fit: `text` as is when it fits `max_width`, otherwise cut
/// character by character and suffixed with [`ELLIPSIS`] until it does.
/// Empty when not even the ellipsis fits.
pub fn fit_line<M: TextMeasure + ?Sized>(
    measure: &M,
    text: &str,
    font: FontSpec,
    max_width: f32,
) -> String {
    if measure.measure_width(text, font) <= max_width {
        return text.to_string();
    }
    let mut chars: Vec<char> = text.chars().collect();
    while chars.pop().is_some() {
        let kept: String = chars.iter().collect();
        let candidate = format!("{}{ELLIPSIS}", kept.trim_end());
        if measure.measure_width(&candidate, font) <= max_width {
            return candidate;
        }
    }
    String::new()
}

fn with_ellipsis<M: TextMeasure + ?Sized>(
    measure: &M,
    line: &str,
    font: FontSpec,
    max_width: f32,
) -> String {
    let mut words: Vec<&str> = line.split_whitespace().collect();
    loop {
        let candidate = format!("{}{ELLIPSIS}", words.join(" ").trim_end());
        if words.len() <= 1 || measure.measure_width(&candidate, font) <= max_width {
            return candidate;
        }
        words.pop();
    }
}
