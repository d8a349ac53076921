//! Markdown → plain, measurable text.
//!
//! Excerpts and bodies may be authored in Markdown. Cards only lay out plain
//! text, so emphasis, links and code spans keep their text and lose their
//! markers, block boundaries become single spaces, and raw HTML is dropped.

use pulldown_cmark::{Event, Parser, TagEnd};

/// Characters of body text used when an entity has no excerpt.
pub const BODY_EXCERPT_CHARS: usize = 150;

/// Strip Markdown to whitespace-normalized plain text.
pub fn to_plain_text(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    for event in Parser::new(markdown) {
        match event {
            Event::Text(text) | Event::Code(text) => out.push_str(&text),
            Event::SoftBreak | Event::HardBreak | Event::Rule => out.push(' '),
            Event::End(
                TagEnd::Paragraph
                | TagEnd::Heading(_)
                | TagEnd::Item
                | TagEnd::CodeBlock
                | TagEnd::TableCell,
            ) => out.push(' '),
            _ => {}
        }
    }
    collapse_whitespace(&out)
}

/// First `max` characters of `text` (never splits a character).
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte, _)) => text[..byte].to_string(),
        None => text.to_string(),
    }
}

/// Excerpt taken from a long-form body.
pub fn body_excerpt(body: &str) -> String {
    truncate_chars(&to_plain_text(body), BODY_EXCERPT_CHARS)
        .trim_end()
        .to_string()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(to_plain_text("Fresh cuts daily"), "Fresh cuts daily");
    }

    #[test]
    fn emphasis_markers_are_removed() {
        assert_eq!(
            to_plain_text("The **best** fade in *town*"),
            "The best fade in town"
        );
    }

    #[test]
    fn links_keep_their_text() {
        assert_eq!(
            to_plain_text("Book [online](https://example.com) today"),
            "Book online today"
        );
    }

    #[test]
    fn blocks_are_joined_with_spaces() {
        let md = "# Heading\n\nFirst paragraph.\n\n- one\n- two\n";
        assert_eq!(to_plain_text(md), "Heading First paragraph. one two");
    }

    #[test]
    fn inline_code_keeps_text() {
        assert_eq!(to_plain_text("Use `pomade` sparingly"), "Use pomade sparingly");
    }

    #[test]
    fn empty_input() {
        assert_eq!(to_plain_text(""), "");
        assert_eq!(to_plain_text("   \n\n  "), "");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 7), "héllo w");
        assert_eq!(truncate_chars("short", 150), "short");
    }

    #[test]
    fn body_excerpt_is_capped() {
        let body = "word ".repeat(100);
        let excerpt = body_excerpt(&body);
        assert!(excerpt.chars().count() <= BODY_EXCERPT_CHARS);
        assert!(!excerpt.ends_with(' '));
    }
}
