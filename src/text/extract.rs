//! Markdown to plain text.
//!
//! Keeps only what a reader would see: heading and paragraph text, link
//! labels, list items, code. Block elements end with a newline. Raw HTML and
//! image alt text are dropped. Tables are not parsed, so their pipes survive
//! as text for the sanitizer to handle.

use pulldown_cmark::{Event, Parser, Tag, TagEnd};

/// Render `markdown` to the visible plain text.
pub fn markdown_to_text(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    let mut image_depth = 0usize;

    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::Image { .. }) => image_depth += 1,
            Event::End(TagEnd::Image) => image_depth = image_depth.saturating_sub(1),
            Event::Text(text) | Event::Code(text) if image_depth == 0 => out.push_str(&text),
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::End(
                TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item | TagEnd::CodeBlock,
            ) => {
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }

    out.trim_matches('\n').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_and_paragraph() {
        assert_eq!(
            markdown_to_text("# Title\n\nHello — world!"),
            "Title\nHello — world!"
        );
    }

    #[test]
    fn test_emphasis_and_links_resolve_to_visible_text() {
        let text = markdown_to_text("Some *emphasis*, **strong** and [a link](https://example.com).");
        assert_eq!(text, "Some emphasis, strong and a link.");
    }

    #[test]
    fn test_list_items_on_separate_lines() {
        assert_eq!(markdown_to_text("- one\n- two\n- three"), "one\ntwo\nthree");
    }

    #[test]
    fn test_inline_and_block_code_kept() {
        let text = markdown_to_text("Run `cargo doc`.\n\n```\nlet x = 1;\n```");
        assert_eq!(text, "Run cargo doc.\nlet x = 1;");
    }

    #[test]
    fn test_image_alt_text_dropped() {
        assert_eq!(markdown_to_text("Before ![alt text](img.png) after"), "Before  after");
    }

    #[test]
    fn test_table_pipes_survive() {
        let text = markdown_to_text("| a | b |\n|---|---|\n| 1 | 2 |");
        assert!(text.contains('|'));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(markdown_to_text(""), "");
        assert_eq!(markdown_to_text("\n\n   \n"), "");
    }
}
