//! Markdown to HTML conversion with metadata extraction.
//!
//! A post is a metadata header followed by a markdown body:
//!
//! ```text
//! title: Hello, World!
//! date: 2024-01-15
//! tags: intro,
//!     meta
//!
//! First paragraph of the post.
//! ```
//!
//! The header is a run of `key: value` lines ending at the first blank line.
//! Indented lines continue the previous value. The header may also be fenced
//! with `---` lines. Keys are kept exactly as written; values are trimmed.
//!
//! Conversion itself is pulldown-cmark with the features listed in
//! [`MarkupConfig`]. Feature switches that are not native pulldown-cmark
//! options (fenced code info strings, hard breaks, link targets) are applied
//! as an event filter between the parser and the HTML writer.

use crate::config::MarkupConfig;
use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd, html};
use std::collections::BTreeMap;

/// Output of [`to_html`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub html: String,
    pub metadata: BTreeMap<String, String>,
}

/// Convert a post's source text into body HTML and its metadata header.
pub fn to_html(source: &str, markup: &MarkupConfig) -> Document {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let (metadata, body) = if markup.metadata {
        split_metadata(source)
    } else {
        (BTreeMap::new(), source)
    };

    Document {
        html: render_markdown(body, markup),
        metadata,
    }
}

fn parser_options(markup: &MarkupConfig) -> Options {
    let mut options = Options::empty();
    if markup.tables {
        options.insert(Options::ENABLE_TABLES);
    }
    if markup.footnotes {
        options.insert(Options::ENABLE_FOOTNOTES);
    }
    if markup.strikethrough {
        options.insert(Options::ENABLE_STRIKETHROUGH);
    }
    options
}

fn render_markdown(body: &str, markup: &MarkupConfig) -> String {
    let parser = Parser::new_ext(body, parser_options(markup));
    let mut open_links: Vec<bool> = Vec::new();

    let events = parser.map(|event| match event {
        Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(_))) if !markup.fenced_code => {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Indented))
        }
        Event::HardBreak if !markup.hard_breaks => Event::SoftBreak,
        Event::Start(Tag::Link {
            dest_url, title, ..
        }) if markup.link_target.is_some() && is_external(&dest_url) => {
            open_links.push(true);
            Event::InlineHtml(CowStr::from(external_link_open(
                &dest_url,
                &title,
                markup.link_target.as_deref().unwrap_or_default(),
            )))
        }
        Event::Start(link @ Tag::Link { .. }) => {
            open_links.push(false);
            Event::Start(link)
        }
        Event::End(TagEnd::Link) => {
            if open_links.pop().unwrap_or(false) {
                Event::InlineHtml(CowStr::Borrowed("</a>"))
            } else {
                Event::End(TagEnd::Link)
            }
        }
        other => other,
    });

    let mut out = String::with_capacity(body.len() * 3 / 2);
    html::push_html(&mut out, events);
    out
}

fn is_external(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn external_link_open(url: &str, title: &str, target: &str) -> String {
    let mut tag = format!(r#"<a href="{}""#, escape_attr(url));
    if !title.is_empty() {
        tag.push_str(&format!(r#" title="{}""#, escape_attr(title)));
    }
    tag.push_str(&format!(r#" target="{}" rel="noopener">"#, escape_attr(target)));
    tag
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

// ============================================================================
// Metadata header
// ============================================================================

/// Split the metadata header off the front of `source`.
///
/// Returns the parsed header and the remaining body. A document without a
/// header returns an empty map and the whole input.
pub fn split_metadata(source: &str) -> (BTreeMap<String, String>, &str) {
    let mut lines = LineCursor::new(source);

    if lines.peek().map(|l| l.trim_end() == "---").unwrap_or(false) {
        lines.next();
        let mut header = HeaderBuilder::default();
        while let Some(line) = lines.next() {
            let trimmed = line.trim_end();
            if trimmed == "---" || trimmed == "..." {
                return (header.finish(), lines.rest());
            }
            header.feed(line);
        }
        // Unterminated fence: not a header after all.
        return (BTreeMap::new(), source);
    }

    let mut header = HeaderBuilder::default();
    while let Some(line) = lines.peek() {
        if line.trim().is_empty() {
            lines.next();
            break;
        }
        if !header.feed(line) {
            break;
        }
        lines.next();
    }
    (header.finish(), lines.rest())
}

#[derive(Default)]
struct HeaderBuilder {
    fields: BTreeMap<String, String>,
    last_key: Option<String>,
}

impl HeaderBuilder {
    /// Consume one header line. Returns false if the line is not part of a
    /// header (neither `key: value` nor a continuation).
    fn feed(&mut self, line: &str) -> bool {
        if line.starts_with([' ', '\t']) {
            let Some(key) = &self.last_key else {
                return false;
            };
            let extra = line.trim();
            if let Some(value) = self.fields.get_mut(key)
                && !extra.is_empty()
            {
                if !value.is_empty() {
                    value.push(' ');
                }
                value.push_str(extra);
            }
            return true;
        }

        match parse_field(line) {
            Some((key, value)) => {
                self.fields.insert(key.to_string(), value.to_string());
                self.last_key = Some(key.to_string());
                true
            }
            None => false,
        }
    }

    fn finish(self) -> BTreeMap<String, String> {
        self.fields
    }
}

fn parse_field(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim_end();
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-');
    valid.then(|| (key, value.trim()))
}

/// Line iterator that can hand back the unconsumed remainder.
struct LineCursor<'a> {
    source: &'a str,
    offset: usize,
}

impl<'a> LineCursor<'a> {
    fn new(source: &'a str) -> Self {
        Self { source, offset: 0 }
    }

    fn peek(&self) -> Option<&'a str> {
        let rest = &self.source[self.offset..];
        if rest.is_empty() {
            return None;
        }
        let line = rest.split_inclusive('\n').next().unwrap_or(rest);
        Some(line.trim_end_matches(['\n', '\r']))
    }

    fn rest(&self) -> &'a str {
        &self.source[self.offset..]
    }
}

impl<'a> Iterator for LineCursor<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let rest = &self.source[self.offset..];
        let raw = rest.split_inclusive('\n').next()?;
        self.offset += raw.len();
        Some(raw.trim_end_matches(['\n', '\r']))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> MarkupConfig {
        MarkupConfig::default()
    }

    // =========================================================================
    // Metadata header
    // =========================================================================

    #[test]
    fn header_and_body_are_split() {
        let (meta, body) = split_metadata("title: Hello\ndate: 2024-01-01\n\nBody text\n");
        assert_eq!(meta["title"], "Hello");
        assert_eq!(meta["date"], "2024-01-01");
        assert_eq!(body, "Body text\n");
    }

    #[test]
    fn values_keep_inner_colons() {
        let (meta, _) = split_metadata("title: Rust: a retrospective\nlink: https://example.com\n\nx");
        assert_eq!(meta["title"], "Rust: a retrospective");
        assert_eq!(meta["link"], "https://example.com");
    }

    #[test]
    fn indented_lines_continue_the_value() {
        let (meta, body) = split_metadata("summary: first line\n  second line\ntitle: T\n\nBody");
        assert_eq!(meta["summary"], "first line second line");
        assert_eq!(meta["title"], "T");
        assert_eq!(body, "Body");
    }

    #[test]
    fn empty_value_is_kept_as_empty_string() {
        let (meta, _) = split_metadata("title:\ndate: 2024\n\nx");
        assert_eq!(meta["title"], "");
    }

    #[test]
    fn document_without_header() {
        let source = "# Just a heading\n\nSome text.";
        let (meta, body) = split_metadata(source);
        assert!(meta.is_empty());
        assert_eq!(body, source);
    }

    #[test]
    fn header_stops_at_first_non_field_line() {
        let (meta, body) = split_metadata("title: T\nThis is prose, not a field\n");
        assert_eq!(meta.len(), 1);
        assert_eq!(body, "This is prose, not a field\n");
    }

    #[test]
    fn fenced_header() {
        let (meta, body) = split_metadata("---\ntitle: Fenced\ndate: 2024-03-03\n---\nBody\n");
        assert_eq!(meta["title"], "Fenced");
        assert_eq!(meta["date"], "2024-03-03");
        assert_eq!(body, "Body\n");
    }

    #[test]
    fn unterminated_fence_is_not_a_header() {
        let source = "---\ntitle: Oops\n\nBody";
        let (meta, body) = split_metadata(source);
        assert!(meta.is_empty());
        assert_eq!(body, source);
    }

    #[test]
    fn crlf_line_endings() {
        let (meta, body) = split_metadata("title: Win\r\ndate: 2024\r\n\r\nBody\r\n");
        assert_eq!(meta["title"], "Win");
        assert_eq!(meta["date"], "2024");
        assert_eq!(body, "Body\r\n");
    }

    #[test]
    fn keys_are_case_preserved() {
        let (meta, _) = split_metadata("Title: Upper\n\nx");
        assert!(meta.contains_key("Title"));
        assert!(!meta.contains_key("title"));
    }

    // =========================================================================
    // HTML conversion
    // =========================================================================

    #[test]
    fn to_html_renders_body_without_header() {
        let doc = to_html("title: T\ndate: D\n\nHello **world**", &defaults());
        assert_eq!(doc.metadata["title"], "T");
        assert!(doc.html.contains("<strong>world</strong>"));
        assert!(!doc.html.contains("title:"));
    }

    #[test]
    fn metadata_disabled_renders_everything() {
        let markup = MarkupConfig {
            metadata: false,
            ..defaults()
        };
        let doc = to_html("title: T\n\nBody", &markup);
        assert!(doc.metadata.is_empty());
        assert!(doc.html.contains("title: T"));
    }

    #[test]
    fn byte_order_mark_is_ignored() {
        let doc = to_html("\u{feff}title: T\n\nBody", &defaults());
        assert_eq!(doc.metadata["title"], "T");
    }

    #[test]
    fn tables_toggle() {
        let source = "| a | b |\n|---|---|\n| 1 | 2 |\n";
        assert!(to_html(source, &defaults()).html.contains("<table>"));
        let off = MarkupConfig {
            tables: false,
            ..defaults()
        };
        assert!(!to_html(source, &off).html.contains("<table>"));
    }

    #[test]
    fn strikethrough_toggle() {
        assert!(to_html("~~gone~~", &defaults()).html.contains("<del>gone</del>"));
        let off = MarkupConfig {
            strikethrough: false,
            ..defaults()
        };
        assert!(!to_html("~~gone~~", &off).html.contains("<del>"));
    }

    #[test]
    fn footnotes_toggle() {
        let source = "Text[^1]\n\n[^1]: The note.\n";
        assert!(to_html(source, &defaults()).html.contains("footnote"));
        let off = MarkupConfig {
            footnotes: false,
            ..defaults()
        };
        assert!(!to_html(source, &off).html.contains("footnote-definition"));
    }

    #[test]
    fn fenced_code_keeps_language_class() {
        let source = "```rust\nfn main() {}\n```\n";
        assert!(to_html(source, &defaults()).html.contains(r#"class="language-rust""#));
        let off = MarkupConfig {
            fenced_code: false,
            ..defaults()
        };
        let html = to_html(source, &off).html;
        assert!(html.contains("<pre><code>"));
        assert!(!html.contains("language-rust"));
    }

    #[test]
    fn hard_breaks_toggle() {
        let source = "line one\\\nline two";
        assert!(to_html(source, &defaults()).html.contains("<br />"));
        let off = MarkupConfig {
            hard_breaks: false,
            ..defaults()
        };
        assert!(!to_html(source, &off).html.contains("<br"));
    }

    #[test]
    fn link_target_applies_to_external_links_only() {
        let markup = MarkupConfig {
            link_target: Some("_blank".into()),
            ..defaults()
        };
        let html = to_html("[out](https://example.com) and [in](/about.html)", &markup).html;
        assert!(html.contains(r#"<a href="https://example.com" target="_blank" rel="noopener">out</a>"#));
        assert!(html.contains(r#"<a href="/about.html">in</a>"#));
    }

    #[test]
    fn link_target_escapes_attributes() {
        let markup = MarkupConfig {
            link_target: Some("_blank".into()),
            ..defaults()
        };
        let html = to_html(r#"[x](https://example.com/?a=1&b=2 "say \"hi\"")"#, &markup).html;
        assert!(html.contains("a=1&amp;b=2"));
        assert!(html.contains(r#"title="say &quot;hi&quot;""#));
    }

    #[test]
    fn no_link_target_leaves_links_alone() {
        let html = to_html("[out](https://example.com)", &defaults()).html;
        assert!(!html.contains("target="));
    }
}
