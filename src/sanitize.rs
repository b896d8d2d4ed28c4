//! Tolerant reduction of rendered article HTML to text blocks.
//!
//! Used when the body is taken from rendered HTML instead of the plain-text
//! extract. Every element gets one of three dispositions:
//!
//! - **drop**: page chrome, references, media and forms vanish with their
//!   subtree;
//! - **emit**: paragraphs, headings, list items and block quotes become one
//!   block each, holding their visible text;
//! - **unwrap**: anything else disappears but its children are still
//!   visited, so unknown markup never loses text. Loose text collects into
//!   a paragraph that ends at the next block or container boundary.

use crate::document::Segment;
use crate::dom::{Dom, NodeId};

const DROP_TAGS: &[&str] = &[
    "script", "style", "link", "meta", "img", "figure", "figcaption", "video", "audio", "iframe",
    "object", "embed", "canvas", "svg", "math", "map", "area", "noscript", "picture", "source",
    "input", "button", "select", "textarea", "form", "table", "nav", "header", "footer",
];

const DROP_CLASSES: &[&str] = &[
    "ambox",
    "catlinks",
    "gallery",
    "hatnote",
    "infobox",
    "mbox",
    "metadata",
    "mw-authority-control",
    "mw-editsection",
    "mw-empty-elt",
    "mw-jump-link",
    "mw-references-wrap",
    "navbox",
    "noprint",
    "portalbox",
    "printfooter",
    "reference",
    "references",
    "reflist",
    "shortdescription",
    "sidebar",
    "sistersitebox",
    "thumb",
    "toc",
    "wikitable",
];

const DROP_IDS: &[&str] = &["mw-navigation", "footer", "toc", "catlinks"];

const BLOCK_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "blockquote", "dt", "dd",
];

/// Unwrapped elements that still break loose text into separate paragraphs.
const CONTAINER_TAGS: &[&str] = &[
    "div", "section", "article", "main", "aside", "ul", "ol", "dl", "center", "body", "br",
];

/// Where the article body lives in a rendered page, outermost first.
const CONTENT_ROOT_CLASS: &str = "mw-parser-output";
const CONTENT_ROOT_ID: &str = "mw-content-text";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Drop,
    Emit,
    Unwrap,
}

/// Reduce a rendered page to heading and paragraph segments.
pub fn sanitize_body(dom: &Dom) -> Vec<Segment> {
    let mut visitor = BlockVisitor::default();
    visitor.visit(dom, content_root(dom));
    visitor.flush();
    visitor.segments
}

fn content_root(dom: &Dom) -> NodeId {
    let all = || dom.descendants(dom.document());
    all()
        .find(|&id| dom.has_class(id, CONTENT_ROOT_CLASS))
        .or_else(|| all().find(|&id| dom.attr(id, "id") == Some(CONTENT_ROOT_ID)))
        .or_else(|| dom.find_by_tag("body"))
        .unwrap_or_else(|| dom.document())
}

fn disposition(dom: &Dom, id: NodeId) -> Disposition {
    let Some(tag) = dom.element_name(id) else {
        return Disposition::Unwrap;
    };

    let dropped = DROP_TAGS.contains(&tag)
        || dom
            .classes(id)
            .iter()
            .any(|class| DROP_CLASSES.contains(&class.as_str()))
        || dom.attr(id, "id").is_some_and(|v| DROP_IDS.contains(&v));

    if dropped {
        Disposition::Drop
    } else if BLOCK_TAGS.contains(&tag) {
        Disposition::Emit
    } else {
        Disposition::Unwrap
    }
}

#[derive(Default)]
struct BlockVisitor {
    segments: Vec<Segment>,
    /// Loose text seen since the last boundary.
    pending: String,
}

impl BlockVisitor {
    fn visit(&mut self, dom: &Dom, id: NodeId) {
        if let Some(text) = dom.text(id) {
            self.pending.push_str(text);
            return;
        }

        match disposition(dom, id) {
            Disposition::Drop => {}
            Disposition::Emit => {
                self.flush();
                self.emit(dom, id);
            }
            Disposition::Unwrap => {
                let boundary = dom
                    .element_name(id)
                    .is_some_and(|tag| CONTAINER_TAGS.contains(&tag));
                if boundary {
                    self.flush();
                }
                for &child in dom.children(id) {
                    self.visit(dom, child);
                }
                if boundary {
                    self.flush();
                }
            }
        }
    }

    /// Turn pending loose text into a paragraph.
    fn flush(&mut self) {
        let text = collapse_whitespace(&std::mem::take(&mut self.pending));
        if !text.is_empty() {
            self.segments.push(Segment::Text(text));
        }
    }

    fn emit(&mut self, dom: &Dom, id: NodeId) {
        let raw = dom.text_content_filtered(id, |dom, node| {
            node != id && disposition(dom, node) == Disposition::Drop
        });
        let text = collapse_whitespace(&raw);
        if text.is_empty() {
            return;
        }

        let level = dom
            .element_name(id)
            .and_then(|tag| tag.strip_prefix('h'))
            .and_then(|n| n.parse::<u8>().ok());

        self.segments.push(match level {
            Some(level) => Segment::Heading(level, text),
            None => Segment::Text(text),
        });
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;
    use pretty_assertions::assert_eq;

    fn text(s: &str) -> Segment {
        Segment::Text(s.to_string())
    }

    #[test]
    fn test_blocks_from_parser_output() {
        let html = r#"
            <div class="mw-parser-output">
              <div class="shortdescription">Programming language</div>
              <table class="infobox"><tr><td>Paradigm</td></tr></table>
              <p><b>Rust</b> is a <a href="/wiki/Language">language</a>.<sup class="reference">[1]</sup></p>
              <div class="mw-heading mw-heading2"><h2 id="History">History</h2><span class="mw-editsection">[edit]</span></div>
              <p>Started   in 2006.</p>
              <ul><li>One</li><li><i>Two</i></li></ul>
              <blockquote><p>Quoted</p></blockquote>
              <div class="navbox">Navigation</div>
            </div>
        "#;

        let segments = sanitize_body(&parse_html(html));
        assert_eq!(
            segments,
            vec![
                text("Rust is a language."),
                Segment::Heading(2, "History".to_string()),
                text("Started in 2006."),
                text("One"),
                text("Two"),
                text("Quoted"),
            ]
        );
    }

    #[test]
    fn test_unknown_tags_unwrapped() {
        let segments = sanitize_body(&parse_html(
            "<body><custom-card><section><p>Inside <mark>marked</mark> text</p></section></custom-card></body>",
        ));
        assert_eq!(segments, vec![text("Inside marked text")]);
    }

    #[test]
    fn test_loose_text_kept() {
        let segments = sanitize_body(&parse_html(
            r#"<div class="mw-parser-output"><div>Loose <span>words</span></div>
               <p>Para</p><dl><dt>Term</dt><dd>Definition</dd></dl>tail text</div>"#,
        ));
        assert_eq!(
            segments,
            vec![
                text("Loose words"),
                text("Para"),
                text("Term"),
                text("Definition"),
                text("tail text"),
            ]
        );
    }

    #[test]
    fn test_malformed_markup() {
        let segments = sanitize_body(&parse_html("<p>First<p>Second <b>bold<h3>Later"));
        assert_eq!(
            segments,
            vec![
                text("First"),
                text("Second bold"),
                Segment::Heading(3, "Later".to_string()),
            ]
        );
    }

    #[test]
    fn test_dropped_ids_and_empty_blocks() {
        let segments = sanitize_body(&parse_html(
            r#"<body><div id="toc"><p>Contents</p></div><p>   </p><p>Kept</p></body>"#,
        ));
        assert_eq!(segments, vec![text("Kept")]);
    }

    #[test]
    fn test_no_content() {
        assert!(sanitize_body(&parse_html("")).is_empty());
    }
}
