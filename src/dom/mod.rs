//! Minimal DOM for scanning rendered article HTML.

mod arena;
mod tree_sink;

pub use arena::{Descendants, Dom, Node, NodeData, NodeId};
pub use tree_sink::{DomSink, NodeHandle};

use html5ever::driver::ParseOpts;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;

/// Parse an HTML document or fragment, recovering from malformed markup.
pub fn parse_html(html: &str) -> Dom {
    parse_document(DomSink::default(), ParseOpts::default())
        .from_utf8()
        .one(html.as_bytes())
        .into_dom()
}
