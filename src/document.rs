//! Document builder: turns section-marked text into ordered body blocks.
//!
//! The extract uses wiki section markers (`== History ==`, `=== Early ===`);
//! every other non-blank line is a paragraph. Images located by
//! [`crate::locator`] are woven in right after the heading they belong to.

use std::collections::HashSet;

use crate::locator::{LEAD_SECTION, SectionImageMap};
use crate::model::ImageAsset;

/// Paragraph emitted when the article has no usable text.
pub const EMPTY_CONTENT_TEXT: &str = "No content found.";

const MARKER: char = '=';
const MIN_MARKER_RUN: usize = 2;
const MAX_MARKER_RUN: usize = 6;

const KNOWN_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
const DEFAULT_EXTENSION: &str = "jpg";

/// One structural block of the article body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Heading level (1-6) and text.
    Heading(u8, String),
    Paragraph(String),
    /// Placeholder for an image stored as `images/<filename>`.
    ImageRef { filename: String, source_url: String },
}

/// A unit of source text before images are attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Heading(u8, String),
    Text(String),
}

/// Body blocks plus the image references they introduced, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub blocks: Vec<Block>,
    pub images: Vec<ImageAsset>,
}

/// Split an extract into headings and paragraph lines.
pub fn parse_extract(extract: &str) -> Vec<Segment> {
    extract
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| match parse_heading(line.trim()) {
            Some((level, text)) => Segment::Heading(level, text.to_string()),
            None => Segment::Text(line.to_string()),
        })
        .collect()
}

/// Recognize `== Heading ==` style markers.
///
/// The opening and closing runs must have the same length, between 2 and 6.
fn parse_heading(line: &str) -> Option<(u8, &str)> {
    let open = line.chars().take_while(|&c| c == MARKER).count();
    if !(MIN_MARKER_RUN..=MAX_MARKER_RUN).contains(&open) {
        return None;
    }
    let close = line.chars().rev().take_while(|&c| c == MARKER).count();
    if close != open || line.len() <= open * 2 {
        return None;
    }

    let text = line[open..line.len() - close].trim();
    if text.is_empty() {
        return None;
    }
    Some((open.min(MAX_MARKER_RUN) as u8, text))
}

/// Assemble body blocks, attaching section images after their headings.
///
/// Lead-in images (the `_lead` section) precede the first block. Heading
/// text is matched against section keys exactly; a section's images are
/// emitted once, at the first heading that matches.
pub fn build_document<I>(segments: I, sections: &SectionImageMap) -> Document
where
    I: IntoIterator<Item = Segment>,
{
    let mut segments = segments.into_iter().peekable();
    if segments.peek().is_none() {
        return Document {
            blocks: vec![Block::Paragraph(EMPTY_CONTENT_TEXT.to_string())],
            images: Vec::new(),
        };
    }

    let mut builder = Builder::default();
    builder.attach(sections, LEAD_SECTION);

    for segment in segments {
        match segment {
            Segment::Heading(level, text) => {
                builder.blocks.push(Block::Heading(level, text.clone()));
                builder.attach(sections, &text);
            }
            Segment::Text(text) => builder.blocks.push(Block::Paragraph(text)),
        }
    }

    Document {
        blocks: builder.blocks,
        images: builder.images,
    }
}

#[derive(Default)]
struct Builder {
    blocks: Vec<Block>,
    images: Vec<ImageAsset>,
    attached: HashSet<String>,
}

impl Builder {
    fn attach(&mut self, sections: &SectionImageMap, key: &str) {
        let Some(urls) = sections.get(key) else {
            return;
        };
        if !self.attached.insert(key.to_string()) {
            return;
        }

        for url in urls {
            let filename = format!("img_{}.{}", self.images.len(), image_extension(url));
            self.blocks.push(Block::ImageRef {
                filename: filename.clone(),
                source_url: url.clone(),
            });
            self.images.push(ImageAsset::new(filename, url.clone()));
        }
    }
}

/// File extension for an image URL, restricted to formats readers handle.
///
/// ```
/// use wikibook::document::image_extension;
///
/// assert_eq!(image_extension("https://upload.wikimedia.org/a/b/Map.PNG?x=1"), "png");
/// assert_eq!(image_extension("https://upload.wikimedia.org/a/b/Chart.svg"), "jpg");
/// ```
pub fn image_extension(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.rsplit('/').next().unwrap_or(path);

    segment
        .rsplit_once('.')
        .and_then(|(_, ext)| {
            KNOWN_EXTENSIONS
                .iter()
                .find(|known| known.eq_ignore_ascii_case(ext))
                .copied()
        })
        .unwrap_or(DEFAULT_EXTENSION)
}
