//! Section-image locator.
//!
//! The plain-text extract carries no images, and the rendered HTML carries no
//! usable text structure for the builder. This module scans the rendered
//! page for two kinds of positioned markers, section headings and content
//! figures, and merges them into a single timeline to recover which images
//! sit under which heading.

use tracing::{debug, warn};

use crate::api::ContentApi;
use crate::dom::{Dom, NodeId, parse_html};
use crate::identifier::{ArticleId, wiki_host};

/// Section key for images that appear before the first heading.
pub const LEAD_SECTION: &str = "_lead";

/// Host serving article media.
pub const MEDIA_HOST: &str = "upload.wikimedia.org";

/// Word sequences naming decorative or maintenance images.
const IMAGE_DENYLIST: &[&[&str]] = &[
    &["icon"],
    &["flag", "of"],
    &["logo"],
    &["disambig"],
    &["edit", "clear"],
    &["wiki", "letter", "w"],
    &["question", "book"],
];

const SECTION_HEADINGS: &[&str] = &["h2", "h3"];

/// Ordered mapping from section heading text to image URLs.
///
/// Keys keep first-seen order; a key is only present with at least one URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionImageMap {
    entries: Vec<(String, Vec<String>)>,
}

impl SectionImageMap {
    /// Append `url` to the images of `section`.
    pub fn push(&mut self, section: &str, url: impl Into<String>) {
        let url = url.into();
        match self.entries.iter_mut().find(|(key, _)| key == section) {
            Some((_, urls)) => urls.push(url),
            None => self.entries.push((section.to_string(), vec![url])),
        }
    }

    pub fn get(&self, section: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(key, _)| key == section)
            .map(|(_, urls)| urls.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(key, urls)| (key.as_str(), urls.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn image_count(&self) -> usize {
        self.entries.iter().map(|(_, urls)| urls.len()).sum()
    }
}

/// What was found at a position in the rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerKind {
    Heading(String),
    Image(String),
}

/// A heading or image at a document position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub offset: usize,
    pub kind: MarkerKind,
}

impl Marker {
    pub fn heading(offset: usize, text: impl Into<String>) -> Self {
        Self {
            offset,
            kind: MarkerKind::Heading(text.into()),
        }
    }

    pub fn image(offset: usize, url: impl Into<String>) -> Self {
        Self {
            offset,
            kind: MarkerKind::Image(url.into()),
        }
    }
}

/// Fetch the rendered page and map its images to sections.
///
/// Never fails: any fetch error yields an empty map and the article simply
/// gets no section images.
pub fn locate_section_images<A>(api: &A, id: &ArticleId) -> SectionImageMap
where
    A: ContentApi + ?Sized,
{
    match api.fetch_rendered_html(id) {
        Ok(html) => section_images(&parse_html(&html)),
        Err(err) => {
            warn!(article = %id, error = %err, "section images unavailable");
            SectionImageMap::default()
        }
    }
}

/// Map the images of a parsed page to the sections that contain them.
pub fn section_images(dom: &Dom) -> SectionImageMap {
    let map = merge_timeline(scan_markers(dom));
    debug!(
        sections = map.len(),
        images = map.image_count(),
        "located section images"
    );
    map
}

/// Collect heading and figure markers; offsets follow document order.
pub fn scan_markers(dom: &Dom) -> Vec<Marker> {
    let mut markers = Vec::new();

    for (offset, id) in dom.descendants(dom.document()).enumerate() {
        let Some(tag) = dom.element_name(id) else {
            continue;
        };

        if SECTION_HEADINGS.contains(&tag) {
            let text = heading_text(dom, id);
            if !text.is_empty() {
                markers.push(Marker::heading(offset, text));
            }
        } else if tag == "figure"
            && let Some(url) = figure_image(dom, id)
        {
            markers.push(Marker::image(offset, url));
        }
    }

    markers
}

/// Single pass over markers sorted by offset, tracking the current section.
pub fn merge_timeline(mut markers: Vec<Marker>) -> SectionImageMap {
    markers.sort_by_key(|m| m.offset);

    let mut map = SectionImageMap::default();
    let mut current = LEAD_SECTION.to_string();

    for marker in markers {
        match marker.kind {
            MarkerKind::Heading(text) => current = text,
            MarkerKind::Image(url) => map.push(&current, url),
        }
    }

    map
}

/// Visible heading text, without edit links.
///
/// Older markup wraps the title in `span.mw-headline`; current markup puts it
/// directly in the heading element.
fn heading_text(dom: &Dom, heading: NodeId) -> String {
    let source = dom
        .descendants(heading)
        .find(|&id| dom.has_class(id, "mw-headline"))
        .unwrap_or(heading);

    let raw = dom.text_content_filtered(source, |dom, id| dom.has_class(id, "mw-editsection"));
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Absolute URL of the first content image inside a figure.
fn figure_image(dom: &Dom, figure: NodeId) -> Option<String> {
    let img = dom
        .descendants(figure)
        .find(|&id| dom.element_name(id) == Some("img"))?;
    let url = normalize_image_url(dom.attr(img, "src")?)?;
    is_content_image(&url).then_some(url)
}

/// Resolve protocol-relative sources; anything else must already be absolute.
pub fn normalize_image_url(src: &str) -> Option<String> {
    let src = src.trim();
    if src.starts_with("//") {
        Some(format!("https:{src}"))
    } else if src.starts_with("https://") || src.starts_with("http://") {
        Some(src.to_string())
    } else {
        None
    }
}

/// True for images on the media host that are not decorative.
///
/// ```
/// use wikibook::locator::is_content_image;
///
/// assert!(is_content_image("https://upload.wikimedia.org/wikipedia/commons/a/a9/Example.jpg"));
/// assert!(!is_content_image("https://upload.wikimedia.org/wikipedia/en/9/99/Question_book-new.svg"));
/// assert!(!is_content_image("https://example.com/photo.jpg"));
/// ```
pub fn is_content_image(url: &str) -> bool {
    if wiki_host(url).as_deref() != Some(MEDIA_HOST) {
        return false;
    }

    let path = url.split(['?', '#']).next().unwrap_or(url);
    // Thumbnails end in "<width>px-<File>", originals in "<File>".
    let file = path.rsplit('/').next().unwrap_or(path).to_ascii_lowercase();
    let words: Vec<&str> = file
        .split(['_', '-', '.', ' '])
        .filter(|w| !w.is_empty())
        .collect();

    !IMAGE_DENYLIST
        .iter()
        .any(|pattern| words.windows(pattern.len()).any(|w| w == *pattern))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const U1: &str = "https://upload.wikimedia.org/wikipedia/commons/1/1a/One.jpg";
    const U2: &str = "https://upload.wikimedia.org/wikipedia/commons/2/2b/Two.png";
    const U3: &str = "https://upload.wikimedia.org/wikipedia/commons/3/3c/Three.gif";

    #[test]
    fn test_denylist_matches_whole_words() {
        let base = "https://upload.wikimedia.org/wikipedia/commons";
        for kept in [
            "a/a1/Silicon_wafer.jpg",
            "b/b2/Iconostasis_Kyiv.jpg",
            "c/c3/Lexicon_page.png",
            "d/d4/Geology_of_Mars.jpg",
            "thumb/e/e5/Flagstaff.jpg/320px-Flagstaff.jpg",
        ] {
            assert!(is_content_image(&format!("{base}/{kept}")), "{kept} should be kept");
        }
        for dropped in [
            "f/f6/Flag_of_France.svg",
            "thumb/0/07/Commons-logo.svg/30px-Commons-logo.svg.png",
            "1/1b/Edit-clear.svg",
            "2/2c/Wiki_letter_w.svg",
            "3/3d/Disambig_gray.svg",
            "4/4e/Symbol_ICON.png",
        ] {
            assert!(!is_content_image(&format!("{base}/{dropped}")), "{dropped} should be dropped");
        }
    }

    #[test]
    fn test_merge_ordering() {
        let map = merge_timeline(vec![
            Marker::heading(10, "A"),
            Marker::image(20, U1),
            Marker::heading(30, "B"),
            Marker::image(40, U2),
            Marker::image(50, U3),
        ]);

        assert_eq!(map.get("A"), Some(&[U1.to_string()][..]));
        assert_eq!(map.get("B"), Some(&[U2.to_string(), U3.to_string()][..]));
        assert_eq!(map.get(LEAD_SECTION), None);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_merge_sorts_by_offset() {
        let map = merge_timeline(vec![
            Marker::image(40, U2),
            Marker::heading(30, "B"),
            Marker::image(5, U1),
        ]);

        assert_eq!(map.get(LEAD_SECTION), Some(&[U1.to_string()][..]));
        assert_eq!(map.get("B"), Some(&[U2.to_string()][..]));
    }

    #[test]
    fn test_sections_without_images_dropped() {
        let map = merge_timeline(vec![
            Marker::heading(1, "Empty"),
            Marker::heading(2, "Full"),
            Marker::image(3, U1),
            Marker::heading(4, "Trailing"),
        ]);

        let keys: Vec<_> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["Full"]);
        assert!(map.iter().all(|(_, urls)| !urls.is_empty()));
    }

    #[test]
    fn test_scan_rendered_page() {
        let html = r##"
            <div class="mw-parser-output">
              <figure typeof="mw:File/Thumb">
                <a href="/wiki/File:Lead.jpg"><img src="//upload.wikimedia.org/wikipedia/commons/thumb/a/ab/Lead.jpg/250px-Lead.jpg"></a>
                <figcaption>Lead</figcaption>
              </figure>
              <p>Intro text.</p>
              <div class="mw-heading mw-heading2"><h2 id="History">History</h2><span class="mw-editsection">[<a href="#">edit</a>]</span></div>
              <p>Old times.</p>
              <figure><img src="//upload.wikimedia.org/wikipedia/commons/c/cd/Castle.png"></figure>
              <figure><img src="//upload.wikimedia.org/wikipedia/en/9/99/Question_book-new.svg"></figure>
              <h3><span class="mw-headline" id="Early">Early   years</span><span class="mw-editsection">[edit]</span></h3>
              <figure><img src="https://example.com/offsite.jpg"></figure>
              <figure><img src="//upload.wikimedia.org/wikipedia/commons/e/ef/Map.webp"></figure>
            </div>
        "##;

        let map = section_images(&parse_html(html));

        assert_eq!(
            map.get(LEAD_SECTION),
            Some(
                &["https://upload.wikimedia.org/wikipedia/commons/thumb/a/ab/Lead.jpg/250px-Lead.jpg"
                    .to_string()][..]
            )
        );
        assert_eq!(
            map.get("History"),
            Some(&["https://upload.wikimedia.org/wikipedia/commons/c/cd/Castle.png".to_string()][..])
        );
        assert_eq!(
            map.get("Early years"),
            Some(&["https://upload.wikimedia.org/wikipedia/commons/e/ef/Map.webp".to_string()][..])
        );
        assert_eq!(map.image_count(), 3);
    }

    #[test]
    fn test_heading_text_skips_edit_section() {
        let dom = parse_html(r#"<h2>Legacy<span class="mw-editsection">[edit]</span></h2>"#);
        let markers = scan_markers(&dom);
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].kind, MarkerKind::Heading("Legacy".to_string()));
    }

    #[test]
    fn test_images_outside_figures_ignored() {
        let dom = parse_html(
            r#"<h2>A</h2><p><img src="//upload.wikimedia.org/wikipedia/commons/x/xy/Inline.jpg"></p>"#,
        );
        assert!(section_images(&dom).is_empty());
    }

    #[test]
    fn test_normalize_image_url() {
        assert_eq!(
            normalize_image_url("//upload.wikimedia.org/a.png").as_deref(),
            Some("https://upload.wikimedia.org/a.png")
        );
        assert_eq!(
            normalize_image_url("http://upload.wikimedia.org/a.png").as_deref(),
            Some("http://upload.wikimedia.org/a.png")
        );
        assert_eq!(normalize_image_url("/static/images/a.png"), None);
        assert_eq!(normalize_image_url("data:image/png;base64,AAAA"), None);
    }

    #[test]
    fn test_denylist() {
        for name in [
            "Flag_of_France.svg",
            "Commons-logo.svg",
            "Disambig_gray.svg",
            "Edit-clear.svg",
            "Wiki_letter_w.svg",
            "Symbol_book_class2_icon.png",
        ] {
            let url = format!("https://upload.wikimedia.org/wikipedia/commons/x/xy/{name}");
            assert!(!is_content_image(&url), "{name} should be rejected");
        }
        assert!(is_content_image(
            "https://upload.wikimedia.org/wikipedia/commons/x/xy/Meredith_portrait.jpg"
        ));
    }
}
