//! EPUB packager.
//!
//! Writes a single-chapter EPUB 3 container (with an NCX for older readers)
//! from a [`Manuscript`]. Images without bytes are left out of the package;
//! their `<img>` tags stay in the chapter.

use std::io::{Cursor, Seek, Write};
use std::path::Path;

use chrono::Utc;
use uuid::Uuid;
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::document::Block;
use crate::error::Result;
use crate::model::{ImageAsset, Manuscript};

use super::Exporter;

pub const CHAPTER_HREF: &str = "article.xhtml";
pub const CHAPTER_ID: &str = "article";
pub const NAV_HREF: &str = "nav.xhtml";
pub const NCX_HREF: &str = "toc.ncx";
pub const IMAGE_DIR: &str = "images";
const COVER_ID: &str = "cover-image";

/// Configuration for EPUB export.
#[derive(Debug, Clone)]
pub struct EpubConfig {
    /// Compression level for deflate (0-9, default 6).
    pub compression_level: Option<u32>,
    /// `dc:creator` for every book.
    pub author: String,
}

impl Default for EpubConfig {
    fn default() -> Self {
        Self {
            compression_level: None,
            author: "Wikipedia".to_string(),
        }
    }
}

/// EPUB format exporter.
///
/// # Example
///
/// ```
/// use wikibook::Manuscript;
/// use wikibook::document::Block;
/// use wikibook::export::EpubExporter;
///
/// let mut manuscript = Manuscript::new("Example");
/// manuscript.body.push(Block::Paragraph("Hello".into()));
/// let bytes = EpubExporter::new().to_bytes(&manuscript)?;
/// assert!(bytes.starts_with(b"PK"));
/// # Ok::<(), wikibook::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct EpubExporter {
    config: EpubConfig,
}

impl EpubExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: EpubConfig) -> Self {
        self.config = config;
        self
    }

    /// Package into an in-memory buffer.
    pub fn to_bytes(&self, manuscript: &Manuscript) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.export(manuscript, &mut cursor)?;
        Ok(cursor.into_inner())
    }
}

impl Exporter for EpubExporter {
    fn export<W: Write + Seek>(&self, manuscript: &Manuscript, writer: &mut W) -> Result<()> {
        let mut zip = ZipWriter::new(writer);

        let compression_level = self.config.compression_level.unwrap_or(6);
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(compression_level as i64));

        // mimetype must be first and uncompressed
        zip.start_file("mimetype", stored)?;
        zip.write_all(b"application/epub+zip")?;

        zip.start_file("META-INF/container.xml", deflated)?;
        zip.write_all(CONTAINER_XML)?;

        let identifier = format!("urn:uuid:{}", Uuid::new_v4());
        let images = embedded_images(manuscript);

        let package = Package {
            manuscript,
            identifier: &identifier,
            author: &self.config.author,
            images: &images,
        };

        zip.start_file("OEBPS/content.opf", deflated)?;
        zip.write_all(package.opf().as_bytes())?;

        zip.start_file(format!("OEBPS/{NCX_HREF}"), deflated)?;
        zip.write_all(package.ncx().as_bytes())?;

        zip.start_file(format!("OEBPS/{NAV_HREF}"), deflated)?;
        zip.write_all(package.nav().as_bytes())?;

        zip.start_file(format!("OEBPS/{CHAPTER_HREF}"), deflated)?;
        zip.write_all(render_chapter(manuscript).as_bytes())?;

        for image in &images {
            let bytes = image.asset.bytes.as_deref().unwrap_or_default();
            // images are stored, not deflated
            zip.start_file(format!("OEBPS/{}", image.href), stored)?;
            zip.write_all(bytes)?;
        }

        zip.finish()?;
        Ok(())
    }
}

/// Container.xml template.
const CONTAINER_XML: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

/// An image that made it into the package.
struct EmbeddedImage<'a> {
    id: String,
    href: String,
    asset: &'a ImageAsset,
    is_cover: bool,
}

/// Lead image plus every section image with bytes, in body order.
fn embedded_images(manuscript: &Manuscript) -> Vec<EmbeddedImage<'_>> {
    let lead = manuscript
        .lead_image
        .iter()
        .filter(|asset| asset.is_resolved())
        .map(|asset| EmbeddedImage {
            id: COVER_ID.to_string(),
            href: image_href(&asset.local_filename),
            asset,
            is_cover: true,
        });

    let sections = manuscript
        .section_images
        .iter()
        .filter(|asset| asset.is_resolved())
        .enumerate()
        .map(|(i, asset)| EmbeddedImage {
            id: format!("image_{i}"),
            href: image_href(&asset.local_filename),
            asset,
            is_cover: false,
        });

    lead.chain(sections).collect()
}

fn image_href(filename: &str) -> String {
    format!("{IMAGE_DIR}/{filename}")
}

struct Package<'a> {
    manuscript: &'a Manuscript,
    identifier: &'a str,
    author: &'a str,
    images: &'a [EmbeddedImage<'a>],
}

impl Package<'_> {
    fn language(&self) -> &str {
        if self.manuscript.language.is_empty() {
            "en"
        } else {
            &self.manuscript.language
        }
    }

    /// Generate content.opf.
    fn opf(&self) -> String {
        let m = self.manuscript;
        let mut opf = String::new();

        opf.push_str(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="BookId">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
"#,
        );
        opf.push_str(&format!(
            "    <dc:identifier id=\"BookId\">{}</dc:identifier>\n",
            escape_xml(self.identifier)
        ));
        opf.push_str(&format!(
            "    <dc:title>{}</dc:title>\n",
            escape_xml(&m.title)
        ));
        opf.push_str(&format!(
            "    <dc:language>{}</dc:language>\n",
            escape_xml(self.language())
        ));
        opf.push_str(&format!(
            "    <dc:creator>{}</dc:creator>\n",
            escape_xml(self.author)
        ));
        if let Some(ref source) = m.source_url {
            opf.push_str(&format!(
                "    <dc:source>{}</dc:source>\n",
                escape_xml(source)
            ));
        }
        opf.push_str(&format!(
            "    <meta property=\"dcterms:modified\">{}</meta>\n",
            Utc::now().format("%Y-%m-%dT%H:%M:%SZ")
        ));
        if self.images.iter().any(|image| image.is_cover) {
            opf.push_str(&format!(
                "    <meta name=\"cover\" content=\"{COVER_ID}\"/>\n"
            ));
        }
        opf.push_str("  </metadata>\n");

        opf.push_str("  <manifest>\n");
        opf.push_str(&format!(
            "    <item id=\"ncx\" href=\"{NCX_HREF}\" media-type=\"application/x-dtbncx+xml\"/>\n"
        ));
        opf.push_str(&format!(
            "    <item id=\"nav\" href=\"{NAV_HREF}\" media-type=\"application/xhtml+xml\" properties=\"nav\"/>\n"
        ));
        opf.push_str(&format!(
            "    <item id=\"{CHAPTER_ID}\" href=\"{CHAPTER_HREF}\" media-type=\"application/xhtml+xml\"/>\n"
        ));
        for image in self.images {
            let properties = if image.is_cover {
                " properties=\"cover-image\""
            } else {
                ""
            };
            opf.push_str(&format!(
                "    <item id=\"{}\" href=\"{}\" media-type=\"{}\"{}/>\n",
                escape_xml(&image.id),
                escape_xml(&image.href),
                guess_media_type(&image.href),
                properties
            ));
        }
        opf.push_str("  </manifest>\n");

        // nav.xhtml is manifest-only
        opf.push_str("  <spine toc=\"ncx\">\n");
        opf.push_str(&format!("    <itemref idref=\"{CHAPTER_ID}\"/>\n"));
        opf.push_str("  </spine>\n");

        opf.push_str("</package>\n");
        opf
    }

    /// Generate toc.ncx with a single navPoint.
    fn ncx(&self) -> String {
        let title = escape_xml(&self.manuscript.title);
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE ncx PUBLIC "-//NISO//DTD ncx 2005-1//EN" "http://www.daisy.org/z3986/2005/ncx-2005-1.dtd">
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
    <meta name="dtb:uid" content="{uid}"/>
    <meta name="dtb:depth" content="1"/>
    <meta name="dtb:totalPageCount" content="0"/>
    <meta name="dtb:maxPageNumber" content="0"/>
  </head>
  <docTitle>
    <text>{title}</text>
  </docTitle>
  <navMap>
    <navPoint id="navPoint-1" playOrder="1">
      <navLabel><text>{title}</text></navLabel>
      <content src="{CHAPTER_HREF}"/>
    </navPoint>
  </navMap>
</ncx>
"#,
            uid = escape_xml(self.identifier),
        )
    }

    /// Generate the EPUB 3 navigation document.
    fn nav(&self) -> String {
        let title = escape_xml(&self.manuscript.title);
        let lang = escape_xml(self.language());
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" lang="{lang}" xml:lang="{lang}">
<head>
<title>{title}</title>
</head>
<body>
<nav epub:type="toc" id="toc">
<ol>
<li><a href="{CHAPTER_HREF}">{title}</a></li>
</ol>
</nav>
</body>
</html>
"#
        )
    }
}

/// Render the chapter XHTML: title heading, lead image, then the body.
pub fn render_chapter(manuscript: &Manuscript) -> String {
    let title = escape_xml(&manuscript.title);
    let lang = if manuscript.language.is_empty() {
        "en".to_string()
    } else {
        escape_xml(&manuscript.language)
    };

    let mut out = String::new();
    out.push_str(&format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" lang="{lang}" xml:lang="{lang}">
<head>
<title>{title}</title>
</head>
<body>
<h1>{title}</h1>
"#
    ));

    if let Some(lead) = manuscript.lead_image.as_ref().filter(|a| a.is_resolved()) {
        push_image(&mut out, &lead.local_filename, &manuscript.title);
    }

    for block in &manuscript.body {
        match block {
            Block::Heading(level, text) => {
                let level = (*level).clamp(1, 6);
                out.push_str(&format!("<h{level}>{}</h{level}>\n", escape_xml(text)));
            }
            Block::Paragraph(text) => {
                out.push_str(&format!("<p>{}</p>\n", escape_xml(text)));
            }
            Block::ImageRef { filename, .. } => push_image(&mut out, filename, ""),
        }
    }

    out.push_str("</body>\n</html>\n");
    out
}

fn push_image(out: &mut String, filename: &str, alt: &str) {
    out.push_str(&format!(
        "<div style=\"text-align: center;\"><img src=\"{}\" alt=\"{}\"/></div>\n",
        escape_xml(&image_href(filename)),
        escape_xml(alt)
    ));
}

/// Escape XML special characters.
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Guess media type from file extension.
fn guess_media_type(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "xhtml" | "html" | "htm" => "application/xhtml+xml",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ncx" => "application/x-dtbncx+xml",
        _ => "application/octet-stream",
    }
}
