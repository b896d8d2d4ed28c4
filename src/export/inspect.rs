//! Read a packaged EPUB back: metadata, manifest, spine and NCX entries.
//!
//! Backs the `--inspect` CLI mode and lets tests check that a container's
//! internal references line up.

use std::collections::HashSet;
use std::io::{Read, Seek};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use zip::ZipArchive;

use crate::error::{Error, Result};

/// One `<item>` of the OPF manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub id: String,
    pub href: String,
    pub media_type: String,
    pub properties: Option<String>,
}

/// What a container declares about itself.
#[derive(Debug, Clone, Default)]
pub struct PackageSummary {
    pub title: String,
    pub identifier: String,
    pub language: String,
    pub creator: Option<String>,
    pub source: Option<String>,
    pub manifest: Vec<ManifestEntry>,
    /// `idref`s of the spine, in reading order.
    pub spine: Vec<String>,
    /// `content src` of every NCX navPoint.
    pub nav_points: Vec<String>,
    /// Every file name in the archive, in archive order.
    pub files: Vec<String>,
    /// Directory of the OPF inside the archive (e.g. `OEBPS/`).
    pub opf_base: String,
}

impl PackageSummary {
    /// Manifest entries whose file is missing from the archive.
    pub fn dangling_manifest(&self) -> Vec<&ManifestEntry> {
        let files: HashSet<&str> = self.files.iter().map(String::as_str).collect();
        self.manifest
            .iter()
            .filter(|item| !files.contains(format!("{}{}", self.opf_base, item.href).as_str()))
            .collect()
    }

    /// Manifest ids declared more than once.
    pub fn duplicate_ids(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.manifest
            .iter()
            .map(|item| item.id.as_str())
            .filter(|id| !seen.insert(*id))
            .collect()
    }

    /// Manifest items with an `image/*` media type.
    pub fn images(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.manifest
            .iter()
            .filter(|item| item.media_type.starts_with("image/"))
    }

    pub fn manifest_item(&self, id: &str) -> Option<&ManifestEntry> {
        self.manifest.iter().find(|item| item.id == id)
    }
}

/// Parse the package structure of an EPUB archive.
pub fn inspect_epub<R: Read + Seek>(reader: R) -> Result<PackageSummary> {
    let mut archive = ZipArchive::new(reader)?;
    let files: Vec<String> = archive.file_names().map(str::to_string).collect();

    let container = read_entry(&mut archive, "META-INF/container.xml")?;
    let opf_path = parse_container_xml(&container)?;
    let opf_base = opf_path
        .rfind('/')
        .map(|i| opf_path[..=i].to_string())
        .unwrap_or_default();

    let opf = read_entry(&mut archive, &opf_path)?;
    let mut summary = parse_opf(&opf)?;
    summary.opf_base = opf_base;

    let toc_href = summary
        .manifest
        .iter()
        .find(|item| item.media_type == "application/x-dtbncx+xml")
        .map(|item| format!("{}{}", summary.opf_base, item.href));
    if let Some(toc_href) = toc_href {
        let ncx = read_entry(&mut archive, &toc_href)?;
        summary.nav_points = parse_ncx(&ncx)?;
    }

    // Sorting keeps file order stable regardless of zip's central directory order.
    let mut files = files;
    files.sort();
    summary.files = files;
    Ok(summary)
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<String> {
    let mut file = archive
        .by_name(name)
        .map_err(|_| invalid(format!("missing {name}")))?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(content)
}

fn invalid(msg: impl Into<String>) -> Error {
    Error::PackagingFailed(msg.into())
}

fn xml_error(e: quick_xml::Error) -> Error {
    invalid(format!("XML error: {e}"))
}

/// Extract local name from namespaced XML name (e.g., "dc:title" -> "title").
fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// Resolve the predefined XML entities and character references.
fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        _ => {}
    }

    let code = if let Some(hex) = entity.strip_prefix("#x") {
        u32::from_str_radix(hex, 16).ok()
    } else {
        entity.strip_prefix('#').and_then(|dec| dec.parse().ok())
    };
    code.and_then(char::from_u32).map(String::from)
}

/// Parse META-INF/container.xml to find the OPF path.
fn parse_container_xml(content: &str) -> Result<String> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Empty(e) | Event::Start(e) if local_name(e.name().as_ref()) == b"rootfile" => {
                if let Some(path) = attr(&e, b"full-path") {
                    return Ok(path);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Err(invalid("no rootfile in container.xml"))
}

fn parse_opf(content: &str) -> Result<PackageSummary> {
    let mut reader = Reader::from_str(content);

    let mut summary = PackageSummary::default();
    let mut in_metadata = false;
    let mut current: Option<Vec<u8>> = None;
    let mut text = String::new();

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                match local {
                    b"metadata" => in_metadata = true,
                    b"title" | b"identifier" | b"language" | b"creator" | b"source"
                        if in_metadata =>
                    {
                        current = Some(local.to_vec());
                        text.clear();
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"item" => summary.manifest.push(ManifestEntry {
                        id: attr(&e, b"id").unwrap_or_default(),
                        href: attr(&e, b"href").unwrap_or_default(),
                        media_type: attr(&e, b"media-type").unwrap_or_default(),
                        properties: attr(&e, b"properties"),
                    }),
                    b"itemref" => {
                        if let Some(idref) = attr(&e, b"idref") {
                            summary.spine.push(idref);
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(e) => {
                if current.is_some() {
                    text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) => {
                if current.is_some()
                    && let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref()))
                {
                    text.push_str(&resolved);
                }
            }
            Event::End(e) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                if local == b"metadata" {
                    in_metadata = false;
                } else if current.as_deref() == Some(local) {
                    let value = std::mem::take(&mut text).trim().to_string();
                    match local {
                        b"title" => summary.title = value,
                        b"identifier" => summary.identifier = value,
                        b"language" => summary.language = value,
                        b"creator" => summary.creator = Some(value),
                        b"source" => summary.source = Some(value),
                        _ => {}
                    }
                    current = None;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(summary)
}

fn parse_ncx(content: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut sources = Vec::new();
    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Empty(e) | Event::Start(e) if local_name(e.name().as_ref()) == b"content" => {
                if let Some(src) = attr(&e, b"src") {
                    sources.push(src);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_container_xml() {
        let xml = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles><rootfile full-path="OPS/package.opf" media-type="application/oebps-package+xml"/></rootfiles>
</container>"#;
        assert_eq!(parse_container_xml(xml).unwrap(), "OPS/package.opf");
        assert!(parse_container_xml("<container/>").is_err());
    }

    #[test]
    fn test_parse_opf() {
        let opf = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="BookId">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="BookId">urn:uuid:1234</dc:identifier>
    <dc:title>Fish &amp; Chips</dc:title>
    <dc:language>en</dc:language>
    <dc:source>https://en.wikipedia.org/wiki/Fish_and_chips</dc:source>
  </metadata>
  <manifest>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="article" href="article.xhtml" media-type="application/xhtml+xml"/>
    <item id="image_0" href="images/img_0.png" media-type="image/png"/>
  </manifest>
  <spine toc="ncx"><itemref idref="article"/></spine>
</package>"#;

        let summary = parse_opf(opf).unwrap();
        assert_eq!(summary.title, "Fish & Chips");
        assert_eq!(summary.identifier, "urn:uuid:1234");
        assert_eq!(summary.language, "en");
        assert_eq!(
            summary.source.as_deref(),
            Some("https://en.wikipedia.org/wiki/Fish_and_chips")
        );
        assert_eq!(summary.manifest.len(), 3);
        assert_eq!(summary.spine, vec!["article"]);
        assert_eq!(summary.images().count(), 1);
    }

    #[test]
    fn test_duplicate_ids_and_dangling() {
        let summary = PackageSummary {
            manifest: vec![
                ManifestEntry {
                    id: "a".into(),
                    href: "a.xhtml".into(),
                    media_type: "application/xhtml+xml".into(),
                    properties: None,
                },
                ManifestEntry {
                    id: "a".into(),
                    href: "images/gone.png".into(),
                    media_type: "image/png".into(),
                    properties: None,
                },
            ],
            files: vec!["OEBPS/a.xhtml".into()],
            opf_base: "OEBPS/".into(),
            ..Default::default()
        };

        assert_eq!(summary.duplicate_ids(), vec!["a"]);
        let dangling: Vec<_> = summary.dangling_manifest().iter().map(|m| m.href.as_str()).collect();
        assert_eq!(dangling, vec!["images/gone.png"]);
    }

    #[test]
    fn test_resolve_entity() {
        assert_eq!(resolve_entity("amp").as_deref(), Some("&"));
        assert_eq!(resolve_entity("#x41").as_deref(), Some("A"));
        assert_eq!(resolve_entity("#66").as_deref(), Some("B"));
        assert_eq!(resolve_entity("nbsp"), None);
    }
}
