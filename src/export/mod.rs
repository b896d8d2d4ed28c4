//! Export of finished manuscripts.
//!
//! The `Exporter` trait writes to any `Write + Seek` destination:
//! `std::fs::File`, `std::io::Cursor<Vec<u8>>`, and so on.

use std::io::{Seek, Write};

use crate::error::Result;
use crate::model::Manuscript;

mod epub;
mod inspect;

pub use epub::{CHAPTER_HREF, CHAPTER_ID, EpubConfig, EpubExporter, IMAGE_DIR, escape_xml, render_chapter};
pub use inspect::{ManifestEntry, PackageSummary, inspect_epub};

/// Trait for packaging a manuscript into a container format.
pub trait Exporter {
    /// Export the manuscript to the provided writer.
    fn export<W: Write + Seek>(&self, manuscript: &Manuscript, writer: &mut W) -> Result<()>;
}
