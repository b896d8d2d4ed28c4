//! # wikibook
//!
//! Turn Wikipedia articles into EPUB books, with each section's images
//! placed after its heading.
//!
//! ## Pipeline
//!
//! - [`ArticleId::from_url`] pulls the article identifier out of a URL
//! - [`api::fetch_content`] gets the plain-text extract and lead image
//! - [`locator::section_images`] maps rendered-page figures to headings
//! - [`document::build_document`] interleaves text blocks and image slots
//! - [`assets::resolve_assets`] downloads images with bounded concurrency
//! - [`export::EpubExporter`] packages everything as EPUB 3
//!
//! [`pipeline::run_batch`] runs all of it for a list of URLs and hands each
//! finished book to a [`deliver::Delivery`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use wikibook::{Config, WikiClient, pipeline::convert_article};
//!
//! let config = Config::default();
//! let client = WikiClient::new(&config).unwrap();
//! let book = convert_article(
//!     &client,
//!     "https://en.wikipedia.org/wiki/Rust_(programming_language)",
//!     &config,
//! )
//! .unwrap();
//! std::fs::write(&book.filename, &book.bytes).unwrap();
//! ```
//!
//! ## Building a book by hand
//!
//! ```
//! use wikibook::{ImageAsset, Manuscript, document::Block, export::EpubExporter};
//!
//! let mut book = Manuscript::new("Ferris").with_language("en");
//! book.body.push(Block::Heading(2, "Habitat".to_string()));
//! book.body.push(Block::Paragraph("Crabs live by the sea.".to_string()));
//! book.section_images.push(
//!     ImageAsset::new("img_0.png", "https://upload.wikimedia.org/a/Crab.png")
//!         .with_bytes(vec![0x89, b'P', b'N', b'G']),
//! );
//!
//! let bytes = EpubExporter::new().to_bytes(&book).unwrap();
//! assert_eq!(&bytes[..2], b"PK");
//! ```

pub mod api;
pub mod assets;
pub mod config;
pub mod deliver;
pub mod document;
pub mod dom;
pub mod error;
pub mod export;
pub mod identifier;
pub mod locator;
pub mod model;
pub mod pipeline;
pub mod sanitize;

pub use api::{ContentApi, WikiClient};
pub use config::{Config, ContentSource};
pub use deliver::{Delivery, DirectoryDelivery};
pub use error::{Error, Result};
pub use identifier::ArticleId;
pub use model::{ArticleContent, ImageAsset, Manuscript};
pub use pipeline::{ArticleOutcome, convert_article, run_batch};
