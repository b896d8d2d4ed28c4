//! Data carried between pipeline stages.
//!
//! A [`Manuscript`] owns everything needed to package one article: the
//! title, the ordered body blocks and every image asset the body refers to.

use crate::document::Block;

/// Plain-text article as returned by the content API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleContent {
    /// Display title returned by the API (redirects resolved).
    pub title: String,
    /// Extract with `== Section ==` markers preserved.
    pub raw_extract: String,
}

/// An image referenced from the book, with its bytes once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    /// Filename inside the container's `images/` directory.
    pub local_filename: String,
    pub source_url: String,
    /// `None` until resolved, and still `None` if the download failed.
    pub bytes: Option<Vec<u8>>,
}

impl ImageAsset {
    pub fn new(local_filename: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            local_filename: local_filename.into(),
            source_url: source_url.into(),
            bytes: None,
        }
    }

    pub fn with_bytes(mut self, bytes: Vec<u8>) -> Self {
        self.bytes = Some(bytes);
        self
    }

    pub fn is_resolved(&self) -> bool {
        self.bytes.is_some()
    }
}

/// Aggregate handed to the packager.
#[derive(Debug, Clone, Default)]
pub struct Manuscript {
    pub title: String,
    /// URL the article was requested with, recorded as `dc:source`.
    pub source_url: Option<String>,
    /// BCP 47 language tag for the package metadata.
    pub language: String,
    pub lead_image: Option<ImageAsset>,
    pub body: Vec<Block>,
    pub section_images: Vec<ImageAsset>,
}

impl Manuscript {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            language: "en".to_string(),
            ..Default::default()
        }
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}
