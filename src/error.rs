//! Error types for article conversion.
//!
//! Only failures that end an article (or the whole run) live here. Per-image
//! download failures and a missing rendered page are absorbed where they
//! happen and never become an [`Error`].

use thiserror::Error;

/// Errors that can occur while converting an article.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid article URL: {0}")]
    InvalidUrl(String),

    #[error("article not found: {0}")]
    ArticleNotFound(String),

    #[error("fetch failed: {0}")]
    FetchFailed(String),

    #[error("packaging failed: {0}")]
    PackagingFailed(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("delivery failed: {0}")]
    Delivery(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::FetchFailed(err.to_string())
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::PackagingFailed(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
