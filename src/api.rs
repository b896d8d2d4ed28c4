//! Content API access.
//!
//! [`ContentApi`] is the seam between the pipeline and the network:
//! [`WikiClient`] talks to a MediaWiki `api.php` endpoint over HTTP, tests
//! substitute an in-memory implementation.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::document::image_extension;
use crate::error::{Error, Result};
use crate::identifier::{ArticleId, wiki_host};
use crate::model::{ArticleContent, ImageAsset};

/// Plain-text extract page as reported by the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractPage {
    pub title: String,
    pub extract: String,
    /// Lead thumbnail URL, when the article has one.
    pub thumbnail: Option<String>,
}

/// Remote operations the conversion pipeline needs.
pub trait ContentApi: Sync {
    /// Plain-text extract (section markers kept) and lead thumbnail.
    fn fetch_extract(&self, id: &ArticleId) -> Result<ExtractPage>;

    /// Fully rendered article HTML.
    fn fetch_rendered_html(&self, id: &ArticleId) -> Result<String>;

    /// Raw bytes of a media URL.
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;
}

impl<T: ContentApi + ?Sized> ContentApi for &T {
    fn fetch_extract(&self, id: &ArticleId) -> Result<ExtractPage> {
        (**self).fetch_extract(id)
    }

    fn fetch_rendered_html(&self, id: &ArticleId) -> Result<String> {
        (**self).fetch_rendered_html(id)
    }

    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        (**self).fetch_bytes(url)
    }
}

/// Article text plus the lead image, if it could be downloaded.
#[derive(Debug, Clone)]
pub struct FetchedArticle {
    pub content: ArticleContent,
    pub lead_image: Option<ImageAsset>,
}

/// Fetch the article extract and its lead image.
///
/// A lead image that fails to download is dropped, not reported.
pub fn fetch_content<A>(api: &A, id: &ArticleId) -> Result<FetchedArticle>
where
    A: ContentApi + ?Sized,
{
    let page = api.fetch_extract(id)?;

    let lead_image = page.thumbnail.as_deref().and_then(|url| {
        match api.fetch_bytes(url) {
            Ok(bytes) if !bytes.is_empty() => {
                let filename = format!("lead.{}", image_extension(url));
                Some(ImageAsset::new(filename, url).with_bytes(bytes))
            }
            Ok(_) => {
                warn!(article = %id, url, "lead image empty, skipping");
                None
            }
            Err(err) => {
                warn!(article = %id, url, error = %err, "lead image unavailable");
                None
            }
        }
    });

    Ok(FetchedArticle {
        content: ArticleContent {
            title: page.title,
            raw_extract: page.extract,
        },
        lead_image,
    })
}

/// Blocking HTTP client for a MediaWiki host.
#[derive(Debug, Clone)]
pub struct WikiClient {
    http: Client,
    api_url: String,
    thumbnail_width: u32,
    image_timeout: Duration,
}

impl WikiClient {
    /// Build a client for the configured default host.
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_url: api_url(&config.default_host),
            thumbnail_width: config.thumbnail_width,
            image_timeout: Duration::from_secs(config.image_timeout_secs),
        })
    }

    /// Same client pointed at another wiki host (e.g. `de.wikipedia.org`).
    pub fn for_host(&self, host: &str) -> Self {
        Self {
            api_url: api_url(host),
            ..self.clone()
        }
    }

    /// Client for the wiki host named in `url`, or this one if it names none.
    pub fn for_url(&self, url: &str) -> Self {
        match wiki_host(url) {
            Some(host) => self.for_host(&host),
            None => self.clone(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn get_text(&self, query: &[(&str, &str)]) -> Result<String> {
        let response = self
            .http
            .get(&self.api_url)
            .query(query)
            .send()?
            .error_for_status()?;
        Ok(response.text()?)
    }
}

fn api_url(host: &str) -> String {
    format!("https://{host}/w/api.php")
}

impl ContentApi for WikiClient {
    fn fetch_extract(&self, id: &ArticleId) -> Result<ExtractPage> {
        let title = id.decoded();
        let width = self.thumbnail_width.to_string();
        debug!(article = %id, api = %self.api_url, "fetching extract");

        let body = self.get_text(&[
            ("action", "query"),
            ("format", "json"),
            ("formatversion", "2"),
            ("redirects", "1"),
            ("prop", "extracts|pageimages"),
            ("explaintext", "1"),
            ("exsectionformat", "wiki"),
            ("piprop", "thumbnail"),
            ("pithumbsize", width.as_str()),
            ("titles", title.as_ref()),
        ])?;
        parse_extract_response(&body, id)
    }

    fn fetch_rendered_html(&self, id: &ArticleId) -> Result<String> {
        let title = id.decoded();
        debug!(article = %id, api = %self.api_url, "fetching rendered html");

        let body = self.get_text(&[
            ("action", "parse"),
            ("format", "json"),
            ("formatversion", "2"),
            ("redirects", "1"),
            ("prop", "text"),
            ("disableeditsection", "1"),
            ("page", title.as_ref()),
        ])?;
        parse_rendered_response(&body, id)
    }

    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .timeout(self.image_timeout)
            .send()?
            .error_for_status()?;
        Ok(response.bytes()?.to_vec())
    }
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    #[serde(default)]
    info: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    error: Option<ApiError>,
    query: Option<QueryBody>,
}

#[derive(Debug, Deserialize)]
struct QueryBody {
    #[serde(default)]
    pages: Vec<QueryPage>,
}

#[derive(Debug, Deserialize)]
struct QueryPage {
    #[serde(default)]
    title: String,
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    invalid: bool,
    extract: Option<String>,
    thumbnail: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    source: String,
}

#[derive(Debug, Deserialize)]
struct ParseResponse {
    error: Option<ApiError>,
    parse: Option<ParseBody>,
}

#[derive(Debug, Deserialize)]
struct ParseBody {
    text: String,
}

/// Interpret an `action=query` extracts response (format version 2).
pub fn parse_extract_response(body: &str, id: &ArticleId) -> Result<ExtractPage> {
    let response: QueryResponse = serde_json::from_str(body)
        .map_err(|e| Error::FetchFailed(format!("malformed extract response: {e}")))?;

    if let Some(err) = response.error {
        return Err(Error::FetchFailed(format!("{}: {}", err.code, err.info)));
    }

    let page = response
        .query
        .and_then(|q| q.pages.into_iter().next())
        .ok_or_else(|| Error::FetchFailed(format!("no page in response for {id}")))?;

    if page.missing || page.invalid {
        return Err(Error::ArticleNotFound(id.to_string()));
    }

    let extract = page
        .extract
        .ok_or_else(|| Error::FetchFailed(format!("no extract returned for {id}")))?;
    let title = if page.title.is_empty() {
        id.decoded().replace('_', " ")
    } else {
        page.title
    };

    Ok(ExtractPage {
        title,
        extract,
        thumbnail: page.thumbnail.map(|t| t.source),
    })
}

/// Interpret an `action=parse` response (format version 2).
pub fn parse_rendered_response(body: &str, id: &ArticleId) -> Result<String> {
    let response: ParseResponse = serde_json::from_str(body)
        .map_err(|e| Error::FetchFailed(format!("malformed parse response: {e}")))?;

    if let Some(err) = response.error {
        return Err(match err.code.as_str() {
            "missingtitle" | "invalidtitle" => Error::ArticleNotFound(id.to_string()),
            _ => Error::FetchFailed(format!("{}: {}", err.code, err.info)),
        });
    }

    response
        .parse
        .map(|p| p.text)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| Error::FetchFailed(format!("empty rendered page for {id}")))
}
