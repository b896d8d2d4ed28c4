//! Article-to-book pipeline and batch runner.
//!
//! One article runs: identifier, then extract fetch and rendered-page fetch
//! side by side, then document building, image resolution and packaging.
//! Articles in a batch share nothing; one failing never affects another.

use std::thread;

use tracing::{debug, error, info};

use crate::api::{ContentApi, fetch_content};
use crate::assets::resolve_assets;
use crate::config::{Config, ContentSource};
use crate::deliver::Delivery;
use crate::document::{build_document, parse_extract};
use crate::dom::parse_html;
use crate::error::{Error, Result};
use crate::export::{EpubConfig, EpubExporter};
use crate::identifier::{ArticleId, host_language, wiki_host};
use crate::locator::{SectionImageMap, locate_section_images, section_images};
use crate::model::Manuscript;
use crate::sanitize::sanitize_body;

/// A packaged article.
#[derive(Debug, Clone)]
pub struct Converted {
    pub title: String,
    /// Filesystem-safe `<title>.epub`.
    pub filename: String,
    pub bytes: Vec<u8>,
    /// Section images that were downloaded and embedded.
    pub images_embedded: usize,
    /// Section images the body refers to.
    pub images_total: usize,
}

/// Summary of a delivered article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub title: String,
    pub filename: String,
    pub images_embedded: usize,
    pub images_total: usize,
}

/// Result for one URL of a batch.
#[derive(Debug)]
pub struct ArticleOutcome {
    pub url: String,
    pub result: Result<Delivered>,
}

impl ArticleOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

enum SidePage {
    Sections(SectionImageMap),
    Html(String),
}

/// Convert one article URL into EPUB bytes.
pub fn convert_article<A>(api: &A, url: &str, config: &Config) -> Result<Converted>
where
    A: ContentApi + ?Sized,
{
    let id = ArticleId::from_url(url)?;
    info!(article = %id, url, "Converting article");

    // The rendered page is only needed for section images (extract mode) or
    // the whole body (html mode); fetch it next to the extract either way.
    let (fetched, side) = thread::scope(|scope| {
        let side = scope.spawn(|| match config.content_source {
            ContentSource::Extract => Ok(SidePage::Sections(locate_section_images(api, &id))),
            ContentSource::Html => api.fetch_rendered_html(&id).map(SidePage::Html),
        });
        let fetched = fetch_content(api, &id);
        let side = side
            .join()
            .unwrap_or_else(|_| Err(Error::FetchFailed("rendered page fetch panicked".into())));
        (fetched, side)
    });
    let fetched = fetched?;

    let (segments, sections) = match side? {
        SidePage::Sections(sections) => (parse_extract(&fetched.content.raw_extract), sections),
        SidePage::Html(html) => {
            let dom = parse_html(&html);
            (sanitize_body(&dom), section_images(&dom))
        }
    };

    let mut document = build_document(segments, &sections);
    let images_total = document.images.len();
    let images_embedded = resolve_assets(api, &mut document.images, config.download_concurrency());
    debug!(
        article = %id,
        blocks = document.blocks.len(),
        images_embedded,
        images_total,
        "document built"
    );

    let title = fetched.content.title;
    let mut manuscript = Manuscript::new(title.clone())
        .with_source_url(url.trim())
        .with_language(resolve_language(config, url));
    manuscript.lead_image = fetched.lead_image;
    manuscript.body = document.blocks;
    manuscript.section_images = document.images;

    let exporter = EpubExporter::new().with_config(EpubConfig {
        author: config.author.clone(),
        ..EpubConfig::default()
    });
    let bytes = exporter.to_bytes(&manuscript).map_err(packaging_error)?;

    Ok(Converted {
        filename: safe_filename(&title),
        title,
        bytes,
        images_embedded,
        images_total,
    })
}

/// Convert and deliver every URL, isolating failures per article.
///
/// `api_for` supplies the API handle for each URL, which lets a client
/// follow the wiki host named in the URL.
pub fn run_batch<F, A, D>(
    urls: &[String],
    config: &Config,
    api_for: F,
    delivery: &D,
) -> Vec<ArticleOutcome>
where
    F: Fn(&str) -> A,
    A: ContentApi,
    D: Delivery + ?Sized,
{
    urls.iter()
        .map(|url| {
            let api = api_for(url);
            let result = convert_article(&api, url, config).and_then(|converted| {
                let subject = format!("Convert: {}", converted.title);
                delivery.deliver(&subject, &converted.bytes, &converted.filename)?;
                Ok(Delivered {
                    title: converted.title,
                    filename: converted.filename,
                    images_embedded: converted.images_embedded,
                    images_total: converted.images_total,
                })
            });

            match &result {
                Ok(done) => info!(url = %url, title = %done.title, file = %done.filename, "Article done"),
                Err(err) => error!(url = %url, error = %err, "Article failed"),
            }

            ArticleOutcome {
                url: url.clone(),
                result,
            }
        })
        .collect()
}

/// Split comma-separated URL arguments, dropping blanks.
pub fn split_urls<S: AsRef<str>>(inputs: &[S]) -> Vec<String> {
    inputs
        .iter()
        .flat_map(|input| input.as_ref().split(','))
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect()
}

/// `<title>.epub` keeping only alphanumerics, space, hyphen and underscore.
///
/// ```
/// use wikibook::pipeline::safe_filename;
///
/// assert_eq!(safe_filename("C++ (programming language)"), "C programming language.epub");
/// assert_eq!(safe_filename("???"), "article.epub");
/// ```
pub fn safe_filename(title: &str) -> String {
    let safe: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let safe = safe.trim();
    if safe.is_empty() {
        "article.epub".to_string()
    } else {
        format!("{safe}.epub")
    }
}

/// Write errors while packaging count as packaging failures.
fn packaging_error(err: Error) -> Error {
    match err {
        Error::Io(io) => Error::PackagingFailed(io.to_string()),
        other => other,
    }
}

/// Configured language, else the one implied by the URL's wiki host.
fn resolve_language(config: &Config, url: &str) -> String {
    config
        .language
        .clone()
        .or_else(|| {
            wiki_host(url)
                .as_deref()
                .and_then(host_language)
                .map(str::to_string)
        })
        .unwrap_or_else(|| "en".to_string())
}
