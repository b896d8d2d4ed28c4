//! Image download with per-asset failure isolation.
//!
//! Every download ends in an [`AssetOutcome`]; a failed image leaves its
//! asset without bytes and never stops the others.

use std::thread;

use tracing::{debug, warn};

use crate::api::ContentApi;
use crate::model::ImageAsset;

/// Result of fetching one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetOutcome {
    Fetched(Vec<u8>),
    /// Download failed or returned nothing; carries the reason.
    Unavailable(String),
}

impl AssetOutcome {
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            AssetOutcome::Fetched(bytes) => Some(bytes),
            AssetOutcome::Unavailable(_) => None,
        }
    }
}

/// Download one image.
pub fn fetch_asset<A>(api: &A, url: &str) -> AssetOutcome
where
    A: ContentApi + ?Sized,
{
    match api.fetch_bytes(url) {
        Ok(bytes) if bytes.is_empty() => AssetOutcome::Unavailable("empty response".to_string()),
        Ok(bytes) => AssetOutcome::Fetched(bytes),
        Err(err) => AssetOutcome::Unavailable(err.to_string()),
    }
}

/// Attach bytes to every unresolved asset, using at most `concurrency`
/// worker threads. Returns how many assets ended up with bytes.
///
/// Each worker owns a disjoint slice of `assets`, so results land in their
/// own slots without locking.
pub fn resolve_assets<A>(api: &A, assets: &mut [ImageAsset], concurrency: usize) -> usize
where
    A: ContentApi + ?Sized,
{
    if assets.is_empty() {
        return 0;
    }

    let workers = concurrency.clamp(1, assets.len());
    let chunk_size = assets.len().div_ceil(workers);

    thread::scope(|scope| {
        for chunk in assets.chunks_mut(chunk_size) {
            scope.spawn(move || {
                for asset in chunk.iter_mut().filter(|a| !a.is_resolved()) {
                    resolve_one(api, asset);
                }
            });
        }
    });

    let resolved = assets.iter().filter(|a| a.is_resolved()).count();
    debug!(resolved, total = assets.len(), "resolved section images");
    resolved
}

fn resolve_one<A>(api: &A, asset: &mut ImageAsset)
where
    A: ContentApi + ?Sized,
{
    match fetch_asset(api, &asset.source_url) {
        AssetOutcome::Fetched(bytes) => asset.bytes = Some(bytes),
        AssetOutcome::Unavailable(reason) => {
            warn!(
                file = %asset.local_filename,
                url = %asset.source_url,
                reason = %reason,
                "image unavailable"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::api::ExtractPage;
    use crate::error::{Error, Result};
    use crate::identifier::ArticleId;

    /// Serves bytes for every URL not containing "broken".
    struct MediaStub {
        calls: AtomicUsize,
    }

    impl ContentApi for MediaStub {
        fn fetch_extract(&self, id: &ArticleId) -> Result<ExtractPage> {
            Err(Error::ArticleNotFound(id.to_string()))
        }

        fn fetch_rendered_html(&self, id: &ArticleId) -> Result<String> {
            Err(Error::ArticleNotFound(id.to_string()))
        }

        fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if url.contains("broken") {
                Err(Error::FetchFailed(format!("404 for {url}")))
            } else if url.contains("empty") {
                Ok(Vec::new())
            } else {
                Ok(url.as_bytes().to_vec())
            }
        }
    }

    fn stub() -> MediaStub {
        MediaStub {
            calls: AtomicUsize::new(0),
        }
    }

    fn assets(urls: &[&str]) -> Vec<ImageAsset> {
        urls.iter()
            .enumerate()
            .map(|(i, url)| ImageAsset::new(format!("img_{i}.jpg"), *url))
            .collect()
    }

    #[test]
    fn test_one_failure_does_not_stop_others() {
        let api = stub();
        let mut list = assets(&["https://m/a.jpg", "https://m/broken.jpg", "https://m/c.jpg"]);

        let resolved = resolve_assets(&api, &mut list, 2);

        assert_eq!(resolved, 2);
        assert_eq!(list[0].bytes.as_deref(), Some(&b"https://m/a.jpg"[..]));
        assert!(list[1].bytes.is_none());
        assert_eq!(list[2].bytes.as_deref(), Some(&b"https://m/c.jpg"[..]));
    }

    #[test]
    fn test_each_slot_gets_its_own_bytes() {
        let api = stub();
        let urls: Vec<String> = (0..17).map(|i| format!("https://m/{i}.png")).collect();
        let refs: Vec<&str> = urls.iter().map(String::as_str).collect();
        let mut list = assets(&refs);

        assert_eq!(resolve_assets(&api, &mut list, 4), 17);
        for asset in &list {
            assert_eq!(asset.bytes.as_deref(), Some(asset.source_url.as_bytes()));
        }
        assert_eq!(api.calls.load(Ordering::SeqCst), 17);
    }

    #[test]
    fn test_already_resolved_not_refetched() {
        let api = stub();
        let mut list = vec![
            ImageAsset::new("lead.jpg", "https://m/lead.jpg").with_bytes(vec![1, 2, 3]),
            ImageAsset::new("img_0.jpg", "https://m/x.jpg"),
        ];

        assert_eq!(resolve_assets(&api, &mut list, 8), 2);
        assert_eq!(list[0].bytes.as_deref(), Some(&[1u8, 2, 3][..]));
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_body_is_unavailable() {
        let api = stub();
        assert_eq!(
            fetch_asset(&api, "https://m/empty.jpg"),
            AssetOutcome::Unavailable("empty response".to_string())
        );
    }

    #[test]
    fn test_no_assets() {
        let api = stub();
        assert_eq!(resolve_assets(&api, &mut [], 4), 0);
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }
}
