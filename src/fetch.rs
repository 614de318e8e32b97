use std::time::Duration;

use anyhow::{Context, Result};
use base64::Engine;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, warn};
use url::Url;

use crate::error::IngestError;
use crate::parser::record::ImageData;

const USER_AGENT: &str = concat!("exam_scraper/", env!("CARGO_PKG_VERSION"));
const PAGE_TIMEOUT: Duration = Duration::from_secs(30);
const IMAGE_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_IMAGE_TYPE: &str = "image/png";

pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Network access used by an ingestion run.
pub trait Fetcher {
    async fn fetch_page(&self, url: &str) -> Result<String>;
    async fn fetch_image(&self, url: &str) -> Result<FetchedImage>;
}

/// Plain HTTP fetcher. Non-2xx responses are errors.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(PAGE_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch_page(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let body = response.text().await.context("Failed to read page body")?;
        Ok(body)
    }

    async fn fetch_image(&self, url: &str) -> Result<FetchedImage> {
        let response = self
            .client
            .get(url)
            .timeout(IMAGE_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();
        Ok(FetchedImage {
            bytes,
            content_type,
        })
    }
}

/// Resolve an image reference against the page it appeared on.
/// Absolute references come back untouched.
pub fn resolve_url(image_ref: &str, page_url: &str) -> String {
    if Url::parse(image_ref).is_ok() {
        return image_ref.to_string();
    }
    match Url::parse(page_url).and_then(|base| base.join(image_ref)) {
        Ok(url) => url.to_string(),
        Err(e) => {
            debug!(image_ref, page_url, "could not resolve image url: {}", e);
            image_ref.to_string()
        }
    }
}

/// Download an image; any failure becomes `DownloadFailed`.
pub async fn download_image<F: Fetcher>(
    fetcher: &F,
    url: &str,
) -> Result<(Vec<u8>, String), IngestError> {
    match fetcher.fetch_image(url).await {
        Ok(img) => {
            let mime = img
                .content_type
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_IMAGE_TYPE.to_string());
            Ok((img.bytes, mime))
        }
        Err(e) => Err(IngestError::DownloadFailed {
            url: url.to_string(),
            reason: format!("{:#}", e),
        }),
    }
}

/// Resolve and optionally download a question image. Never fails: a broken
/// download is logged and the record keeps the URL alone.
pub async fn resolve_image<F: Fetcher>(
    fetcher: &F,
    image_ref: &str,
    page_url: &str,
    download: bool,
) -> ImageData {
    let url = resolve_url(image_ref, page_url);
    if !download {
        return ImageData::url_only(url);
    }

    debug!(%url, "downloading image");
    match download_image(fetcher, &url).await {
        Ok((data, mime)) => ImageData {
            url,
            data: Some(data),
            mime_type: Some(mime),
        },
        Err(e) => {
            warn!("{}; keeping url only", e);
            ImageData::url_only(url)
        }
    }
}

/// Image payloads are stored as base64 text.
pub fn encode_image(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}


#[cfg(test)]
mod tests {
    use super::fake::FakeFetcher;
    use super::*;

    #[test]
    fn relative_ref_resolves_against_origin() {
        assert_eq!(
            resolve_url("/img/q1.png", "https://site.test/page-3"),
            "https://site.test/img/q1.png"
        );
        assert_eq!(
            resolve_url("img/q1.png", "https://site.test/dumps/page-3"),
            "https://site.test/dumps/img/q1.png"
        );
    }

    #[test]
    fn absolute_ref_passes_through() {
        let abs = "https://cdn.test/path/q1.png";
        assert_eq!(resolve_url(abs, "https://site.test/page-3"), abs);
    }

    #[test]
    fn unresolvable_base_keeps_ref() {
        assert_eq!(resolve_url("/img/q1.png", "not a url"), "/img/q1.png");
    }

    #[tokio::test]
    async fn no_download_means_no_request() {
        let fetcher = FakeFetcher::default();
        let img = resolve_image(&fetcher, "/img/q1.png", "https://site.test/page-3", false).await;
        assert_eq!(img.url, "https://site.test/img/q1.png");
        assert!(img.data.is_none());
        assert!(img.mime_type.is_none());
        assert!(fetcher.requests.borrow().is_empty());
    }

    #[tokio::test]
    async fn download_carries_bytes_and_type() {
        let fetcher = FakeFetcher::default().image(
            "https://site.test/img/q1.png",
            b"\x89PNG",
            Some("image/jpeg"),
        );
        let img = resolve_image(&fetcher, "/img/q1.png", "https://site.test/page-3", true).await;
        assert_eq!(img.data.as_deref(), Some(&b"\x89PNG"[..]));
        assert_eq!(img.mime_type.as_deref(), Some("image/jpeg"));
    }

    #[tokio::test]
    async fn missing_content_type_defaults() {
        let fetcher = FakeFetcher::default().image("https://site.test/a.gif", b"GIF", None);
        let (_, mime) = download_image(&fetcher, "https://site.test/a.gif").await.unwrap();
        assert_eq!(mime, "image/png");
    }

    #[tokio::test]
    async fn failed_download_falls_back_to_url() {
        let fetcher = FakeFetcher::default();
        let err = download_image(&fetcher, "https://site.test/gone.png").await.unwrap_err();
        assert!(matches!(err, IngestError::DownloadFailed { .. }));

        let img = resolve_image(&fetcher, "/gone.png", "https://site.test/page-1", true).await;
        assert_eq!(img, ImageData::url_only("https://site.test/gone.png".into()));
    }

    #[test]
    fn base64_encoding() {
        assert_eq!(encode_image(b"hello"), "aGVsbG8=");
    }
}
