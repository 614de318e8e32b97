use thiserror::Error;

/// Failures an ingestion run can hit, from smallest to largest blast radius.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Image fetch failed; the question keeps its URL and loses the payload.
    #[error("image download failed for {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("failed to fetch page {page} ({url}): {reason}")]
    PageFetchFailed { page: u32, url: String, reason: String },

    #[error("failed to parse page {page}: {reason}")]
    PageParseFailed { page: u32, reason: String },

    /// Fatal to the whole run.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] rusqlite::Error),

    #[error("url template {0:?} has no {{page}} placeholder")]
    InvalidTemplate(String),
}

impl IngestError {
    /// Page-scoped failures are counted and skipped; everything else ends the run.
    pub fn is_page_scoped(&self) -> bool {
        matches!(
            self,
            IngestError::PageFetchFailed { .. } | IngestError::PageParseFailed { .. }
        )
    }
}
