use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::IngestError;

pub const DEFAULT_DB_PATH: &str = "data/exam_questions.sqlite";
pub const PAGE_PLACEHOLDER: &str = "{page}";

/// One topic to ingest: a page URL pattern plus an inclusive page range.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct IngestionJob {
    /// Page URL containing a `{page}` placeholder.
    pub url_template: String,
    pub topic: String,
    pub start_page: u32,
    pub end_page: u32,
    #[serde(default = "default_download_images")]
    pub download_images: bool,
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
}

fn default_download_images() -> bool {
    true
}

fn default_page_delay_ms() -> u64 {
    1000
}

impl IngestionJob {
    pub fn validate(&self) -> Result<(), IngestError> {
        if !self.url_template.contains(PAGE_PLACEHOLDER) {
            return Err(IngestError::InvalidTemplate(self.url_template.clone()));
        }
        Ok(())
    }

    pub fn page_url(&self, page: u32) -> String {
        self.url_template.replace(PAGE_PLACEHOLDER, &page.to_string())
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn page_count(&self) -> u64 {
        if self.end_page < self.start_page {
            0
        } else {
            (self.end_page - self.start_page) as u64 + 1
        }
    }
}

/// Load a JSON array of jobs and validate all of them up front.
pub fn load_jobs(path: &Path) -> Result<Vec<IngestionJob>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read jobs file {}", path.display()))?;
    let jobs: Vec<IngestionJob> = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid jobs file {}", path.display()))?;
    for job in &jobs {
        job.validate()?;
    }
    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(template: &str) -> IngestionJob {
        IngestionJob {
            url_template: template.to_string(),
            topic: "AWS SAA-C03".to_string(),
            start_page: 2,
            end_page: 4,
            download_images: false,
            page_delay_ms: 0,
        }
    }

    #[test]
    fn page_url_substitutes_placeholder() {
        let j = job("https://site.test/free-saa-c03/page-{page}");
        assert_eq!(j.page_url(3), "https://site.test/free-saa-c03/page-3");
        assert_eq!(j.page_count(), 3);
    }

    #[test]
    fn template_without_placeholder_is_rejected() {
        let err = job("https://site.test/page-1").validate().unwrap_err();
        assert!(matches!(err, IngestError::InvalidTemplate(_)));
    }

    #[test]
    fn inverted_range_is_empty() {
        let mut j = job("https://site.test/page-{page}");
        j.start_page = 5;
        j.end_page = 4;
        assert_eq!(j.page_count(), 0);
    }

    #[test]
    fn sample_jobs_file_loads() {
        let jobs = load_jobs(Path::new("jobs.sample.json")).unwrap();
        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[0].page_count(), 151);
        assert_eq!(jobs[0].page_url(2), "https://free-braindumps.com/amazon/free-saa-c03-braindumps/page-2");
        assert!(!jobs[2].download_images);
    }

    #[test]
    fn jobs_file_defaults() {
        let raw = r#"[
            {"url_template": "https://site.test/az-104/page-{page}", "topic": "Azure AZ-104",
             "start_page": 2, "end_page": 40},
            {"url_template": "https://site.test/tf/page-{page}", "topic": "Hashicorp Terraform Associate",
             "start_page": 2, "end_page": 51, "download_images": false, "page_delay_ms": 250}
        ]"#;
        let dir = std::env::temp_dir().join(format!("exam_scraper_jobs_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("jobs.json");
        std::fs::write(&path, raw).unwrap();

        let jobs = load_jobs(&path).unwrap();
        assert_eq!(jobs.len(), 2);
        assert!(jobs[0].download_images);
        assert_eq!(jobs[0].page_delay(), Duration::from_secs(1));
        assert!(!jobs[1].download_images);
        assert_eq!(jobs[1].page_delay_ms, 250);

        std::fs::write(&path, r#"[{"url_template": "x", "topic": "t", "start_page": 1, "end_page": 1}]"#)
            .unwrap();
        assert!(load_jobs(&path).is_err());

        std::fs::remove_dir_all(&dir).ok();
    }
}
