use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use tracing::{error, info, warn};

use crate::config::IngestionJob;
use crate::db;
use crate::error::IngestError;
use crate::fetch::{resolve_image, Fetcher};
use crate::parser::{self, options, record};
use crate::parser::record::QuestionRecord;

/// Outcome counters for one ingestion run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestionSummary {
    pub pages_ok: usize,
    pub pages_failed: usize,
    pub questions_persisted: usize,
    pub questions_rejected: usize,
}

impl IngestionSummary {
    pub fn print(&self, topic: &str, table_id: &str) {
        println!(
            "{}: {} pages ok, {} failed; {} questions saved, {} rejected -> table '{}'",
            topic,
            self.pages_ok,
            self.pages_failed,
            self.questions_persisted,
            self.questions_rejected,
            table_id,
        );
    }
}

#[derive(Default)]
struct PageOutcome {
    records: Vec<QuestionRecord>,
    rejected: usize,
}

/// Ingest every page of a job, one page at a time.
///
/// Fetch and parse failures are contained to their page. Storage failures
/// end the run.
pub async fn run<F: Fetcher>(
    fetcher: &F,
    conn: &Connection,
    job: &IngestionJob,
) -> Result<IngestionSummary, IngestError> {
    job.validate()?;
    let table_id = db::table_for_topic(&job.topic);
    db::ensure_topic_table(conn, &table_id)?;
    info!(topic = %job.topic, table = %table_id, "table ready");

    let pb = ProgressBar::new(job.page_count());
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40} {pos}/{len} pages ({per_sec}, eta {eta})")
    {
        pb.set_style(style.progress_chars("=> "));
    }

    let mut summary = IngestionSummary::default();
    let delay = job.page_delay();

    for page in job.start_page..=job.end_page {
        let url = job.page_url(page);
        info!(page, topic = %job.topic, %url, "scraping page");

        match ingest_page(fetcher, job, &table_id, page, &url).await {
            Ok(outcome) => {
                let saved = db::save_questions(conn, &table_id, &outcome.records)?;
                summary.pages_ok += 1;
                summary.questions_persisted += saved;
                summary.questions_rejected += outcome.rejected;
                info!(page, saved, rejected = outcome.rejected, "page done");
            }
            Err(e) if e.is_page_scoped() => {
                summary.pages_failed += 1;
                error!(page, "{}", e);
            }
            Err(e) => {
                pb.finish_and_clear();
                return Err(e);
            }
        }
        pb.inc(1);

        if page < job.end_page {
            pause(delay).await;
        }
    }

    pb.finish_and_clear();
    info!(
        topic = %job.topic,
        pages_ok = summary.pages_ok,
        pages_failed = summary.pages_failed,
        persisted = summary.questions_persisted,
        rejected = summary.questions_rejected,
        "ingestion complete"
    );
    Ok(summary)
}

/// Run jobs in order with a pause between them. Stops at the first storage failure.
pub async fn run_all<F: Fetcher>(
    fetcher: &F,
    conn: &Connection,
    jobs: &[IngestionJob],
    job_delay: Duration,
) -> Result<Vec<IngestionSummary>, IngestError> {
    let mut summaries = Vec::with_capacity(jobs.len());
    for (i, job) in jobs.iter().enumerate() {
        if i > 0 {
            pause(job_delay).await;
        }
        summaries.push(run(fetcher, conn, job).await?);
    }
    Ok(summaries)
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

async fn ingest_page<F: Fetcher>(
    fetcher: &F,
    job: &IngestionJob,
    table_id: &str,
    page: u32,
    url: &str,
) -> Result<PageOutcome, IngestError> {
    let html = fetcher
        .fetch_page(url)
        .await
        .map_err(|e| IngestError::PageFetchFailed {
            page,
            url: url.to_string(),
            reason: format!("{:#}", e),
        })?;

    if html.trim().is_empty() {
        return Err(IngestError::PageParseFailed {
            page,
            reason: "empty response body".to_string(),
        });
    }

    let blocks = parser::parse_page(&html);
    if blocks.is_empty() {
        warn!(page, "no questions found on page");
    }

    let mut outcome = PageOutcome::default();
    for (i, block) in blocks.iter().enumerate() {
        let question = i + 1;

        let image = match block.image_ref() {
            Some(image_ref) => {
                info!(page, question, image_ref, "image found in question");
                Some(resolve_image(fetcher, image_ref, url, job.download_images).await)
            }
            None => None,
        };

        let parsed = options::parse_options(block.answers.as_ref());
        match record::assemble(
            &job.topic,
            table_id,
            block,
            parsed.options,
            parsed.correct,
            image,
            page,
        ) {
            Some(rec) => {
                log_record(&rec, question);
                outcome.records.push(rec);
            }
            None => {
                warn!(page, question, "no correct answer found, skipping question");
                outcome.rejected += 1;
            }
        }
    }

    Ok(outcome)
}

fn log_record(rec: &QuestionRecord, question: usize) {
    for (label, text) in &rec.options {
        let marker = if rec.correct_labels.contains(label) { " [correct]" } else { "" };
        info!("  {}. {}{}", label, truncate(text, 80), marker);
    }
    if let Some(img) = &rec.image {
        let how = if img.data.is_some() { "downloaded" } else { "url only" };
        info!(page = rec.page_number, question, url = %img.url, "image {}", how);
    }
    if rec.correct_labels.len() > 1 {
        info!(
            page = rec.page_number,
            question,
            "multiple correct answers ({})",
            rec.correct_labels.len()
        );
    }
    info!(
        page = rec.page_number,
        question,
        table = %rec.table_id,
        correct = %rec.correct_answers(),
        "accepted: {}",
        truncate(&rec.text, 100)
    );
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}
