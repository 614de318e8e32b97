mod config;
mod db;
mod error;
mod fetch;
mod ingest;
mod parser;
mod topic;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;

use config::IngestionJob;
use ingest::truncate;
use parser::options::parse_labels;

#[derive(Parser)]
#[command(name = "exam_scraper", about = "Practice-exam question scraper and question bank")]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, env = "EXAM_DB", default_value = config::DEFAULT_DB_PATH)]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape a page range for one topic into its table
    Ingest {
        /// Page URL with a {page} placeholder
        #[arg(short, long)]
        url_template: String,
        /// Topic label, e.g. "AWS SAA-C03"
        #[arg(short, long)]
        topic: String,
        #[arg(long, default_value = "1")]
        start: u32,
        #[arg(long)]
        end: u32,
        /// Store image URLs only, skip downloads
        #[arg(long)]
        no_images: bool,
        /// Pause between pages
        #[arg(long, default_value = "1000")]
        delay_ms: u64,
    },
    /// Run every job from a JSON jobs file
    Batch {
        #[arg(short, long)]
        jobs: PathBuf,
        /// Pause between jobs
        #[arg(long, default_value = "10")]
        job_delay_secs: u64,
    },
    /// List question banks
    Topics {
        #[arg(long)]
        json: bool,
    },
    /// List questions of a bank (1-based inclusive range)
    Questions {
        table: String,
        #[arg(long, default_value = "1")]
        start: usize,
        #[arg(long, default_value = "10")]
        end: usize,
        /// Shuffle before taking the range
        #[arg(long)]
        random: bool,
        #[arg(long)]
        json: bool,
    },
    /// Show one question
    Question {
        table: String,
        id: i64,
        #[arg(long)]
        json: bool,
    },
    /// Search question and answer text
    Search {
        table: String,
        query: String,
        #[arg(long)]
        json: bool,
    },
    /// Bank statistics and answer distribution
    Stats {
        table: String,
        #[arg(long)]
        json: bool,
    },
    /// Per-question progress for a user
    Progress {
        table: String,
        #[arg(short, long, default_value = db::DEFAULT_USER)]
        user: String,
        #[arg(long)]
        json: bool,
    },
    /// Answer a question (e.g. "A,C") and record the attempt
    Answer {
        table: String,
        id: i64,
        choices: String,
        #[arg(short, long, default_value = db::DEFAULT_USER)]
        user: String,
    },
    /// Delete a user's progress, for one bank or all of them
    ResetProgress {
        #[arg(short, long, default_value = db::DEFAULT_USER)]
        user: String,
        /// Only this bank
        #[arg(long)]
        table: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let conn = db::connect(&cli.db)?;
    db::init_schema(&conn)?;

    let result = match cli.command {
        Commands::Ingest {
            url_template,
            topic,
            start,
            end,
            no_images,
            delay_ms,
        } => {
            let job = IngestionJob {
                url_template,
                topic,
                start_page: start,
                end_page: end,
                download_images: !no_images,
                page_delay_ms: delay_ms,
            };
            let fetcher = fetch::HttpFetcher::new()?;
            let summary = ingest::run(&fetcher, &conn, &job).await?;
            summary.print(&job.topic, &db::table_for_topic(&job.topic));
            Ok(())
        }
        Commands::Batch {
            jobs,
            job_delay_secs,
        } => {
            let jobs = config::load_jobs(&jobs)?;
            if jobs.is_empty() {
                println!("Jobs file is empty.");
            } else {
                println!("Running {} jobs...", jobs.len());
                let fetcher = fetch::HttpFetcher::new()?;
                let summaries = ingest::run_all(
                    &fetcher,
                    &conn,
                    &jobs,
                    Duration::from_secs(job_delay_secs),
                )
                .await?;
                for (job, summary) in jobs.iter().zip(&summaries) {
                    summary.print(&job.topic, &db::table_for_topic(&job.topic));
                }
            }
            Ok(())
        }
        Commands::Topics { json } => {
            let topics = db::list_topics(&conn)?;
            if json {
                print_json(&topics)
            } else {
                print_topics(&topics);
                Ok(())
            }
        }
        Commands::Questions {
            table,
            start,
            end,
            random,
            json,
        } => {
            let rows = db::fetch_questions(&conn, &table, start, end, random)?;
            if json {
                print_json(&rows)
            } else {
                if rows.is_empty() {
                    println!("No questions in that range.");
                }
                for q in &rows {
                    print_question(q, false);
                }
                Ok(())
            }
        }
        Commands::Question { table, id, json } => {
            let q = db::fetch_question(&conn, &table, id)?
                .ok_or_else(|| anyhow!("question {} not found in {}", id, table))?;
            if json {
                print_json(&q)
            } else {
                print_question(&q, true);
                Ok(())
            }
        }
        Commands::Search { table, query, json } => {
            let rows = db::search_questions(&conn, &table, &query)?;
            if json {
                print_json(&rows)
            } else {
                for q in &rows {
                    println!("{:>5} | {}", q.id, truncate(&q.question_text, 100));
                }
                println!("\n{} matches", rows.len());
                Ok(())
            }
        }
        Commands::Stats { table, json } => {
            let s = db::topic_stats(&conn, &table)?;
            if json {
                print_json(&s)
            } else {
                println!("Questions:        {}", s.total_questions);
                println!("With images:      {}", s.questions_with_images);
                println!("Multiple answers: {}", s.multiple_answer_questions);
                println!("\n--- Correct answers ---");
                for (answers, count) in &s.answer_distribution {
                    println!("  {:<12} {}", answers, count);
                }
                Ok(())
            }
        }
        Commands::Progress { table, user, json } => {
            let rows = db::fetch_user_stats(&conn, &user, &table)?;
            if json {
                print_json(&rows)
            } else {
                print_progress(&rows, &user, &table);
                Ok(())
            }
        }
        Commands::Answer {
            table,
            id,
            choices,
            user,
        } => {
            let q = db::fetch_question(&conn, &table, id)?
                .ok_or_else(|| anyhow!("question {} not found in {}", id, table))?;
            let chosen = parse_labels(&choices).map_err(|e| anyhow!(e))?;
            if chosen.is_empty() {
                bail!("no answer given");
            }
            let expected = parse_labels(&q.correct_answers).map_err(|e| anyhow!(e))?;
            let is_correct = chosen == expected;
            let stat = db::record_attempt(&conn, &user, &table, id, is_correct)?;
            if is_correct {
                println!("Correct!");
            } else {
                println!("Wrong. Correct answer(s): {}", q.correct_answers);
            }
            println!("{}/{} correct on this question", stat.correct, stat.attempts);
            Ok(())
        }
        Commands::ResetProgress { user, table } => {
            let n = db::reset_user_stats(&conn, &user, table.as_deref())?;
            match &table {
                Some(table) => println!("Deleted {} progress rows for {} in {}.", n, user, table),
                None => println!("Deleted {} progress rows for {}.", n, user),
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_topics(topics: &[db::TopicRow]) {
    if topics.is_empty() {
        println!("No question banks yet. Run 'ingest' first.");
        return;
    }
    println!("{:<40} | {:<40} | {:>9}", "Table", "Topic", "Questions");
    println!("{}", "-".repeat(95));
    for t in topics {
        println!(
            "{:<40} | {:<40} | {:>9}",
            truncate(&t.name, 37),
            truncate(&t.display_name, 37),
            t.total_questions
        );
    }
}

fn print_progress(rows: &[db::UserStatRow], user: &str, table: &str) {
    if rows.is_empty() {
        println!("No attempts recorded for {} in {}.", user, table);
        return;
    }
    println!("{:>8} | {:>8} | {:>7} | {}", "Question", "Attempts", "Correct", "Last attempt");
    println!("{}", "-".repeat(50));
    for r in rows {
        let last = r
            .last_attempt
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".into());
        println!("{:>8} | {:>8} | {:>7} | {}", r.question_id, r.attempts, r.correct, last);
    }
}

fn print_question(q: &db::QuestionRow, full: bool) {
    let page = q.page_number.map(|p| p.to_string()).unwrap_or_else(|| "-".into());
    let text = if full {
        q.question_text.clone()
    } else {
        truncate(&q.question_text, 120)
    };
    println!("#{} (page {}) {}", q.id, page, text);
    if let Some(url) = &q.question_image_url {
        println!("   image: {}", url);
    }
    for (label, answer) in q.answers() {
        let answer = if full { answer.to_string() } else { truncate(answer, 80) };
        println!("   {}. {}", label, answer);
    }
    if full {
        println!("   answer: {}", q.correct_answers);
    }
    println!();
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
